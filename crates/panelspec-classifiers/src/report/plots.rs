use plotly::box_plot::{BoxPlot, BoxPoints};
use plotly::common::{DashType, Line, Mode};
use plotly::layout::{Axis, Layout};
use plotly::{Plot, Scatter};

use crate::specificity::SpecificityTable;

/// Box plot of the per-seed AUCs of every group, with all points drawn.
pub fn plot_auc_boxplot(table: &SpecificityTable, title: &str) -> Plot {
    let mut plot = Plot::new();

    for group in &table.groups {
        let values: Vec<f64> = table
            .column(group)
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .collect();
        let trace = BoxPlot::<f64, f64>::new(values)
            .name(group)
            .box_points(BoxPoints::All);
        plot.add_trace(trace);
    }

    plot.set_layout(
        Layout::new()
            .title(title)
            .x_axis(Axis::new().title("Group"))
            .y_axis(Axis::new().title("AUC").range(vec![0.0, 1.05])),
    );
    plot
}

/// Mean ROC curve of every group over the shared FPR grid.
pub fn plot_mean_roc(table: &SpecificityTable, title: &str) -> Plot {
    let mut plot = Plot::new();

    for (group, curve) in table.groups.iter().zip(&table.mean_curves) {
        let Some(tpr) = curve else {
            continue;
        };
        let trace = Scatter::new(table.grid.clone(), tpr.clone())
            .mode(Mode::Lines)
            .name(group);
        plot.add_trace(trace);
    }

    let chance = Scatter::new(vec![0.0, 1.0], vec![0.0, 1.0])
        .mode(Mode::Lines)
        .name("Chance")
        .line(Line::new().color("grey").dash(DashType::Dash));
    plot.add_trace(chance);

    plot.set_layout(
        Layout::new()
            .title(title)
            .x_axis(Axis::new().title("False Positive Rate"))
            .y_axis(Axis::new().title("True Positive Rate")),
    );
    plot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_trace_per_group() {
        let mut table = SpecificityTable::new(vec![1, 2], vec!["A".into(), "B".into()], vec![0.0, 1.0]);
        table.set(1, "A", 0.9);
        table.mean_curves[0] = Some(vec![0.0, 1.0]);
        let html = plot_auc_boxplot(&table, "AUC").to_inline_html(Some("auc"));
        assert!(html.contains("\"A\""));
        assert!(html.contains("\"B\""));
        let roc = plot_mean_roc(&table, "ROC").to_inline_html(Some("roc"));
        assert!(roc.contains("Chance"));
    }
}
