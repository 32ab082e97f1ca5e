//! Table readers and writers.
pub mod tsv;

pub use tsv::{
    read_feature_table, read_hyperparameters, read_metadata_table, read_panel_columns,
    write_specificity_table,
};
