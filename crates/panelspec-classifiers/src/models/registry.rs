//! Name to classifier-family lookup.
//!
//! Every family is registered with its default [`ModelType`] when the
//! registry is built; there is no global table. User hyperparameters are
//! applied on top of the defaults through [`ModelType::apply_hyperparameters`].
use crate::config::{Hyperparameters, ModelConfig, ModelType};
use crate::error::{EvalError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::factory::build_model;

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    defaults: ModelType,
}

/// Registered classifier families, looked up case-insensitively.
#[derive(Debug, Clone)]
pub struct ClassifierRegistry {
    entries: Vec<Entry>,
    aliases: Vec<(String, String)>,
    random_state: u64,
}

impl ClassifierRegistry {
    /// An empty registry. `random_state` seeds the stochastic families.
    pub fn new(random_state: u64) -> Self {
        ClassifierRegistry {
            entries: Vec::new(),
            aliases: Vec::new(),
            random_state,
        }
    }

    /// Registry holding every built-in family.
    pub fn with_defaults(random_state: u64) -> Self {
        let mut registry = ClassifierRegistry::new(random_state);
        #[allow(unused_mut)]
        let mut builtin = vec!["LRl1", "LRl2", "DT", "RF", "GB", "KNN"];
        #[cfg(feature = "linfa")]
        builtin.push("SVC");

        for name in builtin {
            // the built-in names always parse
            if let Ok(defaults) = name.parse::<ModelType>() {
                registry.register(name, defaults);
            }
        }
        registry.alias("gbdt", "GB");
        #[cfg(feature = "linfa")]
        registry.alias("svm", "SVC");
        registry
    }

    /// Add or replace a family under `name`.
    pub fn register(&mut self, name: &str, defaults: ModelType) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.name.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.defaults = defaults,
            None => self.entries.push(Entry {
                name: name.to_string(),
                defaults,
            }),
        }
    }

    /// Make `alias` resolve to the registered family `target`.
    pub fn alias(&mut self, alias: &str, target: &str) {
        self.aliases.push((alias.to_lowercase(), target.to_string()));
    }

    /// Registered family names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn random_state(&self) -> u64 {
        self.random_state
    }

    fn lookup(&self, name: &str) -> Result<&Entry> {
        let lowered = name.to_lowercase();
        let resolved = self
            .aliases
            .iter()
            .find(|(alias, _)| *alias == lowered)
            .map(|(_, target)| target.as_str())
            .unwrap_or(name);
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(resolved))
            .ok_or_else(|| EvalError::UnknownClassifier {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    /// Resolve `name` and apply `hyperparameters` to its defaults.
    pub fn configure(&self, name: &str, hyperparameters: &Hyperparameters) -> Result<ModelConfig> {
        let entry = self.lookup(name)?;
        let mut model_type = entry.defaults.clone();
        model_type.apply_hyperparameters(hyperparameters, &entry.defaults)?;
        log::debug!("Configured {} as {:?}", entry.name, model_type);
        Ok(ModelConfig::new(model_type, self.random_state))
    }

    /// An unfitted classifier for `name` with `hyperparameters` applied.
    ///
    /// # Errors
    ///
    /// `UnknownClassifier` for an unregistered name, `InvalidHyperparameter`
    /// for a key outside the family schema or a value of the wrong type.
    pub fn get(&self, name: &str, hyperparameters: &Hyperparameters) -> Result<Box<dyn ClassifierModel>> {
        Ok(build_model(self.configure(name, hyperparameters)?))
    }
}

impl Default for ClassifierRegistry {
    fn default() -> Self {
        ClassifierRegistry::with_defaults(0)
    }
}
