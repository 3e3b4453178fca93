//! Evaluation Context: state carried through one evaluation call
use crate::kernel::ModuleKey;
use std::collections::HashMap;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub trace_id: String,
    pub module_key: ModuleKey,
    /// Overrides the stage's own seed when set.
    pub determinism_seed: Option<u64>,
    pub metadata: HashMap<String, Value>,
}

impl EvaluationContext {
    pub fn new(module_key: ModuleKey) -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().to_string(),
            module_key,
            determinism_seed: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.determinism_seed = Some(seed);
        self
    }
}
