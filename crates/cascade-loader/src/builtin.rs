//! Kernel builders compiled into the host, addressed by name.
use crate::{content_hash, CandidateLoader};
use cascade_core::{BuilderFactory, KernelBuilder, LoadError, LoadedCandidate, ModuleKey};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Default, Clone)]
pub struct BuiltinLoader {
    builders: HashMap<String, BuilderFactory>,
}

impl BuiltinLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn KernelBuilder> + Send + Sync + 'static,
    {
        self.builders.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl CandidateLoader for BuiltinLoader {
    fn load(&self, path: &Path, key: &ModuleKey) -> Result<LoadedCandidate, LoadError> {
        let name = path.to_string_lossy();
        let factory = self
            .builders
            .get(name.as_ref())
            .ok_or_else(|| LoadError::NotFound(path.to_path_buf()))?;
        Ok(LoadedCandidate::new(
            key.clone(),
            path,
            content_hash(format!("builtin:{}", name).as_bytes()),
            Arc::clone(factory),
        ))
    }
}
