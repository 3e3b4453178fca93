//! Candidate-side contract: kernel builders and the loaded candidate handle.
use crate::machine::{DebugInfo, Instruction};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Structural parameters handed to `build_kernel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KernelParams {
    pub tree_height: usize,
    pub value_count: usize,
    pub index_count: usize,
    pub round_count: usize,
}

impl fmt::Display for KernelParams {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "height={} values={} indices={} rounds={}",
            self.tree_height, self.value_count, self.index_count, self.round_count
        )
    }
}

/// Output of a successful build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuiltKernel {
    pub instrs: Vec<Instruction>,
    #[serde(default)]
    pub debug_info: DebugInfo,
}

/// The one capability a candidate must expose.
///
/// Implementations are untrusted: `build_kernel` may fail or panic, and the
/// trial runner is responsible for containing both.
pub trait KernelBuilder {
    fn build_kernel(&mut self, params: &KernelParams) -> anyhow::Result<()>;

    fn instrs(&self) -> &[Instruction];

    fn debug_info(&self) -> DebugInfo;
}

/// Zero-argument constructor for a candidate's builder type.
pub type BuilderFactory = Arc<dyn Fn() -> Box<dyn KernelBuilder> + Send + Sync>;

/// Unique registry key for one load of one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleKey(String);

impl ModuleKey {
    /// Fresh key per load, never derived from the file name.
    pub fn generate() -> Self {
        Self(format!("candidate_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A candidate loaded into an isolated unit, owned by one evaluation call.
#[derive(Clone)]
pub struct LoadedCandidate {
    key: ModuleKey,
    source: PathBuf,
    content_hash: String,
    factory: BuilderFactory,
}

impl LoadedCandidate {
    pub fn new(
        key: ModuleKey,
        source: impl Into<PathBuf>,
        content_hash: impl Into<String>,
        factory: BuilderFactory,
    ) -> Self {
        Self {
            key,
            source: source.into(),
            content_hash: content_hash.into(),
            factory,
        }
    }

    pub fn key(&self) -> &ModuleKey {
        &self.key
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// `blake3:<hex>` of the snapshot taken at load time.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn new_builder(&self) -> Box<dyn KernelBuilder> {
        (self.factory)()
    }
}

impl fmt::Debug for LoadedCandidate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LoadedCandidate")
            .field("key", &self.key)
            .field("source", &self.source)
            .field("content_hash", &self.content_hash)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_keys_are_unique() {
        let a = ModuleKey::generate();
        let b = ModuleKey::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("candidate_"));
    }

    #[test]
    fn test_kernel_params_display() {
        let params = KernelParams {
            tree_height: 10,
            value_count: 2047,
            index_count: 256,
            round_count: 16,
        };
        assert_eq!(params.to_string(), "height=10 values=2047 indices=256 rounds=16");
    }
}
