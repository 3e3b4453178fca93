//! Cascade Loader: candidate and oracle loading
//!
//! Every candidate load is keyed by a fresh `ModuleKey` and snapshots its
//! source, so two evaluations of whatever happens to sit at the same path
//! never share code.
//!
//! ```text
//! path ──► CandidateLoaders ─┬─► BuiltinLoader     (name registered by host)
//!                            ├─► KernelFileLoader  (.json / .yaml / .yml)
//!                            └─► ProcessLoader     (executable)
//!                                      │
//!                                      ▼
//!                          LoadedCandidate ──► ModuleRegistry (leased)
//! ```

pub mod builtin;
pub mod kernel_file;
pub mod oracle;
pub mod process;
pub mod registry;

pub use builtin::BuiltinLoader;
pub use kernel_file::{CompiledKernel, KernelFile, KernelFileLoader};
pub use oracle::{DirectoryOracleSource, FnOracleSource, OracleLoader, OracleManifest, OracleSource};
pub use process::ProcessLoader;
pub use registry::{ModuleRegistry, RegistryEntry, RegistryLease};

use cascade_core::{EvaluatorConfig, LoadError, LoadedCandidate, ModuleKey};
use std::path::Path;

/// Turns a candidate path into an isolated, loaded unit.
pub trait CandidateLoader: Send + Sync {
    fn load(&self, path: &Path, key: &ModuleKey) -> Result<LoadedCandidate, LoadError>;
}

/// Default dispatch: builtin names, then kernel files, then executables.
#[derive(Clone, Default)]
pub struct CandidateLoaders {
    builtin: BuiltinLoader,
    files: KernelFileLoader,
    process: ProcessLoader,
}

impl CandidateLoaders {
    pub fn new(config: &EvaluatorConfig) -> Self {
        Self {
            builtin: BuiltinLoader::new(),
            files: KernelFileLoader,
            process: ProcessLoader::new(&config.process),
        }
    }

    pub fn with_builtins(mut self, builtin: BuiltinLoader) -> Self {
        self.builtin = builtin;
        self
    }
}

impl CandidateLoader for CandidateLoaders {
    fn load(&self, path: &Path, key: &ModuleKey) -> Result<LoadedCandidate, LoadError> {
        if self.builtin.contains(&path.to_string_lossy()) {
            self.builtin.load(path, key)
        } else if KernelFile::is_kernel_file(path) {
            self.files.load(path, key)
        } else {
            self.process.load(path, key)
        }
    }
}

pub(crate) fn content_hash(bytes: &[u8]) -> String {
    format!("blake3:{}", blake3::hash(bytes))
}

pub(crate) fn read_candidate(path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LoadError::NotFound(path.to_path_buf()),
        _ => LoadError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })
}
