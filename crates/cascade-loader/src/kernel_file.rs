//! Kernel files: candidates shipped as precompiled instruction listings.
//!
//! ```yaml
//! name: unrolled-v3
//! kernels:
//!   - params: { tree_height: 10, value_count: 2047, index_count: 256, round_count: 16 }
//!     instrs: [ ... ]
//!     debug_info: null
//! ```
use crate::{content_hash, CandidateLoader};
use anyhow::bail;
use cascade_core::{
    DebugInfo, Instruction, KernelBuilder, KernelParams, LoadError, LoadedCandidate, ModuleKey,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelFile {
    #[serde(default)]
    pub name: Option<String>,
    pub kernels: Vec<CompiledKernel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledKernel {
    pub params: KernelParams,
    pub instrs: Vec<Instruction>,
    #[serde(default)]
    pub debug_info: DebugInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

impl KernelFile {
    pub fn is_kernel_file(path: &Path) -> bool {
        Self::format_of(path).is_some()
    }

    fn format_of(path: &Path) -> Option<Format> {
        match path.extension()?.to_str()? {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }

    fn parse(path: &Path, bytes: &[u8]) -> Result<Self, LoadError> {
        let malformed = |reason: String| LoadError::Malformed {
            path: path.to_path_buf(),
            reason,
        };
        match Self::format_of(path) {
            Some(Format::Json) => serde_json::from_slice(bytes).map_err(|e| malformed(e.to_string())),
            Some(Format::Yaml) => serde_yaml::from_slice(bytes).map_err(|e| malformed(e.to_string())),
            None => Err(malformed("expected a .json, .yaml or .yml kernel file".to_string())),
        }
    }

    fn find(&self, params: &KernelParams) -> Option<&CompiledKernel> {
        self.kernels.iter().find(|k| &k.params == params)
    }
}

/// Reads the kernel file once at load time; later edits to the path are
/// never observed by the loaded candidate.
#[derive(Debug, Default, Clone)]
pub struct KernelFileLoader;

impl CandidateLoader for KernelFileLoader {
    fn load(&self, path: &Path, key: &ModuleKey) -> Result<LoadedCandidate, LoadError> {
        let bytes = crate::read_candidate(path)?;
        let file = KernelFile::parse(path, &bytes)?;

        if file.kernels.is_empty() {
            return Err(LoadError::MissingEntryPoint(format!(
                "{} declares no kernels",
                path.display()
            )));
        }

        tracing::debug!(
            "loaded kernel file {} ({} kernels) as {}",
            path.display(),
            file.kernels.len(),
            key
        );

        let file = Arc::new(file);
        Ok(LoadedCandidate::new(
            key.clone(),
            path,
            content_hash(&bytes),
            Arc::new(move || {
                Box::new(FileKernelBuilder {
                    file: Arc::clone(&file),
                    built: None,
                }) as Box<dyn KernelBuilder>
            }),
        ))
    }
}

struct FileKernelBuilder {
    file: Arc<KernelFile>,
    built: Option<CompiledKernel>,
}

impl KernelBuilder for FileKernelBuilder {
    fn build_kernel(&mut self, params: &KernelParams) -> anyhow::Result<()> {
        match self.file.find(params) {
            Some(kernel) => {
                self.built = Some(kernel.clone());
                Ok(())
            }
            None => bail!("no compiled kernel for {}", params),
        }
    }

    fn instrs(&self) -> &[Instruction] {
        self.built.as_ref().map(|k| k.instrs.as_slice()).unwrap_or(&[])
    }

    fn debug_info(&self) -> DebugInfo {
        self.built.as_ref().map(|k| k.debug_info.clone()).unwrap_or_default()
    }
}
