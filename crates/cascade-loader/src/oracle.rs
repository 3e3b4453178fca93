//! Oracle Loader
//!
//! The reference module is loaded at most once per `OracleLoader` and shared
//! by every stage afterwards. Failure here means the harness is misconfigured,
//! so it surfaces as `ConfigurationError` rather than a candidate score.
use cascade_core::{ConfigurationError, Oracle};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a reference oracle comes from.
pub trait OracleSource: Send + Sync {
    fn describe(&self) -> String;

    fn load(&self) -> Result<Arc<dyn Oracle>, ConfigurationError>;
}

pub struct OracleLoader {
    source: Box<dyn OracleSource>,
    cached: OnceCell<Arc<dyn Oracle>>,
}

impl OracleLoader {
    pub fn new(source: impl OracleSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cached: OnceCell::new(),
        }
    }

    /// Wrap an oracle that is already constructed.
    pub fn preloaded(oracle: Arc<dyn Oracle>) -> Self {
        let cached = OnceCell::new();
        let _ = cached.set(Arc::clone(&oracle));
        Self {
            source: Box::new(FnOracleSource::new("preloaded", move || Ok(Arc::clone(&oracle)))),
            cached,
        }
    }

    pub fn get(&self) -> Result<Arc<dyn Oracle>, ConfigurationError> {
        self.cached
            .get_or_try_init(|| {
                tracing::info!("loading oracle from {}", self.source.describe());
                let oracle = self.source.load()?;
                tracing::info!("oracle {} ready ({} cores)", oracle.id(), oracle.n_cores());
                Ok(oracle)
            })
            .map(Arc::clone)
    }

    pub fn is_loaded(&self) -> bool {
        self.cached.get().is_some()
    }
}

type OracleFn = dyn Fn() -> Result<Arc<dyn Oracle>, ConfigurationError> + Send + Sync;

/// Oracle produced by a closure.
pub struct FnOracleSource {
    name: String,
    load: Box<OracleFn>,
}

impl FnOracleSource {
    pub fn new<F>(name: impl Into<String>, load: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Oracle>, ConfigurationError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            load: Box::new(load),
        }
    }
}

impl OracleSource for FnOracleSource {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn load(&self) -> Result<Arc<dyn Oracle>, ConfigurationError> {
        (self.load)()
    }
}

/// `oracle.yaml` at the root of the frozen oracle directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleManifest {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

type OracleConstructor = dyn Fn(&Path, &OracleManifest) -> Result<Arc<dyn Oracle>, ConfigurationError>
    + Send
    + Sync;

/// Version-controlled oracle directory identified by its manifest.
pub struct DirectoryOracleSource {
    dir: PathBuf,
    constructors: HashMap<String, Box<OracleConstructor>>,
}

impl DirectoryOracleSource {
    pub const MANIFEST: &'static str = "oracle.yaml";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            constructors: HashMap::new(),
        }
    }

    /// Register the constructor used when the manifest names `id`.
    pub fn with_constructor<F>(mut self, id: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&Path, &OracleManifest) -> Result<Arc<dyn Oracle>, ConfigurationError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.insert(id.into(), Box::new(constructor));
        self
    }

    pub fn read_manifest(&self) -> Result<OracleManifest, ConfigurationError> {
        let path = self.dir.join(Self::MANIFEST);
        let yaml = std::fs::read_to_string(&path).map_err(|e| {
            ConfigurationError::Oracle(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_yaml::from_str(&yaml).map_err(|e| {
            ConfigurationError::Oracle(format!("invalid manifest {}: {}", path.display(), e))
        })
    }
}

impl OracleSource for DirectoryOracleSource {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn load(&self) -> Result<Arc<dyn Oracle>, ConfigurationError> {
        if !self.dir.is_dir() {
            return Err(ConfigurationError::Oracle(format!(
                "oracle directory {} does not exist",
                self.dir.display()
            )));
        }
        let manifest = self.read_manifest()?;
        let constructor = self.constructors.get(&manifest.id).ok_or_else(|| {
            ConfigurationError::Oracle(format!("no constructor registered for oracle {}", manifest.id))
        })?;
        constructor(&self.dir, &manifest)
    }
}
