//! Module Registry
//!
//! Tracks every candidate currently loaded in the process. Keys are unique
//! per load; an entry lives as long as the `RegistryLease` returned by
//! `register`, and the registry never holds more than `capacity` entries.
use cascade_core::{LoadError, LoadedCandidate, ModuleKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub key: ModuleKey,
    pub source: PathBuf,
    pub content_hash: String,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Default)]
struct RegistryInner {
    entries: HashMap<ModuleKey, RegistryEntry>,
    order: VecDeque<ModuleKey>,
}

pub struct ModuleRegistry {
    capacity: usize,
    inner: Mutex<RegistryInner>,
}

impl ModuleRegistry {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity: capacity.max(1),
            inner: Mutex::new(RegistryInner::default()),
        })
    }

    /// Register a freshly loaded candidate. Fails if its key is already live.
    pub fn register(self: &Arc<Self>, candidate: &LoadedCandidate) -> Result<RegistryLease, LoadError> {
        let key = candidate.key().clone();
        let mut inner = self.lock();

        if inner.entries.contains_key(&key) {
            return Err(LoadError::KeyCollision(key.to_string()));
        }

        while inner.entries.len() >= self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            if inner.entries.remove(&oldest).is_some() {
                tracing::warn!("registry full ({}), evicted {}", self.capacity, oldest);
            }
        }

        inner.entries.insert(
            key.clone(),
            RegistryEntry {
                key: key.clone(),
                source: candidate.source().to_path_buf(),
                content_hash: candidate.content_hash().to_string(),
                loaded_at: Utc::now(),
            },
        );
        inner.order.push_back(key.clone());
        tracing::debug!("registered {} from {}", key, candidate.source().display());

        Ok(RegistryLease {
            registry: Arc::clone(self),
            key,
        })
    }

    pub fn get(&self, key: &ModuleKey) -> Option<RegistryEntry> {
        self.lock().entries.get(key).cloned()
    }

    pub fn contains(&self, key: &ModuleKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn remove(&self, key: &ModuleKey) {
        let mut inner = self.lock();
        if inner.entries.remove(key).is_some() {
            inner.order.retain(|k| k != key);
            tracing::debug!("released {}", key);
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        // Entries stay consistent even if a holder panicked mid-update.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Keeps one registry entry alive; dropping it deregisters the candidate.
pub struct RegistryLease {
    registry: Arc<ModuleRegistry>,
    key: ModuleKey,
}

impl RegistryLease {
    pub fn key(&self) -> &ModuleKey {
        &self.key
    }
}

impl Drop for RegistryLease {
    fn drop(&mut self) {
        self.registry.remove(&self.key);
    }
}
