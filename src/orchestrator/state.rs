use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use anyhow::Context;

const REGISTRY_FILE: &str = "registry.json";
const LOCK_FILE: &str = "registry.json.lock";

/// What a lifecycle handle points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HandleTarget {
    Process { pid: u32, log_file: String },
    Container { container: String },
}

/// Runtime record for one launched service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleHandle {
    pub service: String,
    #[serde(flatten)]
    pub target: HandleTarget,
    pub started_at: DateTime<Utc>,
}

impl LifecycleHandle {
    pub fn process(service: &str, pid: u32, log_file: &Path) -> Self {
        Self {
            service: service.to_string(),
            target: HandleTarget::Process {
                pid,
                log_file: log_file.to_string_lossy().to_string(),
            },
            started_at: Utc::now(),
        }
    }

    pub fn container(service: &str, container: &str) -> Self {
        Self {
            service: service.to_string(),
            target: HandleTarget::Container {
                container: container.to_string(),
            },
            started_at: Utc::now(),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        match &self.target {
            HandleTarget::Process { pid, .. } => Some(*pid),
            HandleTarget::Container { .. } => None,
        }
    }
}

/// Service name → handle, persisted as `registry.json` in the logs dir.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub handles: BTreeMap<String, LifecycleHandle>,
}

impl Registry {
    /// Load without locking. Missing or unreadable files yield an empty registry.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(REGISTRY_FILE);
        let Ok(content) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(registry) => registry,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt registry");
                Self::default()
            }
        }
    }

    fn save(&self, dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(REGISTRY_FILE);
        let content = serde_json::to_string_pretty(self)?;
        // Atomic write: write to tmp file then rename
        let tmp_path = dir.join(format!("{}.tmp", REGISTRY_FILE));
        std::fs::write(&tmp_path, &content)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    pub fn get(&self, service: &str) -> Option<&LifecycleHandle> {
        self.handles.get(service)
    }

    pub fn insert(&mut self, handle: LifecycleHandle) {
        self.handles.insert(handle.service.clone(), handle);
    }

    pub fn remove(&mut self, service: &str) -> Option<LifecycleHandle> {
        self.handles.remove(service)
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// A registry loaded under an exclusive `flock` on `registry.json.lock`.
///
/// The lock is held until this value is dropped, so a second invocation
/// blocks in [`LockedRegistry::open`] until the first one finishes.
pub struct LockedRegistry {
    dir: PathBuf,
    registry: Registry,
    _lock: File,
}

impl LockedRegistry {
    pub fn open(dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating logs directory {}", dir.display()))?;
        let lock_path = dir.join(LOCK_FILE);
        let lock = File::create(&lock_path)
            .with_context(|| format!("opening {}", lock_path.display()))?;
        tracing::debug!(path = %lock_path.display(), "waiting for registry lock");
        crate::platform::lock_exclusive(&lock)
            .with_context(|| format!("locking {}", lock_path.display()))?;

        Ok(Self {
            dir: dir.to_path_buf(),
            registry: Registry::load(dir),
            _lock: lock,
        })
    }

    /// Persist the current contents. The lock stays held.
    pub fn commit(&self) -> anyhow::Result<()> {
        self.registry.save(&self.dir)
    }

    /// Remove the registry file entirely.
    pub fn clear(&mut self) -> anyhow::Result<()> {
        self.registry = Registry::default();
        let path = self.dir.join(REGISTRY_FILE);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}

impl Deref for LockedRegistry {
    type Target = Registry;

    fn deref(&self) -> &Registry {
        &self.registry
    }
}

impl DerefMut for LockedRegistry {
    fn deref_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }
}
