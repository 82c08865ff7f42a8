//! Local state management
//!
//! Manages the `.poolflow/state.json` file which records, for every managed
//! resource, the last applied desired state and the normalized remote state.
//! Secrets the server never echoes back survive only here.

use crate::action::Deployed;
use crate::error::StateError;
use crate::resource::Resource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;

type Result<T> = std::result::Result<T, StateError>;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".poolflow";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const STATE_TEMP: &str = "state.json.tmp";
const LOCK_FILE: &str = "lock.json";

/// Contents of the state file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Resources indexed by kind:name
    pub resources: BTreeMap<String, StoredResource>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

fn key<R: Resource>(name: &str) -> String {
    format!("{}:{}", R::KIND, name)
}

impl StateFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a create or update
    pub fn put<R: Resource>(&mut self, name: &str, deployed: &Deployed<R>) -> Result<()> {
        let now = Utc::now();
        let key = key::<R>(name);
        let created_at = self
            .resources
            .get(&key)
            .map(|r| r.created_at)
            .unwrap_or(now);

        self.resources.insert(
            key,
            StoredResource {
                kind: R::KIND.to_string(),
                id: deployed.id.clone(),
                spec: serde_json::to_value(&deployed.spec)?,
                state: serde_json::to_value(&deployed.state)?,
                created_at,
                updated_at: now,
            },
        );
        self.updated_at = now;
        Ok(())
    }

    /// Typed view of a recorded resource
    pub fn get<R: Resource>(&self, name: &str) -> Result<Option<Deployed<R>>> {
        let Some(stored) = self.resources.get(&key::<R>(name)) else {
            return Ok(None);
        };

        Ok(Some(Deployed {
            id: stored.id.clone(),
            spec: serde_json::from_value(stored.spec.clone())?,
            state: serde_json::from_value(stored.state.clone())?,
        }))
    }

    /// Remove a resource
    pub fn remove<R: Resource>(&mut self, name: &str) -> Option<StoredResource> {
        let result = self.resources.remove(&key::<R>(name));
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }

    /// Names of every recorded resource of one kind
    pub fn names<R: Resource>(&self) -> Vec<&str> {
        let prefix = format!("{}:", R::KIND);
        self.resources
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .collect()
    }
}

/// One recorded resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResource {
    /// Resource kind
    pub kind: String,

    /// Remote identifier
    pub id: String,

    /// Last applied desired state, secrets included
    pub spec: serde_json::Value,

    /// Normalized remote state after the last apply
    pub state: serde_json::Value,

    /// When the resource was first recorded
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Reads and writes the state file of one project
pub struct StateStore {
    /// Project root directory
    project_root: PathBuf,
}

impl StateStore {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIR)
    }

    fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    fn temp_path(&self) -> PathBuf {
        self.state_dir().join(STATE_TEMP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!(dir = %dir.display(), "created state directory");
        }
        Ok(())
    }

    /// Load the current state
    pub async fn load(&self) -> Result<StateFile> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("state file not found, returning empty state");
            return Ok(StateFile::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: StateFile = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(StateError::Version {
                found: state.version,
                supported: STATE_VERSION,
            });
        }

        tracing::debug!(resources = state.resources.len(), "loaded state");
        Ok(state)
    }

    /// Save the state, keeping the previous file as a backup
    ///
    /// The new content is written to a temporary file and renamed into
    /// place, so `state.json` is never missing or half written.
    pub async fn save(&self, state: &StateFile) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let temp = self.temp_path();

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&temp, content).await?;

        if path.exists() {
            fs::copy(&path, self.backup_path()).await?;
            tracing::debug!("created state backup");
        }
        fs::rename(&temp, &path).await?;

        tracing::debug!(resources = state.resources.len(), "saved state");
        Ok(())
    }

    /// Acquire a lock for exclusive access
    ///
    /// The lock file is created exclusively. An existing lock older than
    /// one hour is taken over.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();
        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&lock_info)?;

        match create_exclusive(&lock_path, &content).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let existing = read_lock(&lock_path).await?;
                if !existing.is_stale() {
                    return Err(existing.into_locked());
                }

                tracing::warn!(holder = %existing.holder, "removing stale lock");
                // Only remove the lock that was judged stale
                if read_lock(&lock_path).await?.acquired_at == existing.acquired_at {
                    match fs::remove_file(&lock_path).await {
                        Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
                        _ => {}
                    }
                }

                match create_exclusive(&lock_path, &content).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                        return Err(read_lock(&lock_path).await?.into_locked());
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!("acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

async fn create_exclusive(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await
}

/// Read a lock file; an unreadable one is dated by its modification time
async fn read_lock(path: &Path) -> Result<LockInfo> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Ok(LockInfo {
                holder: "unknown".to_string(),
                acquired_at: DateTime::<Utc>::MIN_UTC,
            });
        }
        Err(e) => return Err(e.into()),
    };
    if let Ok(info) = serde_json::from_str::<LockInfo>(&content) {
        return Ok(info);
    }

    let modified = fs::metadata(path).await?.modified().unwrap_or(SystemTime::now());
    Ok(LockInfo {
        holder: "unknown".to_string(),
        acquired_at: modified.into(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

impl LockInfo {
    fn is_stale(&self) -> bool {
        Utc::now().signed_duration_since(self.acquired_at).num_hours() >= 1
    }

    fn into_locked(self) -> StateError {
        StateError::Locked {
            holder: self.holder,
            since: self.acquired_at.to_rfc3339(),
        }
    }
}

/// Guard removing the lock file when released or dropped
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
