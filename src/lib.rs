//! Taskgraph Engine
//!
//! Offline-first synchronization engine for a project/task knowledge graph:
//! - Embedded local store of hierarchical entities (workspace → project →
//!   workstream → task) with scoped atomic writes
//! - Typed task-to-task relationship edges with mirror invariants
//! - Push-then-pull reconciliation with a hosted relational backend,
//!   last-write-wins
//! - Context assembly producing the hierarchical bundle an agent needs to
//!   reason about a task

pub mod context;
pub mod error;
pub mod graph;
pub mod store;
pub mod sync;

use anyhow::Result as AnyResult;
use context::{ContextAssembler, TaskContext};
use error::Result;
use graph::RelationshipGraph;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use store::Database;
use sync::{RemoteBackend, RestBackend, SyncCoordinator, SyncScheduler};
use uuid::Uuid;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub remote: RemoteYamlConfig,
    pub sync: SyncYamlConfig,
}

/// Remote backend section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteYamlConfig {
    pub url: String,
    pub api_key: String,
}

impl Default for RemoteYamlConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".into(),
            api_key: String::new(),
        }
    }
}

/// Sync behavior section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncYamlConfig {
    /// Per-request timeout; expiry counts as a connectivity failure
    pub request_timeout_secs: u64,
    /// Periodic sync interval; absent disables the background loop
    pub auto_interval_secs: Option<u64>,
}

impl Default for SyncYamlConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            auto_interval_secs: None,
        }
    }
}

// ============================================================================
// Runtime config (what the engine actually uses)
// ============================================================================

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub remote_url: String,
    pub remote_api_key: String,
    pub request_timeout_secs: u64,
    pub auto_interval_secs: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to `from_yaml_and_env(None)`.
    pub fn from_env() -> AnyResult<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env
    /// vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "engine.yaml" in CWD. A missing file
    /// falls back to pure env vars / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> AnyResult<Self> {
        let yaml = Self::load_yaml(yaml_path);

        Ok(Self {
            remote_url: std::env::var("SYNC_REMOTE_URL").unwrap_or(yaml.remote.url),
            remote_api_key: std::env::var("SYNC_REMOTE_API_KEY").unwrap_or(yaml.remote.api_key),
            request_timeout_secs: std::env::var("SYNC_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.sync.request_timeout_secs),
            auto_interval_secs: std::env::var("SYNC_AUTO_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(yaml.sync.auto_interval_secs),
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any
    /// failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("engine.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

// ============================================================================
// Engine facade
// ============================================================================

/// The assembled engine: store, sync coordinator, and context assembler
/// wired together. This is the surface the shell/UI layer consumes.
pub struct Engine {
    db: Arc<Database>,
    coordinator: Arc<SyncCoordinator>,
    assembler: ContextAssembler,
    scheduler: tokio::sync::Mutex<Option<SyncScheduler>>,
    auto_interval: Option<Duration>,
}

impl Engine {
    /// Create an engine backed by the REST remote from `config`
    pub fn new(config: &Config) -> Result<Self> {
        let backend = Arc::new(RestBackend::new(
            &config.remote_url,
            &config.remote_api_key,
            Duration::from_secs(config.request_timeout_secs),
        )?);
        let mut engine = Self::with_backend(Arc::new(Database::open()), backend);
        engine.auto_interval = config.auto_interval_secs.map(Duration::from_secs);
        Ok(engine)
    }

    /// Wire an engine over an existing store and any backend implementation
    pub fn with_backend(db: Arc<Database>, backend: Arc<dyn RemoteBackend>) -> Self {
        let coordinator = Arc::new(SyncCoordinator::new(db.clone(), backend));
        let assembler = ContextAssembler::new(db.clone());
        Self {
            db,
            coordinator,
            assembler,
            scheduler: tokio::sync::Mutex::new(None),
            auto_interval: None,
        }
    }

    /// The underlying store
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Handle for relationship edge operations
    pub fn relationships(&self) -> RelationshipGraph {
        RelationshipGraph::new(self.db.clone())
    }

    /// Run one explicit sync pass. See [`SyncCoordinator::sync`].
    pub async fn sync(&self) -> Result<bool> {
        self.coordinator.sync().await
    }

    /// Millisecond epoch of the last completed pass, 0 if never synced
    pub fn last_sync_timestamp(&self) -> i64 {
        self.coordinator.last_sync_timestamp()
    }

    /// Build the context bundle for a task
    pub async fn task_context(&self, task_id: Uuid) -> Result<TaskContext> {
        self.assembler.task_context(task_id).await
    }

    /// Start the periodic sync loop if configured. Idempotent.
    pub async fn start_auto_sync(&self) {
        let Some(interval) = self.auto_interval else {
            return;
        };
        let mut slot = self.scheduler.lock().await;
        if slot.is_none() {
            *slot = Some(SyncScheduler::start(self.coordinator.clone(), interval));
        }
    }

    /// Stop the sync loop and close the store
    pub async fn shutdown(&self) {
        if let Some(scheduler) = self.scheduler.lock().await.take() {
            scheduler.stop().await;
        }
        self.db.close();
    }
}

// ============================================================================
// Tests
// ============================================================================
