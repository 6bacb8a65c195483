//! Profile store abstraction and persisted key layout.
//!
//! The persistent store is the single source of truth for everything an
//! import writes. The pipeline only depends on the [`KvStore`] trait; two
//! implementations ship with the crate:
//!
//! - [`JsonFileStore`] — a JSON document on disk behind a `RwLock`, the way
//!   the host application persists its settings.
//! - [`MemoryStore`] — in-memory, for tests and ephemeral sessions.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::RwLock;

/// Persisted key layout.
///
/// Keys are flat; the caller's storage abstraction namespaces the whole
/// document per conversation partition.
pub mod keys {
    pub const API_KEY: &str = "api_key";
    pub const BASE_URL: &str = "base_url";
    pub const PROVIDER: &str = "provider";
    pub const SYSTEM_PROMPT: &str = "system_prompt";
    pub const MODEL: &str = "model";
    /// RFC 3339 timestamp of the last model write, used for staleness
    /// arbitration against any in-memory cache.
    pub const MODEL_UPDATED_AT: &str = "model_updated_at";
    pub const PROMPTS: &str = "prompts";
    pub const SELECTED_PROMPT_IDS: &str = "selected_prompt_ids";
    pub const SELECTED_DEFAULT_PROMPT_IDS: &str = "selected_default_prompt_ids";
    pub const FUNCTIONS: &str = "functions";
    pub const FUNCTION_COLLECTIONS: &str = "function_collections";
    pub const FUNCTION_COLLECTION_METADATA: &str = "function_collection_metadata";
    pub const ENABLED_FUNCTIONS: &str = "enabled_functions";
    pub const FUNCTION_TOOLS_ENABLED: &str = "function_tools_enabled";
    pub const SELECTED_DEFAULT_FUNCTION_IDS: &str = "selected_default_function_ids";
    pub const SELECTED_DEFAULT_FUNCTION_COLLECTION_IDS: &str =
        "selected_default_function_collection_ids";
    /// Per-service MCP credential, stored as `mcp.<service>`.
    pub const MCP_PREFIX: &str = "mcp.";
    pub const RAG_ENABLED: &str = "rag_enabled";
    pub const RAG_EU_DOCUMENTS: &str = "rag_eu_documents";
    pub const THEME: &str = "theme";
    pub const CONVERSATION: &str = "conversation";
    /// Share-link secret, persisted only when the caller opts in to lock it.
    pub const SHARE_SECRET: &str = "share_secret";

    /// Build the storage key for one MCP service credential.
    pub fn mcp_service(service: &str) -> String {
        format!("{MCP_PREFIX}{service}")
    }
}

/// Error from store reads and writes.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Asynchronous persistent key-value store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value; `None` when the key has never been written.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write a value. Returning `Ok` means the write is durable; the
    /// pipeline treats completion of this future as the commit barrier
    /// before dependent side effects (e.g. MCP reconnects).
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Remove a key; removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Read and deserialize a typed value from the store.
pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serialize and write a typed value to the store.
pub async fn set_typed<T: Serialize>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    store.set(key, serde_json::to_value(value)?).await
}

/// Profile store backed by a single JSON document on disk.
pub struct JsonFileStore {
    storage_path: PathBuf,
    entries: RwLock<BTreeMap<String, Value>>,
}

impl JsonFileStore {
    /// Create a store, loading the document from disk if present.
    ///
    /// A missing or unreadable document starts empty rather than failing:
    /// the profile may simply not exist yet.
    pub async fn new(storage_path: PathBuf) -> Self {
        let entries = if storage_path.exists() {
            match tokio::fs::read_to_string(&storage_path).await {
                Ok(contents) => match serde_json::from_str(&contents) {
                    Ok(map) => map,
                    Err(e) => {
                        tracing::warn!(
                            "Failed to parse profile at {}: {}, starting empty",
                            storage_path.display(),
                            e
                        );
                        BTreeMap::new()
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        "Failed to read profile at {}: {}, starting empty",
                        storage_path.display(),
                        e
                    );
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Self {
            storage_path,
            entries: RwLock::new(entries),
        }
    }

    /// Save the current document to disk.
    async fn save_to_disk(&self) -> Result<(), StoreError> {
        let entries = self.entries.read().await;

        if let Some(parent) = self.storage_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(&*entries)?;
        tokio::fs::write(&self.storage_path, contents).await?;
        tracing::debug!("Saved profile to {}", self.storage_path.display());
        Ok(())
    }
}

#[async_trait]
impl KvStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        {
            let mut entries = self.entries.write().await;
            entries.insert(key.to_string(), value);
        }
        self.save_to_disk().await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let existed = {
            let mut entries = self.entries.write().await;
            entries.remove(key).is_some()
        };
        if existed {
            self.save_to_disk().await?;
        }
        Ok(())
    }
}

/// In-memory store with the same semantics as [`JsonFileStore`].
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the full document, for assertions and diagnostics.
    pub async fn snapshot(&self) -> BTreeMap<String, Value> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
