//! Runtime configuration for store selection.
//!
//! Backend choice and the sqlite database location resolve from the
//! environment (via `dotenvy`) with sensible defaults, so deployments
//! configure the engine without code changes:
//!
//! - `DISPATCHFLOW_SQLITE_URL` - full sqlite URL, highest precedence
//! - `SQLITE_DB_NAME` - bare file name fallback
//! - default: `dispatchflow.db`

use std::sync::Arc;

use crate::runtime::store::{CheckpointStore, InMemoryStore, Result};

/// Which checkpoint backend to construct.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreType {
    /// Process-local map; development and testing.
    InMemory,
    /// Durable sqlx-backed store.
    #[cfg(feature = "sqlite")]
    Sqlite,
}

/// Store construction settings.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub store: StoreType,
    pub sqlite_db_name: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            store: StoreType::InMemory,
            sqlite_db_name: Self::resolve_sqlite_db_name(None),
        }
    }
}

impl RuntimeConfig {
    fn resolve_sqlite_db_name(provided: Option<String>) -> Option<String> {
        if provided.is_some() {
            return provided;
        }
        dotenvy::dotenv().ok();
        Some(std::env::var("SQLITE_DB_NAME").unwrap_or_else(|_| "dispatchflow.db".to_string()))
    }

    pub fn new(store: StoreType, sqlite_db_name: Option<String>) -> Self {
        Self {
            store,
            sqlite_db_name: Self::resolve_sqlite_db_name(sqlite_db_name),
        }
    }

    /// Construct the configured checkpoint store.
    pub async fn build_store(&self) -> Result<Arc<dyn CheckpointStore>> {
        match self.store {
            StoreType::InMemory => Ok(Arc::new(InMemoryStore::new())),
            #[cfg(feature = "sqlite")]
            StoreType::Sqlite => {
                let db_url = std::env::var("DISPATCHFLOW_SQLITE_URL")
                    .ok()
                    .or_else(|| {
                        self.sqlite_db_name
                            .as_ref()
                            .map(|name| format!("sqlite://{name}"))
                    })
                    .unwrap_or_else(|| "sqlite://dispatchflow.db".to_string());
                ensure_sqlite_file(&db_url);
                let store = crate::runtime::store_sqlite::SqliteStore::connect(&db_url).await?;
                Ok(Arc::new(store))
            }
        }
    }
}

/// Ensure the sqlite file behind a `sqlite://` URL exists, creating
/// parent directories as needed. Failures are ignored; the subsequent
/// connect reports anything real.
#[cfg(feature = "sqlite")]
fn ensure_sqlite_file(db_url: &str) {
    if let Some(path) = db_url.strip_prefix("sqlite://") {
        let path = path.trim();
        if !path.is_empty() {
            let p = std::path::Path::new(path);
            if let Some(parent) = p.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if !p.exists() {
                let _ = std::fs::File::create_new(p);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_config_builds_in_memory_store() {
        let config = RuntimeConfig::default();
        assert_eq!(config.store, StoreType::InMemory);
        let store = config.build_store().await.unwrap();
        assert!(store.list_sessions().await.unwrap().is_empty());
    }
}
