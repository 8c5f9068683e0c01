/*!
SQLite checkpoint store.

Durable [`CheckpointStore`] backend over `sqlx`. One row per session -
the engine's checkpoint model is latest-position-with-version, not an
append-only step log - with compare-and-swap mapped onto SQLite
primitives:

- create (`expected_version == None`) → plain `INSERT`; the primary-key
  violation on an existing row is the conflict signal
- advance (`expected_version == Some(v)`) → `UPDATE … WHERE session_id
  = ? AND version = ?`; zero rows affected is the conflict signal

Both paths are single atomic statements, so no transaction wrapping is
needed.

When the `sqlite-migrations` feature is enabled (default), embedded
migrations (`sqlx::migrate!("./migrations")`) run on connect; disabling
the feature assumes external migration orchestration.
*/

use std::sync::Arc;

use sqlx::{Row, SqlitePool};
use tracing::instrument;

use crate::runtime::persistence::{state_from_json, state_to_json, PersistedCheckpoint};
use crate::runtime::store::{Checkpoint, CheckpointStore, Result, StoreError};

/// SQLite-backed checkpoint store.
///
/// Storage is one row per session and is overwritten in place, so the
/// database stays small; completed sessions can be deleted by retention
/// jobs outside the engine (`DELETE FROM checkpoints WHERE status IN
/// ('COMPLETED','FAILED') AND updated_at < ...`).
pub struct SqliteStore {
    /// Shared connection pool for concurrent checkpoint operations.
    pool: Arc<SqlitePool>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish()
    }
}

impl SqliteStore {
    /// Connect to (or create) a SQLite database at `database_url`.
    /// Example URL: `"sqlite://dispatchflow.db"`.
    #[must_use = "store must be used to persist checkpoints"]
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| StoreError::Backend {
                message: format!("connect error: {e}"),
            })?;
        #[cfg(feature = "sqlite-migrations")]
        {
            if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
                return Err(StoreError::Backend {
                    message: format!("migration failure: {e}"),
                });
            }
        }
        #[cfg(not(feature = "sqlite-migrations"))]
        {
            // Feature disabled: schema is expected to exist already.
        }
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait::async_trait]
impl CheckpointStore for SqliteStore {
    #[instrument(skip(self), err)]
    async fn load(&self, session_id: &str) -> Result<Option<Checkpoint>> {
        let row = sqlx::query(
            r#"
            SELECT version, status, current_node, state_json, updated_at
            FROM checkpoints
            WHERE session_id = ?1
        "#,
        )
        .bind(session_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| StoreError::Backend {
            message: format!("load: {e}"),
        })?;

        let Some(row) = row else {
            return Ok(None);
        };

        let version: i64 = row.try_get("version").map_err(|e| StoreError::Backend {
            message: format!("load version: {e}"),
        })?;
        let status: String = row.try_get("status").map_err(|e| StoreError::Backend {
            message: format!("load status: {e}"),
        })?;
        let current_node: String =
            row.try_get("current_node").map_err(|e| StoreError::Backend {
                message: format!("load current_node: {e}"),
            })?;
        let state_json: String = row.try_get("state_json").map_err(|e| StoreError::Backend {
            message: format!("load state_json: {e}"),
        })?;
        let updated_at: String = row.try_get("updated_at").map_err(|e| StoreError::Backend {
            message: format!("load updated_at: {e}"),
        })?;

        let persisted = PersistedCheckpoint {
            session_id: session_id.to_string(),
            version: version as u64,
            status,
            current_node,
            state: state_from_json(&state_json)?,
            updated_at,
        };
        Ok(Some(Checkpoint::try_from(persisted)?))
    }

    #[instrument(skip(self, checkpoint), err)]
    async fn compare_and_swap(
        &self,
        expected_version: Option<u64>,
        checkpoint: &Checkpoint,
    ) -> Result<()> {
        let persisted = PersistedCheckpoint::from(checkpoint);
        let state_json = state_to_json(&persisted.state)?;

        match expected_version {
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO checkpoints (
                        session_id, version, status, current_node, state_json, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                )
                .bind(&persisted.session_id)
                .bind(persisted.version as i64)
                .bind(&persisted.status)
                .bind(&persisted.current_node)
                .bind(&state_json)
                .bind(&persisted.updated_at)
                .execute(&*self.pool)
                .await;

                match result {
                    Ok(_) => Ok(()),
                    Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                        Err(StoreError::Conflict {
                            session_id: checkpoint.session_id.clone(),
                            expected: None,
                        })
                    }
                    Err(e) => Err(StoreError::Backend {
                        message: format!("insert checkpoint: {e}"),
                    }),
                }
            }
            Some(expected) => {
                let result = sqlx::query(
                    r#"
                    UPDATE checkpoints
                    SET version = ?1,
                        status = ?2,
                        current_node = ?3,
                        state_json = ?4,
                        updated_at = ?5
                    WHERE session_id = ?6 AND version = ?7
                "#,
                )
                .bind(persisted.version as i64)
                .bind(&persisted.status)
                .bind(&persisted.current_node)
                .bind(&state_json)
                .bind(&persisted.updated_at)
                .bind(&persisted.session_id)
                .bind(expected as i64)
                .execute(&*self.pool)
                .await
                .map_err(|e| StoreError::Backend {
                    message: format!("update checkpoint: {e}"),
                })?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::Conflict {
                        session_id: checkpoint.session_id.clone(),
                        expected: Some(expected),
                    });
                }
                Ok(())
            }
        }
    }

    #[instrument(skip(self), err)]
    async fn list_sessions(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(r#"SELECT session_id FROM checkpoints ORDER BY session_id"#)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| StoreError::Backend {
                message: format!("list sessions: {e}"),
            })?;
        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("session_id")
                    .map_err(|e| StoreError::Backend {
                        message: format!("list sessions row: {e}"),
                    })
            })
            .collect()
    }
}
