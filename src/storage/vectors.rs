//! Vector storage implementation using sqlite-vec
//!
//! One vec0 virtual table serves every vector consumer, partitioned by
//! namespace: document chunks live under `docs:{session}` and long-term
//! memories under `memory:{owner}`. KNN queries are constrained to a single
//! namespace, so cross-session retrieval cannot happen at the query level.
//!
//! - rusqlite with sqlite-vec extension for vector operations
//! - Connection pooling for concurrent access (deadpool-sqlite)

use crate::error::{AnamnesisError, Result};
use deadpool_sqlite::{Config, Pool, Runtime};
use rusqlite::Result as SqliteResult;
use std::path::Path;
use tracing::{debug, info};

/// Default connection pool size
const DEFAULT_POOL_SIZE: usize = 20;

/// An entry to upsert: identifier, embedding, and payload metadata
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    /// Source provenance (file name, URL, or memory owner)
    pub source: String,
    /// Stored text payload
    pub body: String,
    /// Sequence position within the source (0 for memories)
    pub seq: i64,
}

/// A similarity-search hit
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub id: String,
    /// Cosine similarity (1.0 = identical)
    pub score: f32,
    pub source: String,
    pub body: String,
}

/// Namespace-partitioned vector storage backed by sqlite-vec
pub struct VectorStore {
    pool: Pool,
    dimensions: usize,
}

impl VectorStore {
    /// Open (or create) vector storage with the default pool size
    pub fn open<P: AsRef<Path>>(db_path: P, dimensions: usize) -> Result<Self> {
        Self::with_pool_size(db_path, dimensions, DEFAULT_POOL_SIZE)
    }

    /// Open vector storage with a custom pool size
    pub fn with_pool_size<P: AsRef<Path>>(
        db_path: P,
        dimensions: usize,
        pool_size: usize,
    ) -> Result<Self> {
        let path_str = db_path.as_ref().to_string_lossy().to_string();
        info!(
            "Creating vector storage pool at: {} (dimensions: {}, pool_size: {})",
            path_str, dimensions, pool_size
        );

        // Load sqlite-vec extension as auto-extension so it is available for
        // all connections in the pool
        unsafe {
            use rusqlite::ffi::sqlite3_auto_extension;

            #[allow(clippy::missing_transmute_annotations)]
            sqlite3_auto_extension(Some(std::mem::transmute(
                sqlite_vec::sqlite3_vec_init as *const (),
            )));
        }

        let mut config = Config::new(path_str);
        config.pool = Some(deadpool_sqlite::PoolConfig::new(pool_size));
        let pool = config.create_pool(Runtime::Tokio1).map_err(|e| {
            AnamnesisError::VectorStore(format!("Failed to create connection pool: {}", e))
        })?;

        Ok(Self { pool, dimensions })
    }

    /// Create the vec0 virtual table
    ///
    /// Safe to call multiple times (uses IF NOT EXISTS). The namespace is a
    /// partition key, so KNN search only ever scans one namespace's vectors.
    pub async fn init_schema(&self) -> Result<()> {
        info!(
            "Creating vec0 virtual table for vectors (dimensions: {})",
            self.dimensions
        );

        let sql = format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS vector_entries USING vec0(
                entry_id text primary key,
                namespace text partition key,
                embedding float[{}] distance_metric=cosine,
                +source text,
                +body text,
                +seq integer
            )",
            self.dimensions
        );

        let conn = self.conn().await?;
        conn.interact(move |conn| {
            conn.execute(&sql, []).map_err(|e| {
                AnamnesisError::VectorStore(format!("Failed to create vec0 table: {}", e))
            })
        })
        .await
        .map_err(|e| AnamnesisError::VectorStore(format!("Pool interaction failed: {}", e)))??;

        info!("Vector table ready");
        Ok(())
    }

    /// Upsert a batch of records into a namespace
    ///
    /// Existing entry ids are replaced, which is what makes the
    /// content-addressed memory store idempotent. Returns the number of
    /// records written; any failure aborts the whole batch.
    pub async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        for record in &records {
            if record.embedding.len() != self.dimensions {
                return Err(AnamnesisError::VectorStore(format!(
                    "Embedding dimension mismatch for '{}': expected {}, got {}",
                    record.id,
                    self.dimensions,
                    record.embedding.len()
                )));
            }
        }

        debug!(
            "Upserting {} vectors into namespace '{}'",
            records.len(),
            namespace
        );

        let namespace = namespace.to_string();
        let conn = self.conn().await?;

        let count = conn
            .interact(move |conn| -> Result<usize> {
                let tx = conn.transaction().map_err(|e| {
                    AnamnesisError::VectorStore(format!("Failed to begin transaction: {}", e))
                })?;

                let mut count = 0;
                {
                    // Virtual tables don't support INSERT OR REPLACE, so
                    // delete first if the id exists
                    let mut delete = tx
                        .prepare("DELETE FROM vector_entries WHERE entry_id = ?")
                        .map_err(|e| {
                            AnamnesisError::VectorStore(format!(
                                "Failed to prepare delete: {}",
                                e
                            ))
                        })?;
                    let mut insert = tx
                        .prepare(
                            "INSERT INTO vector_entries
                                 (entry_id, namespace, embedding, source, body, seq)
                             VALUES (?, ?, vec_f32(?), ?, ?, ?)",
                        )
                        .map_err(|e| {
                            AnamnesisError::VectorStore(format!(
                                "Failed to prepare insert: {}",
                                e
                            ))
                        })?;

                    for record in &records {
                        let embedding_json =
                            serde_json::to_string(&record.embedding).map_err(|e| {
                                AnamnesisError::VectorStore(format!(
                                    "Failed to serialize embedding: {}",
                                    e
                                ))
                            })?;

                        delete.execute(rusqlite::params![&record.id]).map_err(|e| {
                            AnamnesisError::VectorStore(format!(
                                "Failed to delete existing vector: {}",
                                e
                            ))
                        })?;
                        insert
                            .execute(rusqlite::params![
                                &record.id,
                                &namespace,
                                &embedding_json,
                                &record.source,
                                &record.body,
                                record.seq,
                            ])
                            .map_err(|e| {
                                AnamnesisError::VectorStore(format!(
                                    "Failed to insert vector: {}",
                                    e
                                ))
                            })?;
                        count += 1;
                    }
                }

                tx.commit().map_err(|e| {
                    AnamnesisError::VectorStore(format!("Failed to commit transaction: {}", e))
                })?;

                Ok(count)
            })
            .await
            .map_err(|e| AnamnesisError::VectorStore(format!("Pool interaction failed: {}", e)))??;

        debug!("Upserted {} vectors", count);
        Ok(count)
    }

    /// KNN search within a single namespace
    ///
    /// Returns up to `top_k` matches ordered by descending cosine
    /// similarity. The namespace constraint is part of the query itself —
    /// no post-filtering — so results can never leak across namespaces.
    pub async fn query(
        &self,
        namespace: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorMatch>> {
        if query_embedding.len() != self.dimensions {
            return Err(AnamnesisError::VectorStore(format!(
                "Query embedding dimension mismatch: expected {}, got {}",
                self.dimensions,
                query_embedding.len()
            )));
        }

        debug!("Vector search in namespace '{}' (k={})", namespace, top_k);

        let query_json = serde_json::to_string(query_embedding).map_err(|e| {
            AnamnesisError::VectorStore(format!("Failed to serialize query: {}", e))
        })?;
        let namespace = namespace.to_string();

        let conn = self.conn().await?;
        let results = conn
            .interact(move |conn| -> Result<Vec<VectorMatch>> {
                let mut stmt = conn
                    .prepare(
                        "SELECT entry_id, distance, source, body
                         FROM vector_entries
                         WHERE embedding MATCH vec_f32(?)
                           AND k = ?
                           AND namespace = ?
                         ORDER BY distance",
                    )
                    .map_err(|e| {
                        AnamnesisError::VectorStore(format!("Failed to prepare search: {}", e))
                    })?;

                let results: SqliteResult<Vec<VectorMatch>> = stmt
                    .query_map(
                        rusqlite::params![query_json, top_k as i64, namespace],
                        |row| {
                            let distance: f32 = row.get(1)?;
                            Ok(VectorMatch {
                                id: row.get(0)?,
                                // cosine distance = 1 - cosine similarity
                                score: 1.0 - distance,
                                source: row.get(2)?,
                                body: row.get(3)?,
                            })
                        },
                    )
                    .and_then(|mapped| mapped.collect::<SqliteResult<Vec<_>>>());

                results.map_err(|e| {
                    AnamnesisError::VectorStore(format!("Failed to execute vector search: {}", e))
                })
            })
            .await
            .map_err(|e| AnamnesisError::VectorStore(format!("Pool interaction failed: {}", e)))??;

        debug!("Vector search returned {} results", results.len());
        Ok(results)
    }

    /// Count entries in a namespace
    pub async fn count(&self, namespace: &str) -> Result<usize> {
        let namespace = namespace.to_string();
        let conn = self.conn().await?;

        let count = conn
            .interact(move |conn| -> Result<usize> {
                let count: i64 = conn
                    .query_row(
                        "SELECT COUNT(*) FROM vector_entries WHERE namespace = ?",
                        rusqlite::params![namespace],
                        |row| row.get(0),
                    )
                    .map_err(|e| {
                        AnamnesisError::VectorStore(format!("Failed to count vectors: {}", e))
                    })?;
                Ok(count as usize)
            })
            .await
            .map_err(|e| AnamnesisError::VectorStore(format!("Pool interaction failed: {}", e)))??;

        Ok(count)
    }

    /// Vector dimensionality this store was opened with
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn conn(&self) -> Result<deadpool_sqlite::Object> {
        self.pool.get().await.map_err(|e| {
            AnamnesisError::VectorStore(format!("Failed to get connection from pool: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_store() -> (VectorStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let store = VectorStore::open(db_path, 3).unwrap();
        store.init_schema().await.unwrap();
        (store, temp_dir)
    }

    fn record(id: &str, embedding: Vec<f32>, body: &str) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            embedding,
            source: "test".to_string(),
            body: body.to_string(),
            seq: 0,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_query() {
        let (store, _temp) = create_test_store().await;

        store
            .upsert(
                "docs:s1",
                vec![
                    record("a", vec![1.0, 0.0, 0.0], "first"),
                    record("b", vec![0.9, 0.1, 0.0], "second"),
                    record("c", vec![0.0, 0.0, 1.0], "third"),
                ],
            )
            .await
            .unwrap();

        let results = store.query("docs:s1", &[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert!(results[0].score > 0.99);
        assert_eq!(results[1].id, "b");
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_namespace_isolation() {
        let (store, _temp) = create_test_store().await;

        store
            .upsert("docs:s1", vec![record("s1-a", vec![1.0, 0.0, 0.0], "ours")])
            .await
            .unwrap();
        store
            .upsert(
                "docs:s2",
                vec![record("s2-a", vec![1.0, 0.0, 0.0], "theirs")],
            )
            .await
            .unwrap();

        let results = store.query("docs:s1", &[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "s1-a");

        let results = store.query("docs:s2", &[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "s2-a");
    }

    #[tokio::test]
    async fn test_upsert_same_id_replaces() {
        let (store, _temp) = create_test_store().await;

        store
            .upsert("memory:u1", vec![record("m1", vec![1.0, 0.0, 0.0], "v1")])
            .await
            .unwrap();
        store
            .upsert("memory:u1", vec![record("m1", vec![0.0, 1.0, 0.0], "v2")])
            .await
            .unwrap();

        assert_eq!(store.count("memory:u1").await.unwrap(), 1);

        let results = store
            .query("memory:u1", &[0.0, 1.0, 0.0], 5)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].body, "v2");
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let (store, _temp) = create_test_store().await;

        let result = store
            .upsert("docs:s1", vec![record("bad", vec![1.0, 0.0], "short")])
            .await;
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("dimension mismatch"));

        let result = store.query("docs:s1", &[1.0, 0.0], 5).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_empty_namespace_query() {
        let (store, _temp) = create_test_store().await;

        let results = store
            .query("docs:empty", &[1.0, 0.0, 0.0], 5)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_empty_upsert_is_noop() {
        let (store, _temp) = create_test_store().await;
        assert_eq!(store.upsert("docs:s1", vec![]).await.unwrap(), 0);
        assert_eq!(store.count("docs:s1").await.unwrap(), 0);
    }
}
