//! SQLite-backed [`ResourceStore`]/[`AuditStore`] implementation.
//!
//! Vectors are stored as little-endian f32 BLOBs. Candidate fetching keeps
//! `ORDER BY e.rowid` so hybrid ranking ties break by insertion order, the
//! same guarantee the in-memory store gives.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use shareindex_core::embedding::{blob_to_vec, vec_to_blob};
use shareindex_core::error::{Error, Result};
use shareindex_core::models::{
    IngestionRecord, NewEmbedding, RankedResult, Resource, ScanRecord,
};
use shareindex_core::rank::{rank_candidates, RankCandidate, RankOptions};
use shareindex_core::store::{AuditStore, HybridQuery, ResourceStore, INSERT_BATCH_SIZE};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn storage_err(err: sqlx::Error) -> Error {
    Error::Storage(err.to_string())
}

fn parse_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_json(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or(serde_json::json!({}))
}

#[async_trait]
impl ResourceStore for SqliteStore {
    async fn create_resource(
        &self,
        name: &str,
        owner_id: &str,
        metadata: serde_json::Value,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO resources (id, name, owner_id, metadata_json, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(owner_id)
        .bind(metadata.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(id)
    }

    async fn insert_embeddings(
        &self,
        resource_id: &str,
        records: &[NewEmbedding],
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let exists = sqlx::query("SELECT 1 FROM resources WHERE id = ?")
            .bind(resource_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage_err)?;
        if exists.is_none() {
            return Err(Error::Storage(format!(
                "resource {resource_id} does not exist"
            )));
        }

        // One transaction spans all batches, so the call is atomic even
        // though statements are issued in bounded groups.
        for batch in records.chunks(INSERT_BATCH_SIZE) {
            for record in batch {
                sqlx::query(
                    "INSERT INTO embeddings (id, resource_id, content, vector) VALUES (?, ?, ?, ?)",
                )
                .bind(Uuid::new_v4().to_string())
                .bind(resource_id)
                .bind(&record.content)
                .bind(vec_to_blob(&record.vector))
                .execute(&mut *tx)
                .await
                .map_err(storage_err)?;
            }
        }

        tx.commit().await.map_err(storage_err)?;
        Ok(records.len())
    }

    async fn query_hybrid(&self, query: &HybridQuery<'_>) -> Result<Vec<RankedResult>> {
        let rows = sqlx::query(
            r#"
            SELECT e.resource_id, e.content, e.vector,
                   r.name AS resource_name, r.metadata_json
            FROM embeddings e
            JOIN resources r ON r.id = e.resource_id
            WHERE r.owner_id = ?
            ORDER BY e.rowid
            "#,
        )
        .bind(query.owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let candidates: Vec<RankCandidate> = rows
            .iter()
            .filter_map(|row| {
                let resource_id: String = row.get("resource_id");
                if let Some(allowed) = query.resource_filter {
                    if !allowed.contains(&resource_id) {
                        return None;
                    }
                }
                let blob: Vec<u8> = row.get("vector");
                let metadata_json: String = row.get("metadata_json");
                Some(RankCandidate {
                    resource_id,
                    resource_name: row.get("resource_name"),
                    resource_metadata: parse_json(&metadata_json),
                    content: row.get("content"),
                    vector: blob_to_vec(&blob),
                })
            })
            .collect();

        rank_candidates(
            query.query_text,
            query.query_vector,
            &candidates,
            &RankOptions {
                top_k: query.top_k,
                alpha: query.alpha,
            },
        )
    }

    async fn delete_resource(&self, resource_id: &str, owner_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        // Absent and not-owned are indistinguishable to the caller.
        let owned = sqlx::query("SELECT 1 FROM resources WHERE id = ? AND owner_id = ?")
            .bind(resource_id)
            .bind(owner_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage_err)?;
        if owned.is_none() {
            return Err(Error::NotFound);
        }

        sqlx::query("DELETE FROM embeddings WHERE resource_id = ?")
            .bind(resource_id)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        sqlx::query("DELETE FROM resources WHERE id = ?")
            .bind(resource_id)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    async fn list_resources(&self, owner_id: &str) -> Result<Vec<Resource>> {
        let rows = sqlx::query(
            "SELECT id, name, owner_id, metadata_json, created_at FROM resources WHERE owner_id = ? ORDER BY created_at ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows
            .iter()
            .map(|row| {
                let metadata_json: String = row.get("metadata_json");
                let created_at: String = row.get("created_at");
                Resource {
                    id: row.get("id"),
                    name: row.get("name"),
                    owner_id: row.get("owner_id"),
                    metadata: parse_json(&metadata_json),
                    created_at: parse_ts(&created_at),
                }
            })
            .collect())
    }
}

#[async_trait]
impl AuditStore for SqliteStore {
    async fn record_ingestion(&self, record: &IngestionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ingestions (id, owner_id, source, documents_processed,
                                    embeddings_created, resource_id, status, error, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.owner_id)
        .bind(&record.source)
        .bind(record.documents_processed as i64)
        .bind(record.embeddings_created as i64)
        .bind(&record.resource_id)
        .bind(&record.status)
        .bind(&record.error)
        .bind(record.completed_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn record_scan(&self, record: &ScanRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO security_scans (id, owner_id, source, severity, issues_found,
                                        logs_analyzed, analysis_json, alert_sent, status,
                                        error, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.owner_id)
        .bind(&record.source)
        .bind(&record.severity)
        .bind(record.issues_found as i64)
        .bind(record.logs_analyzed as i64)
        .bind(record.analysis.to_string())
        .bind(record.alert_sent)
        .bind(&record.status)
        .bind(&record.error)
        .bind(record.completed_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn list_ingestions(&self, owner_id: &str) -> Result<Vec<IngestionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, source, documents_processed, embeddings_created,
                   resource_id, status, error, completed_at
            FROM ingestions WHERE owner_id = ? ORDER BY completed_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows
            .iter()
            .map(|row| {
                let docs: i64 = row.get("documents_processed");
                let embs: i64 = row.get("embeddings_created");
                let completed_at: String = row.get("completed_at");
                IngestionRecord {
                    id: row.get("id"),
                    owner_id: row.get("owner_id"),
                    source: row.get("source"),
                    documents_processed: docs as usize,
                    embeddings_created: embs as usize,
                    resource_id: row.get("resource_id"),
                    status: row.get("status"),
                    error: row.get("error"),
                    completed_at: parse_ts(&completed_at),
                }
            })
            .collect())
    }

    async fn list_scans(&self, owner_id: &str) -> Result<Vec<ScanRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, source, severity, issues_found, logs_analyzed,
                   analysis_json, alert_sent, status, error, completed_at
            FROM security_scans WHERE owner_id = ? ORDER BY completed_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows
            .iter()
            .map(|row| {
                let issues: i64 = row.get("issues_found");
                let logs: i64 = row.get("logs_analyzed");
                let analysis_json: String = row.get("analysis_json");
                let completed_at: String = row.get("completed_at");
                ScanRecord {
                    id: row.get("id"),
                    owner_id: row.get("owner_id"),
                    source: row.get("source"),
                    severity: row.get("severity"),
                    issues_found: issues as usize,
                    logs_analyzed: logs as u64,
                    analysis: parse_json(&analysis_json),
                    alert_sent: row.get("alert_sent"),
                    status: row.get("status"),
                    error: row.get("error"),
                    completed_at: parse_ts(&completed_at),
                }
            })
            .collect())
    }
}
