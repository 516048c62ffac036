//! Core data models for the ingestion and retrieval pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A logical ingestion batch, owned by a user. Created once at the start of
/// a successful ingestion run and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    /// Human label, e.g. `"documents - 2026-08-23T10:15:00Z"`.
    pub name: String,
    pub owner_id: String,
    /// Open key-value map: document count, source directory, file pattern.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// One retrievable chunk: text plus its embedding vector. Belongs to exactly
/// one [`Resource`]; deleted when the owning resource is deleted.
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub id: String,
    pub resource_id: String,
    pub content: String,
    pub vector: Vec<f32>,
}

/// A chunk + vector pair staged for insertion (no identity yet).
#[derive(Debug, Clone, Serialize)]
pub struct NewEmbedding {
    pub content: String,
    pub vector: Vec<f32>,
}

/// One ranked hit from a hybrid query. Both component scores are exposed so
/// callers can inspect the blend for debugging and evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct RankedResult {
    pub content: String,
    pub resource_id: String,
    pub resource_name: String,
    pub resource_metadata: serde_json::Value,
    pub hybrid_score: f64,
    pub semantic_score: f64,
    pub keyword_score: f64,
}

/// Persisted outcome of one ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionRecord {
    pub id: String,
    pub owner_id: String,
    /// Source description, e.g. `"documents (*.txt)"`.
    pub source: String,
    pub documents_processed: usize,
    pub embeddings_created: usize,
    pub resource_id: Option<String>,
    /// `"completed"` or `"failed"`.
    pub status: String,
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// Persisted outcome of one security-analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct ScanRecord {
    pub id: String,
    pub owner_id: String,
    pub source: String,
    pub severity: String,
    pub issues_found: usize,
    pub logs_analyzed: u64,
    /// Full structured analysis, as JSON.
    pub analysis: serde_json::Value,
    pub alert_sent: bool,
    pub status: String,
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}
