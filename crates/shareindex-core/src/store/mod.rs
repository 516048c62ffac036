//! Storage abstraction for resources, embeddings, and audit records.
//!
//! [`ResourceStore`] covers the resource/embedding tables and the hybrid
//! query; [`AuditStore`] covers the per-run outcome rows (ingestion records
//! and scan records). Implementations must be `Send + Sync` so workflows
//! on different runs can share one store.
//!
//! # Batch insertion
//!
//! [`ResourceStore::insert_embeddings`] writes records in batches of
//! [`INSERT_BATCH_SIZE`] to bound transaction/request size, but the
//! operation as a whole is atomic: on failure nothing from the call is
//! visible and the returned error carries the cause. Successful calls
//! return the number of records committed.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{IngestionRecord, NewEmbedding, RankedResult, Resource, ScanRecord};

/// Upper bound on records per insertion batch.
pub const INSERT_BATCH_SIZE: usize = 100;

/// Inputs for one hybrid query.
#[derive(Debug, Clone)]
pub struct HybridQuery<'a> {
    /// Only records whose owning resource belongs to this principal are
    /// candidates.
    pub owner_id: &'a str,
    pub query_text: &'a str,
    pub query_vector: &'a [f32],
    /// Maximum results; must be > 0.
    pub top_k: usize,
    /// Semantic-vs-keyword weight in `[0, 1]`.
    pub alpha: f64,
    /// Optional allow-list restricting candidates to these resource ids.
    pub resource_filter: Option<&'a [String]>,
}

/// Persistence boundary for resources and their embedding records.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Create a resource atomically, returning its id.
    async fn create_resource(
        &self,
        name: &str,
        owner_id: &str,
        metadata: serde_json::Value,
    ) -> Result<String>;

    /// Insert embedding records for a resource. Atomic as a whole; returns
    /// the committed record count.
    async fn insert_embeddings(&self, resource_id: &str, records: &[NewEmbedding])
        -> Result<usize>;

    /// Hybrid-ranked query over the caller's records. Returns an empty
    /// sequence when no candidates exist.
    async fn query_hybrid(&self, query: &HybridQuery<'_>) -> Result<Vec<RankedResult>>;

    /// Delete a resource and all of its embedding records. Fails with
    /// `NotFound` when the resource is absent *or* owned by someone else,
    /// without distinguishing the two.
    async fn delete_resource(&self, resource_id: &str, owner_id: &str) -> Result<()>;

    /// List resources owned by a principal, oldest first.
    async fn list_resources(&self, owner_id: &str) -> Result<Vec<Resource>>;
}

/// Persistence boundary for workflow outcome rows. One row per completed
/// or failed run; owned by the caller, not by the workflow runner.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn record_ingestion(&self, record: &IngestionRecord) -> Result<()>;

    async fn record_scan(&self, record: &ScanRecord) -> Result<()>;

    /// Ingestion history for a principal, most recent first.
    async fn list_ingestions(&self, owner_id: &str) -> Result<Vec<IngestionRecord>>;

    /// Scan history for a principal, most recent first.
    async fn list_scans(&self, owner_id: &str) -> Result<Vec<ScanRecord>>;
}
