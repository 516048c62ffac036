//! In-memory [`ResourceStore`]/[`AuditStore`] implementation for tests.
//!
//! Uses `Vec`s behind `std::sync::RwLock`; records keep insertion order,
//! which is what gives the hybrid ranker its deterministic tie-breaking.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{EmbeddingRecord, IngestionRecord, NewEmbedding, RankedResult, Resource, ScanRecord};
use crate::rank::{rank_candidates, RankCandidate, RankOptions};

use super::{AuditStore, HybridQuery, ResourceStore, INSERT_BATCH_SIZE};

#[derive(Default)]
struct Inner {
    resources: Vec<Resource>,
    records: Vec<EmbeddingRecord>,
    ingestions: Vec<IngestionRecord>,
    scans: Vec<ScanRecord>,
}

/// In-memory store for tests and single-process embedding experiments.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of embedding records currently stored (all owners).
    pub fn record_count(&self) -> usize {
        self.inner.read().unwrap().records.len()
    }

    /// Number of resources currently stored (all owners).
    pub fn resource_count(&self) -> usize {
        self.inner.read().unwrap().resources.len()
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn create_resource(
        &self,
        name: &str,
        owner_id: &str,
        metadata: serde_json::Value,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let mut inner = self.inner.write().unwrap();
        inner.resources.push(Resource {
            id: id.clone(),
            name: name.to_string(),
            owner_id: owner_id.to_string(),
            metadata,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn insert_embeddings(
        &self,
        resource_id: &str,
        records: &[NewEmbedding],
    ) -> Result<usize> {
        let mut inner = self.inner.write().unwrap();
        if !inner.resources.iter().any(|r| r.id == resource_id) {
            return Err(Error::Storage(format!(
                "resource {resource_id} does not exist"
            )));
        }
        // Batching mirrors the SQL store; in memory every batch succeeds,
        // so the call is trivially atomic.
        for batch in records.chunks(INSERT_BATCH_SIZE) {
            for record in batch {
                inner.records.push(EmbeddingRecord {
                    id: Uuid::new_v4().to_string(),
                    resource_id: resource_id.to_string(),
                    content: record.content.clone(),
                    vector: record.vector.clone(),
                });
            }
        }
        Ok(records.len())
    }

    async fn query_hybrid(&self, query: &HybridQuery<'_>) -> Result<Vec<RankedResult>> {
        let inner = self.inner.read().unwrap();
        let candidates: Vec<RankCandidate> = inner
            .records
            .iter()
            .filter_map(|record| {
                let resource = inner
                    .resources
                    .iter()
                    .find(|r| r.id == record.resource_id)?;
                if resource.owner_id != query.owner_id {
                    return None;
                }
                if let Some(allowed) = query.resource_filter {
                    if !allowed.contains(&record.resource_id) {
                        return None;
                    }
                }
                Some(RankCandidate {
                    resource_id: record.resource_id.clone(),
                    resource_name: resource.name.clone(),
                    resource_metadata: resource.metadata.clone(),
                    content: record.content.clone(),
                    vector: record.vector.clone(),
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
        let mut inner = self.inner.write().unwrap();
        let owned = inner
            .resources
            .iter()
            .any(|r| r.id == resource_id && r.owner_id == owner_id);
        if !owned {
            return Err(Error::NotFound);
        }
        // Two-phase delete: records first, then the resource.
        inner.records.retain(|e| e.resource_id != resource_id);
        inner.resources.retain(|r| r.id != resource_id);
        Ok(())
    }

    async fn list_resources(&self, owner_id: &str) -> Result<Vec<Resource>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .resources
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AuditStore for InMemoryStore {
    async fn record_ingestion(&self, record: &IngestionRecord) -> Result<()> {
        self.inner.write().unwrap().ingestions.push(record.clone());
        Ok(())
    }

    async fn record_scan(&self, record: &ScanRecord) -> Result<()> {
        self.inner.write().unwrap().scans.push(record.clone());
        Ok(())
    }

    async fn list_ingestions(&self, owner_id: &str) -> Result<Vec<IngestionRecord>> {
        let inner = self.inner.read().unwrap();
        let mut out: Vec<IngestionRecord> = inner
            .ingestions
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        out.reverse();
        Ok(out)
    }

    async fn list_scans(&self, owner_id: &str) -> Result<Vec<ScanRecord>> {
        let inner = self.inner.read().unwrap();
        let mut out: Vec<ScanRecord> = inner
            .scans
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        out.reverse();
        Ok(out)
    }
}
