//! Ingestion workflow: file share → chunks → embeddings → resource store.
//!
//! Composes the chunker, the embedding provider, and the resource store
//! inside the workflow runner. Steps, in order:
//!
//! 1. `collect_documents` — list and read matching files; unreadable files
//!    are logged and skipped, never fatal.
//! 2. `chunk_and_embed` — chunk every document, embed all chunks in one
//!    batch call.
//! 3. `store_embeddings` — create one resource for the run, insert records
//!    in bounded batches.
//! 4. `record_outcome` — write the ingestion audit row.
//!
//! A run that collects zero readable documents, or whose documents all
//! chunk to nothing, completes successfully with zero embeddings and no
//! resource. Any step failure aborts the run; the
//! failure path writes a `failed` audit row with the error attached and
//! zero counts.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chunk::{chunk, ChunkOptions};
use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::files::{DocumentFile, FileSource, ReadFailure};
use crate::models::{IngestionRecord, NewEmbedding};
use crate::store::{AuditStore, ResourceStore};
use crate::workflow::{WorkflowRun, WorkflowRunner};

/// Trigger input for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub owner_id: String,
    /// Directory on the share to collect from, e.g. `"documents"`.
    pub directory: String,
    /// File glob, e.g. `"*.txt"`.
    pub pattern: String,
    pub chunk: ChunkOptions,
}

/// Caller-visible result of one ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub resource_id: Option<String>,
    pub documents_processed: usize,
    pub embeddings_created: usize,
    /// Files that matched but could not be read.
    pub skipped: Vec<ReadFailure>,
}

/// The ingestion workflow, wired to its collaborators.
pub struct IngestionWorkflow<'a> {
    pub files: &'a dyn FileSource,
    pub embeddings: &'a dyn EmbeddingProvider,
    pub store: &'a dyn ResourceStore,
    pub audit: &'a dyn AuditStore,
    pub runner: WorkflowRunner,
}

#[derive(Serialize)]
struct CollectOutput {
    documents: Vec<DocumentFile>,
    skipped: Vec<ReadFailure>,
}

impl IngestionWorkflow<'_> {
    /// Execute one ingestion run.
    ///
    /// Always returns the finished [`WorkflowRun`]; the `Result` carries
    /// the report on success or the aborting error (kind + message). The
    /// audit row is written in both cases.
    pub async fn run(&self, opts: &IngestionOptions) -> (WorkflowRun, Result<IngestionReport>) {
        let source = format!("{} ({})", opts.directory, opts.pattern);
        let source_label = source.clone();

        let (run, result) = self
            .runner
            .run("rag-ingest", |ctx| async move {
                let source = source_label;
                let collected = ctx
                    .step("collect_documents", self.collect_documents(opts))
                    .await?;
                let documents = collected.documents;
                let skipped = collected.skipped;

                if documents.is_empty() {
                    // Nothing matched: a successful run with zero counts,
                    // and no resource is created.
                    let report = IngestionReport {
                        resource_id: None,
                        documents_processed: 0,
                        embeddings_created: 0,
                        skipped,
                    };
                    ctx.step(
                        "record_outcome",
                        self.record_completed(opts, &source, &report),
                    )
                    .await?;
                    return Ok(report);
                }

                let staged = ctx
                    .step("chunk_and_embed", self.chunk_and_embed(opts, &documents))
                    .await?;

                if staged.is_empty() {
                    // Documents were readable but chunked to nothing (e.g.
                    // whitespace-only content). A resource owning zero
                    // records is never committed.
                    let report = IngestionReport {
                        resource_id: None,
                        documents_processed: documents.len(),
                        embeddings_created: 0,
                        skipped,
                    };
                    ctx.step(
                        "record_outcome",
                        self.record_completed(opts, &source, &report),
                    )
                    .await?;
                    return Ok(report);
                }
                let embeddings_created = staged.len();

                let resource_id = ctx
                    .step("store_embeddings", self.store_embeddings(opts, staged))
                    .await?;

                let report = IngestionReport {
                    resource_id: Some(resource_id),
                    documents_processed: documents.len(),
                    embeddings_created,
                    skipped,
                };
                ctx.step(
                    "record_outcome",
                    self.record_completed(opts, &source, &report),
                )
                .await?;

                info!(
                    documents = report.documents_processed,
                    embeddings = report.embeddings_created,
                    "ingestion completed"
                );
                Ok(report)
            })
            .await;

        if let Err(err) = &result {
            // Compensating action on the failure path: persist the failed
            // run. A failed ingestion reports zero counts plus the error.
            let record = IngestionRecord {
                id: Uuid::new_v4().to_string(),
                owner_id: opts.owner_id.clone(),
                source,
                documents_processed: 0,
                embeddings_created: 0,
                resource_id: None,
                status: "failed".to_string(),
                error: Some(format!("{}: {}", err.kind(), err)),
                completed_at: Utc::now(),
            };
            if let Err(audit_err) = self.audit.record_ingestion(&record).await {
                warn!(error = %audit_err, "failed to persist failed-ingestion record");
            }
        }

        (run, result)
    }

    /// Step 1: list matching files and read each one. Directories and
    /// empty files are skipped silently; read failures are collected.
    async fn collect_documents(&self, opts: &IngestionOptions) -> Result<CollectOutput> {
        let entries = self.files.list_files(&opts.directory, &opts.pattern).await?;
        info!(files = entries.len(), directory = %opts.directory, "listed share directory");

        let mut documents = Vec::new();
        let mut skipped = Vec::new();
        for entry in entries {
            if entry.is_directory || entry.size == 0 {
                continue;
            }
            let path = format!("{}/{}", opts.directory, entry.name);
            match self.files.read_file(&path).await {
                Ok(content) => documents.push(DocumentFile {
                    name: entry.name,
                    content,
                    size: entry.size,
                    modified: entry.modified,
                }),
                Err(err) => {
                    warn!(path = %path, error = %err, "skipping unreadable file");
                    skipped.push(ReadFailure {
                        path,
                        message: err.to_string(),
                    });
                }
            }
        }

        Ok(CollectOutput { documents, skipped })
    }

    /// Step 2: chunk every document and embed all chunks in one batch.
    async fn chunk_and_embed(
        &self,
        opts: &IngestionOptions,
        documents: &[DocumentFile],
    ) -> Result<Vec<NewEmbedding>> {
        let mut contents = Vec::new();
        for doc in documents {
            for piece in chunk(&doc.content, &opts.chunk)? {
                // Chunk metadata travels with the content so retrieval can
                // show provenance without a join back to the document.
                contents.push(format!(
                    "[source: {} | chunk: {} | modified: {}]\n{}",
                    doc.name,
                    piece.index,
                    doc.modified.to_rfc3339(),
                    piece.content
                ));
            }
        }
        info!(chunks = contents.len(), "chunked documents");

        if contents.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.embeddings.embed_batch(&contents).await?;
        if vectors.len() != contents.len() {
            return Err(Error::EmbeddingProvider(format!(
                "expected {} vectors, got {}",
                contents.len(),
                vectors.len()
            )));
        }

        Ok(contents
            .into_iter()
            .zip(vectors)
            .map(|(content, vector)| NewEmbedding { content, vector })
            .collect())
    }

    /// Step 3: one resource per run, then batched record insertion.
    async fn store_embeddings(
        &self,
        opts: &IngestionOptions,
        staged: Vec<NewEmbedding>,
    ) -> Result<String> {
        let name = format!("{} - {}", opts.directory, Utc::now().to_rfc3339());
        let metadata = serde_json::json!({
            "document_count": staged.len(),
            "directory": opts.directory,
            "file_pattern": opts.pattern,
        });
        let resource_id = self
            .store
            .create_resource(&name, &opts.owner_id, metadata)
            .await?;
        let inserted = self.store.insert_embeddings(&resource_id, &staged).await?;
        info!(resource = %resource_id, inserted, "stored embeddings");
        Ok(resource_id)
    }

    /// Step 4 (success path): persist the completed ingestion row.
    async fn record_completed(
        &self,
        opts: &IngestionOptions,
        source: &str,
        report: &IngestionReport,
    ) -> Result<()> {
        self.audit
            .record_ingestion(&IngestionRecord {
                id: Uuid::new_v4().to_string(),
                owner_id: opts.owner_id.clone(),
                source: source.to_string(),
                documents_processed: report.documents_processed,
                embeddings_created: report.embeddings_created,
                resource_id: report.resource_id.clone(),
                status: "completed".to_string(),
                error: None,
                completed_at: Utc::now(),
            })
            .await
    }
}
