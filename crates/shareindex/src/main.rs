//! # Shareindex CLI (`sidx`)
//!
//! Commands for database initialization, share ingestion, hybrid retrieval,
//! resource management, history, and security-log scans.
//!
//! ## Usage
//!
//! ```bash
//! sidx --config ./config/sidx.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sidx init` | Create the SQLite database and schema |
//! | `sidx ingest <directory>` | Ingest matching share files into a new resource |
//! | `sidx query "<text>"` | Hybrid (semantic + keyword) retrieval |
//! | `sidx resources` | List owned resources |
//! | `sidx delete <resource-id>` | Delete a resource and its records |
//! | `sidx scan` | Run the security-log analysis workflow |
//! | `sidx history` | Ingestion and scan history, most recent first |

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use shareindex::config::{self, Config};
use shareindex::db;
use shareindex::embedding::HttpEmbeddingProvider;
use shareindex::fs_source::MountedShare;
use shareindex::llm::ChatAnalyst;
use shareindex::notify::{DisabledNotifier, WebhookNotifier};
use shareindex::sqlite_store::SqliteStore;
use shareindex_core::chunk::ChunkOptions;
use shareindex_core::embedding::EmbeddingProvider;
use shareindex_core::ingest::{IngestionOptions, IngestionWorkflow};
use shareindex_core::security::{Notifier, ScanOptions, SecurityWorkflow, Severity};
use shareindex_core::store::{AuditStore, HybridQuery, ResourceStore};
use shareindex_core::workflow::WorkflowRunner;

#[derive(Parser)]
#[command(
    name = "sidx",
    about = "Shareindex — hybrid retrieval and security scanning over a mounted file share",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sidx.toml")]
    config: PathBuf,

    /// Acting principal; scopes every resource and history row.
    #[arg(long, global = true, default_value = "default")]
    owner: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Ingest matching files from a share directory into a new resource.
    Ingest {
        /// Directory on the share, relative to its root (e.g. `documents`).
        directory: String,

        /// File glob applied to names in the directory.
        #[arg(long, default_value = "*.txt")]
        pattern: String,

        /// Words per chunk (overrides config).
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Overlapping words between adjacent chunks (overrides config).
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Hybrid retrieval over the owner's ingested records.
    Query {
        /// Query text.
        query: String,

        /// Maximum results (overrides config).
        #[arg(long)]
        top_k: Option<usize>,

        /// Semantic-vs-keyword weight in [0, 1] (overrides config).
        #[arg(long)]
        alpha: Option<f64>,

        /// Restrict to these resource ids (repeatable).
        #[arg(long = "resource")]
        resources: Vec<String>,
    },

    /// List resources owned by the acting principal.
    Resources,

    /// Delete a resource and all of its embedding records.
    Delete {
        /// Resource id.
        resource_id: String,
    },

    /// Run the security-log analysis workflow once.
    Scan {
        /// Log directory on the share (overrides config).
        #[arg(long)]
        log_directory: Option<String>,

        /// Alert recipient (repeatable, overrides config).
        #[arg(long = "recipient")]
        recipients: Vec<String>,

        /// Alert threshold: none, low, medium, high, critical (overrides config).
        #[arg(long)]
        threshold: Option<String>,
    },

    /// Show ingestion and scan history, most recent first.
    History,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            db::migrate(&pool).await?;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Ingest {
            directory,
            pattern,
            chunk_size,
            overlap,
        } => {
            run_ingest(&cfg, &cli.owner, directory, pattern, chunk_size, overlap).await?;
        }
        Commands::Query {
            query,
            top_k,
            alpha,
            resources,
        } => {
            run_query(&cfg, &cli.owner, &query, top_k, alpha, resources).await?;
        }
        Commands::Resources => {
            let store = open_store(&cfg).await?;
            let resources = store.list_resources(&cli.owner).await?;
            if resources.is_empty() {
                println!("No resources.");
            }
            for resource in resources {
                println!(
                    "{}  {}  (created {})",
                    resource.id,
                    resource.name,
                    resource.created_at.to_rfc3339()
                );
            }
        }
        Commands::Delete { resource_id } => {
            let store = open_store(&cfg).await?;
            store.delete_resource(&resource_id, &cli.owner).await?;
            println!("Deleted resource {resource_id}");
        }
        Commands::Scan {
            log_directory,
            recipients,
            threshold,
        } => {
            run_scan(&cfg, &cli.owner, log_directory, recipients, threshold).await?;
        }
        Commands::History => {
            let store = open_store(&cfg).await?;
            println!("Ingestions:");
            for record in store.list_ingestions(&cli.owner).await? {
                println!(
                    "  {}  {}  {}  docs={} embeddings={}{}",
                    record.completed_at.to_rfc3339(),
                    record.status,
                    record.source,
                    record.documents_processed,
                    record.embeddings_created,
                    record
                        .error
                        .as_deref()
                        .map(|e| format!("  error: {e}"))
                        .unwrap_or_default()
                );
            }
            println!("Scans:");
            for record in store.list_scans(&cli.owner).await? {
                println!(
                    "  {}  {}  {}  severity={} issues={} alert_sent={}{}",
                    record.completed_at.to_rfc3339(),
                    record.status,
                    record.source,
                    record.severity,
                    record.issues_found,
                    record.alert_sent,
                    record
                        .error
                        .as_deref()
                        .map(|e| format!("  error: {e}"))
                        .unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}

async fn open_store(cfg: &Config) -> anyhow::Result<SqliteStore> {
    let pool = db::connect(&cfg.db.path).await?;
    db::migrate(&pool).await?;
    Ok(SqliteStore::new(pool))
}

async fn run_ingest(
    cfg: &Config,
    owner: &str,
    directory: String,
    pattern: String,
    chunk_size: Option<usize>,
    overlap: Option<usize>,
) -> anyhow::Result<()> {
    let store = open_store(cfg).await?;
    let share = MountedShare::new(&cfg.share.root);
    let provider = HttpEmbeddingProvider::new(&cfg.embedding)?;

    let workflow = IngestionWorkflow {
        files: &share,
        embeddings: &provider,
        store: &store,
        audit: &store,
        runner: WorkflowRunner::new(Duration::from_secs(cfg.workflow.ingest_budget_secs)),
    };

    let opts = IngestionOptions {
        owner_id: owner.to_string(),
        directory,
        pattern,
        chunk: ChunkOptions {
            chunk_size: chunk_size.unwrap_or(cfg.chunking.chunk_size),
            overlap: overlap.unwrap_or(cfg.chunking.overlap),
        },
    };

    let (run, result) = workflow.run(&opts).await;
    let report = result?;

    println!(
        "Ingestion {:?}: {} document(s), {} embedding(s)",
        run.status, report.documents_processed, report.embeddings_created
    );
    if let Some(resource_id) = report.resource_id {
        println!("Resource: {resource_id}");
    }
    for skipped in report.skipped {
        println!("Skipped {}: {}", skipped.path, skipped.message);
    }

    Ok(())
}

async fn run_query(
    cfg: &Config,
    owner: &str,
    query: &str,
    top_k: Option<usize>,
    alpha: Option<f64>,
    resources: Vec<String>,
) -> anyhow::Result<()> {
    let store = open_store(cfg).await?;
    let provider = HttpEmbeddingProvider::new(&cfg.embedding)?;
    let query_vector = provider.embed_one(query).await?;

    let results = store
        .query_hybrid(&HybridQuery {
            owner_id: owner,
            query_text: query,
            query_vector: &query_vector,
            top_k: top_k.unwrap_or(cfg.retrieval.top_k),
            alpha: alpha.unwrap_or(cfg.retrieval.alpha),
            resource_filter: if resources.is_empty() {
                None
            } else {
                Some(&resources)
            },
        })
        .await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in results.iter().enumerate() {
        println!(
            "{}. [{:.4}]  (semantic {:.4}, keyword {:.4})  {}",
            i + 1,
            hit.hybrid_score,
            hit.semantic_score,
            hit.keyword_score,
            hit.resource_name
        );
        let preview: String = hit.content.chars().take(200).collect();
        println!("   {preview}");
    }

    Ok(())
}

async fn run_scan(
    cfg: &Config,
    owner: &str,
    log_directory: Option<String>,
    recipients: Vec<String>,
    threshold: Option<String>,
) -> anyhow::Result<()> {
    let reasoning = cfg
        .reasoning
        .as_ref()
        .context("scan requires a [reasoning] section in the config")?;

    let store = open_store(cfg).await?;
    let share: Arc<MountedShare> = Arc::new(MountedShare::new(&cfg.share.root));
    let analyst = ChatAnalyst::new(reasoning, share)?;

    let notifier: Box<dyn Notifier> = match &cfg.security.webhook_url {
        Some(url) => Box::new(WebhookNotifier::new(url.clone())?),
        None => Box::new(DisabledNotifier),
    };

    let threshold: Severity = match threshold {
        Some(raw) => raw.parse()?,
        None => cfg.security.threshold()?,
    };

    let workflow = SecurityWorkflow {
        analyst: &analyst,
        notifier: notifier.as_ref(),
        audit: &store,
        runner: WorkflowRunner::new(Duration::from_secs(cfg.workflow.scan_budget_secs)),
    };

    let opts = ScanOptions {
        owner_id: owner.to_string(),
        log_directory: log_directory.unwrap_or_else(|| cfg.security.log_directory.clone()),
        recipients: if recipients.is_empty() {
            cfg.security.recipients.clone()
        } else {
            recipients
        },
        threshold,
    };

    let (run, result) = workflow.run(&opts).await;
    let report = result?;

    println!(
        "Scan {:?}: severity={} issues={} logs_analyzed={} alert_sent={}",
        run.status,
        report.severity.as_str(),
        report.issues_found,
        report.logs_analyzed,
        report.alert_sent
    );
    println!("{}", report.summary);

    Ok(())
}
