//! # Shareindex
//!
//! **Ingest documents from a mounted file share into a hybrid search
//! index, and keep an AI security analyst watching the share's logs.**
//!
//! This crate wires the engine in `shareindex-core` to real backends:
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool (WAL) and idempotent schema setup |
//! | [`sqlite_store`] | SQLite `ResourceStore`/`AuditStore` implementation |
//! | [`embedding`] | HTTP embedding provider (OpenAI-compatible endpoint) |
//! | [`fs_source`] | `FileSource` over a locally mounted share |
//! | [`llm`] | Chat-completions log analyst with filesystem tools |
//! | [`notify`] | Webhook alert notifier |
//!
//! The `sidx` binary exposes ingestion, retrieval, deletion, history, and
//! security scans as CLI commands.

pub mod config;
pub mod db;
pub mod embedding;
pub mod fs_source;
pub mod llm;
pub mod notify;
pub mod sqlite_store;

pub use shareindex_core as core;
