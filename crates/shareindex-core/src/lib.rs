//! # Shareindex Core
//!
//! Engine crate for shareindex: data models, chunking, hybrid ranking,
//! the store abstraction, the workflow runner, and the two built-in
//! workflows (document ingestion and security-log analysis).
//!
//! Everything external lives behind a trait seam: embedding and
//! reasoning providers, the file share, the alert channel, and storage.
//! The app crate wires real HTTP and SQLite implementations to those
//! seams; tests use the in-memory store and hand-rolled fakes.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod files;
pub mod ingest;
pub mod models;
pub mod rank;
pub mod security;
pub mod store;
pub mod workflow;

pub use error::{Error, Result};
