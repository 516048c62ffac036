//! SQLite store tests against an in-memory database.

use chrono::Utc;
use uuid::Uuid;

use shareindex::db;
use shareindex::sqlite_store::SqliteStore;
use shareindex_core::models::{IngestionRecord, NewEmbedding, ScanRecord};
use shareindex_core::store::{AuditStore, HybridQuery, ResourceStore};

async fn store() -> SqliteStore {
    let pool = db::connect_memory().await.unwrap();
    db::migrate(&pool).await.unwrap();
    SqliteStore::new(pool)
}

fn embedding(content: &str, vector: Vec<f32>) -> NewEmbedding {
    NewEmbedding {
        content: content.to_string(),
        vector,
    }
}

#[tokio::test]
async fn test_migrate_is_idempotent() {
    let pool = db::connect_memory().await.unwrap();
    db::migrate(&pool).await.unwrap();
    db::migrate(&pool).await.unwrap();
}

#[tokio::test]
async fn test_resource_round_trip() {
    let store = store().await;
    let id = store
        .create_resource(
            "documents - 2026-08-23",
            "alice",
            serde_json::json!({"directory": "documents"}),
        )
        .await
        .unwrap();

    let resources = store.list_resources("alice").await.unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].id, id);
    assert_eq!(resources[0].metadata["directory"], "documents");

    assert!(store.list_resources("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_insert_and_hybrid_query() {
    let store = store().await;
    let rid = store
        .create_resource("docs", "alice", serde_json::json!({}))
        .await
        .unwrap();

    let n = store
        .insert_embeddings(
            &rid,
            &[
                embedding("failed login attempts from host alpha", vec![1.0, 0.0]),
                embedding("scheduled backup completed", vec![0.0, 1.0]),
            ],
        )
        .await
        .unwrap();
    assert_eq!(n, 2);

    let results = store
        .query_hybrid(&HybridQuery {
            owner_id: "alice",
            query_text: "failed login",
            query_vector: &[1.0, 0.0],
            top_k: 5,
            alpha: 0.6,
            resource_filter: None,
        })
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].content, "failed login attempts from host alpha");
    assert!(results[0].hybrid_score > results[1].hybrid_score);
    assert_eq!(results[0].resource_name, "docs");
}

#[tokio::test]
async fn test_insert_rejects_unknown_resource() {
    let store = store().await;
    let err = store
        .insert_embeddings("missing", &[embedding("x", vec![1.0])])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "storage");
}

#[tokio::test]
async fn test_insert_spans_multiple_batches() {
    let store = store().await;
    let rid = store
        .create_resource("bulk", "alice", serde_json::json!({}))
        .await
        .unwrap();

    let records: Vec<NewEmbedding> = (0..250)
        .map(|i| embedding(&format!("chunk number {i}"), vec![i as f32, 1.0]))
        .collect();
    let n = store.insert_embeddings(&rid, &records).await.unwrap();
    assert_eq!(n, 250);

    let results = store
        .query_hybrid(&HybridQuery {
            owner_id: "alice",
            query_text: "chunk",
            query_vector: &[1.0, 1.0],
            top_k: 300,
            alpha: 0.5,
            resource_filter: None,
        })
        .await
        .unwrap();
    assert_eq!(results.len(), 250);
}

#[tokio::test]
async fn test_delete_requires_ownership_and_cascades() {
    let store = store().await;
    let rid = store
        .create_resource("docs", "bob", serde_json::json!({}))
        .await
        .unwrap();
    store
        .insert_embeddings(&rid, &[embedding("content", vec![1.0])])
        .await
        .unwrap();

    // Wrong owner and missing id both report NotFound.
    let err = store.delete_resource(&rid, "alice").await.unwrap_err();
    assert_eq!(err.kind(), "not_found");
    let err = store.delete_resource("missing", "bob").await.unwrap_err();
    assert_eq!(err.kind(), "not_found");

    store.delete_resource(&rid, "bob").await.unwrap();
    assert!(store.list_resources("bob").await.unwrap().is_empty());
    let results = store
        .query_hybrid(&HybridQuery {
            owner_id: "bob",
            query_text: "content",
            query_vector: &[1.0],
            top_k: 5,
            alpha: 0.6,
            resource_filter: None,
        })
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_resource_allow_list() {
    let store = store().await;
    let r1 = store
        .create_resource("a", "alice", serde_json::json!({}))
        .await
        .unwrap();
    let r2 = store
        .create_resource("b", "alice", serde_json::json!({}))
        .await
        .unwrap();
    store
        .insert_embeddings(&r1, &[embedding("shared phrase", vec![1.0])])
        .await
        .unwrap();
    store
        .insert_embeddings(&r2, &[embedding("shared phrase", vec![1.0])])
        .await
        .unwrap();

    let allow = vec![r1.clone()];
    let results = store
        .query_hybrid(&HybridQuery {
            owner_id: "alice",
            query_text: "shared",
            query_vector: &[1.0],
            top_k: 5,
            alpha: 0.6,
            resource_filter: Some(&allow),
        })
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].resource_id, r1);
}

#[tokio::test]
async fn test_audit_history_most_recent_first() {
    let store = store().await;

    for (i, status) in ["completed", "failed"].iter().enumerate() {
        store
            .record_ingestion(&IngestionRecord {
                id: Uuid::new_v4().to_string(),
                owner_id: "alice".to_string(),
                source: format!("documents (*.txt) #{i}"),
                documents_processed: i,
                embeddings_created: i * 2,
                resource_id: None,
                status: status.to_string(),
                error: (*status == "failed").then(|| "embedding_provider: boom".to_string()),
                completed_at: Utc::now() + chrono::Duration::seconds(i as i64),
            })
            .await
            .unwrap();
    }

    let ingestions = store.list_ingestions("alice").await.unwrap();
    assert_eq!(ingestions.len(), 2);
    assert_eq!(ingestions[0].status, "failed");
    assert_eq!(ingestions[1].status, "completed");
    assert!(store.list_ingestions("bob").await.unwrap().is_empty());

    store
        .record_scan(&ScanRecord {
            id: Uuid::new_v4().to_string(),
            owner_id: "alice".to_string(),
            source: "logs".to_string(),
            severity: "high".to_string(),
            issues_found: 2,
            logs_analyzed: 14,
            analysis: serde_json::json!({"severity": "high"}),
            alert_sent: true,
            status: "completed".to_string(),
            error: None,
            completed_at: Utc::now(),
        })
        .await
        .unwrap();

    let scans = store.list_scans("alice").await.unwrap();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0].severity, "high");
    assert!(scans[0].alert_sent);
    assert_eq!(scans[0].analysis["severity"], "high");
}
