//! These tests need a live Redis. Set `REDIS_TEST_URL` (e.g. `redis://127.0.0.1:6379`)
//! to run them; otherwise they return early.

use std::sync::Arc;

use assert_matches::assert_matches;
use redis::AsyncCommands;
use uuid::Uuid;

use queue_cell::*;
use super::QueueTestUtils;

async fn redis_store() -> Option<RedisQueueStore> {
    let url = std::env::var("REDIS_TEST_URL").ok()?;
    let prefix = format!("test:{}:", Uuid::new_v4());

    match RedisQueueStore::connect(&url).await {
        Ok(store) => Some(store.with_key_prefix(&prefix)),
        Err(e) => {
            eprintln!("Skipping Redis test: {}", e);
            None
        }
    }
}

#[tokio::test]
async fn test_redis_compare_and_swap() {
    let Some(store) = redis_store().await else { return };

    assert!(store.load("DR-1").await.unwrap().is_none());

    let mut document = QueueDocument::empty("DR-1");
    document.version = 1;
    assert!(store.compare_and_swap(&document, 0).await.unwrap());

    // Stale writer loses
    let mut stale = QueueDocument::empty("DR-1");
    stale.version = 1;
    assert!(!store.compare_and_swap(&stale, 0).await.unwrap());

    document.version = 2;
    assert!(store.compare_and_swap(&document, 1).await.unwrap());
    assert_eq!(store.load("DR-1").await.unwrap().unwrap().version, 2);

    assert_eq!(store.clear().await.unwrap(), 1);
}

#[tokio::test]
async fn test_redis_backed_queue_flow() {
    let Some(store) = redis_store().await else { return };
    let store = Arc::new(store);
    let service = QueueTestUtils::service_with_store(store.clone());

    service.enqueue(QueueTestUtils::normal_request("DR-1", "Alice"), None).await.unwrap();
    service
        .enqueue(QueueTestUtils::emergency_request("DR-1", "Bob", "stroke"), None)
        .await
        .unwrap();

    assert!(service.dequeue_normal("DR-1").await.is_err());
    service.start_emergency("DR-1").await.unwrap();
    service.resolve_emergency("DR-1").await.unwrap();

    let served = service.dequeue_normal("DR-1").await.unwrap();
    assert_eq!(served.patient_name, "Alice");

    let view = service.get_queue("DR-1").await.unwrap();
    assert_eq!(view.queue.version, 5);

    store.clear().await.unwrap();
}

#[tokio::test]
async fn test_corrupt_document_does_not_poison_the_connection() {
    let Ok(url) = std::env::var("REDIS_TEST_URL") else { return };
    let prefix = format!("test:{}:", Uuid::new_v4());

    // A single pooled connection, so the next swap reuses whatever state the failed one left
    let store = match RedisQueueStore::connect_with_pool_size(&url, 1).await {
        Ok(store) => store.with_key_prefix(&prefix),
        Err(e) => {
            eprintln!("Skipping Redis test: {}", e);
            return;
        }
    };
    let key = store.document_key("DR-1");

    let client = redis::Client::open(url.as_str()).unwrap();
    let mut raw = client.get_multiplexed_async_connection().await.unwrap();
    let _: () = raw.set(&key, "{not json").await.unwrap();

    let mut document = QueueDocument::empty("DR-1");
    document.version = 1;
    assert_matches!(store.compare_and_swap(&document, 0).await, Err(QueueError::StoreError(_)));

    // Touching the key here would abort a transaction still watching it
    let _: () = raw.del(&key).await.unwrap();
    assert!(store.compare_and_swap(&document, 0).await.unwrap());
    assert_eq!(store.load("DR-1").await.unwrap().unwrap().version, 1);

    store.clear().await.unwrap();
}
