//! Write-path behavior: write-through, own-write visibility, self-originated
//! invalidation suppression, and deletes.

mod common;

use common::{Harness, text};
use hashmirror::{CacheError, FieldValue, RemoteStore};

#[tokio::test]
async fn write_goes_through_to_the_remote_store() {
    let h = Harness::new().await;
    h.mirror.hash_set("hashKey", "key1", "value1").await.unwrap();

    let reply = h
        .remote
        .hash_get("hashKey", &["key1".to_string()])
        .await
        .unwrap();
    assert_eq!(reply.values[0].as_deref(), Some(b"value1".as_slice()));
}

#[tokio::test]
async fn own_write_is_immediately_visible_without_a_fetch() {
    let h = Harness::new().await;
    h.mirror.hash_set("hashKey", "key1", "value1").await.unwrap();
    assert_eq!(h.mirror.remote_calls(), 1);

    // No propagation wait and no re-read from the remote
    let value = h.mirror.hash_get("hashKey", "key1").await.unwrap();
    assert_eq!(text(&value), "value1");
    assert_eq!(h.mirror.remote_calls(), 1);
}

#[tokio::test]
async fn own_invalidation_is_suppressed() {
    let h = Harness::new().await;
    h.mirror.hash_set("hashKey", "key1", "value1").await.unwrap();

    // Let the notification come back around through the listener
    h.propagate().await;

    let stats = h.mirror.statistics();
    assert_eq!(stats.self_suppressed, 1);

    // The just-written entry survived its own notification
    let value = h.mirror.hash_get("hashKey", "key1").await.unwrap();
    assert_eq!(text(&value), "value1");
    assert_eq!(h.mirror.remote_calls(), 1);
}

#[tokio::test]
async fn overwrite_replaces_the_cached_entry() {
    let h = Harness::new().await;
    h.mirror.hash_set("hashKey", "key1", "value1").await.unwrap();
    h.mirror.hash_set("hashKey", "key1", "value2").await.unwrap();

    let value = h.mirror.hash_get("hashKey", "key1").await.unwrap();
    assert_eq!(text(&value), "value2");
    assert_eq!(h.mirror.remote_calls(), 2);
}

#[tokio::test]
async fn delete_caches_the_negative_locally() {
    let h = Harness::new().await;
    h.mirror.hash_set("hashKey", "key1", "value1").await.unwrap();

    let existed = h.mirror.hash_delete("hashKey", "key1").await.unwrap();
    assert!(existed);
    assert_eq!(h.mirror.remote_calls(), 2);

    // The deleting process knows the outcome, no round trip to confirm
    let value = h.mirror.hash_get("hashKey", "key1").await.unwrap();
    assert_eq!(value, FieldValue::Missing);
    assert_eq!(h.mirror.remote_calls(), 2);
}

#[tokio::test]
async fn delete_of_absent_field_reports_false() {
    let h = Harness::new().await;
    let existed = h.mirror.hash_delete("hashKey", "nothere").await.unwrap();
    assert!(!existed);
}

#[tokio::test]
async fn failed_write_leaves_cache_and_store_untouched() {
    let h = Harness::new().await;
    h.mirror.hash_set("hashKey", "key1", "value1").await.unwrap();

    h.remote.set_available(false);
    let err = h.mirror.hash_set("hashKey", "key1", "value2").await;
    assert!(matches!(err, Err(CacheError::RemoteUnavailable(_))));
    h.remote.set_available(true);

    // The old value is still what both the cache and the store hold
    let value = h.mirror.hash_get("hashKey", "key1").await.unwrap();
    assert_eq!(text(&value), "value1");
    let reply = h
        .remote
        .hash_get("hashKey", &["key1".to_string()])
        .await
        .unwrap();
    assert_eq!(reply.values[0].as_deref(), Some(b"value1".as_slice()));
}
