//! Conformance tests for object-store backends.
//!
//! The store trait has no write path, so the suite works against a known
//! fixture set: populate the backend with [`populate_fixtures`] (or insert
//! the same objects through backend-specific means), then run
//! [`conformance`] against it.

use crate::{ObjectStore, SearchQuery, StoreError, StoreResult};
use blockfetch_types::Oid;
use std::future::Future;
use tokio::io::AsyncReadExt;

/// Fixture objects: identifier, payload, and attributes.
pub fn fixtures() -> Vec<(Oid, Vec<u8>, Vec<(String, String)>)> {
    (0u8..4)
        .map(|i| {
            (
                Oid::new([i; 32]),
                vec![i; 16],
                vec![
                    ("height".to_owned(), u64::from(i).to_string()),
                    ("kind".to_owned(), "block".to_owned()),
                ],
            )
        })
        .collect()
}

/// Insert the fixture set through the given backend-specific writer.
pub async fn populate_fixtures<F, Fut>(mut put: F)
where
    F: FnMut(Oid, Vec<u8>, Vec<(String, String)>) -> Fut,
    Fut: Future<Output = ()>,
{
    for (id, payload, attributes) in fixtures() {
        put(id, payload, attributes).await;
    }
}

/// Run all conformance tests against a backend populated with [`fixtures`].
pub async fn conformance<S: ObjectStore>(store: &S) -> StoreResult<()> {
    test_get_streams_payload(store).await?;
    test_get_missing_object(store).await?;
    test_search_string_equal(store).await?;
    test_search_numeric_range(store).await?;
    test_search_no_match(store).await?;
    Ok(())
}

/// A fetched object streams exactly the stored payload.
pub async fn test_get_streams_payload<S: ObjectStore>(store: &S) -> StoreResult<()> {
    for (id, payload, _) in fixtures() {
        let mut reader = store.get(id).await?;
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents).await.map_err(StoreError::backend)?;
        assert_eq!(contents, payload);
    }
    Ok(())
}

/// Fetching an unknown identifier reports not-found.
pub async fn test_get_missing_object<S: ObjectStore>(store: &S) -> StoreResult<()> {
    let missing = Oid::new([0xee; 32]);
    assert!(matches!(store.get(missing).await, Err(StoreError::NotFound(_))));
    Ok(())
}

/// String equality matches exactly one fixture per height value.
pub async fn test_search_string_equal<S: ObjectStore>(store: &S) -> StoreResult<()> {
    let hits = store.search(SearchQuery::new().string_equal("height", "2")).await?;
    assert_eq!(hits, vec![Oid::new([2; 32])]);
    Ok(())
}

/// Numeric ranges are inclusive on both ends and sorted ascending.
pub async fn test_search_numeric_range<S: ObjectStore>(store: &S) -> StoreResult<()> {
    let hits = store.search(SearchQuery::new().num_ge("height", 1).num_le("height", 2)).await?;
    assert_eq!(hits, vec![Oid::new([1; 32]), Oid::new([2; 32])]);
    Ok(())
}

/// A query with no matching objects returns an empty result, not an error.
pub async fn test_search_no_match<S: ObjectStore>(store: &S) -> StoreResult<()> {
    let hits = store.search(SearchQuery::new().num_ge("height", 100)).await?;
    assert!(hits.is_empty());
    let hits = store.search(SearchQuery::new().string_equal("kind", "header")).await?;
    assert!(hits.is_empty());
    Ok(())
}
