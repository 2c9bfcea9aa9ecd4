//! In-memory object store for testing.
//!
//! Objects live in a map keyed by identifier, each with a set of string
//! attributes. Searches apply every filter conjunctively; when the first
//! filter names a numeric attribute, results are ordered by ascending
//! attribute value, matching the ordering contract documented on
//! [`ObjectStore::search`].

use crate::{Filter, ObjectStore, SearchQuery, StoreError, StoreResult};
use blockfetch_types::Oid;
use std::{
    collections::HashMap,
    io::Cursor,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{Mutex, RwLock};

struct StoredObject {
    payload: Vec<u8>,
    attributes: HashMap<String, String>,
}

#[derive(Default)]
struct MemStoreInner {
    objects: HashMap<Oid, StoredObject>,
}

/// In-memory object store.
///
/// Thread-safe and cheap to clone; clones share contents. An optional GET
/// delay simulates slow object reads for shutdown tests, and `close` calls
/// are counted so tests can assert the release-exactly-once contract.
#[derive(Clone, Default)]
pub struct MemStore {
    inner: Arc<RwLock<MemStoreInner>>,
    get_delay: Option<Duration>,
    close_calls: Arc<AtomicUsize>,
    searches: Arc<Mutex<Vec<SearchQuery>>>,
}

impl std::fmt::Debug for MemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemStore").finish_non_exhaustive()
    }
}

impl MemStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every `get` by the given duration before it resolves.
    #[must_use]
    pub fn with_get_delay(mut self, delay: Duration) -> Self {
        self.get_delay = Some(delay);
        self
    }

    /// Insert an object with its attributes.
    pub async fn put(
        &self,
        id: Oid,
        payload: Vec<u8>,
        attributes: impl IntoIterator<Item = (String, String)>,
    ) {
        let object = StoredObject { payload, attributes: attributes.into_iter().collect() };
        self.inner.write().await.objects.insert(id, object);
    }

    /// Number of times `close` has been called.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// The queries observed by `search`, in call order.
    pub async fn searches(&self) -> Vec<SearchQuery> {
        self.searches.lock().await.clone()
    }
}

fn matches(filter: &Filter, attributes: &HashMap<String, String>) -> bool {
    match filter {
        Filter::StringEqual { attribute, value } => {
            attributes.get(attribute).is_some_and(|v| v == value)
        }
        Filter::NumGe { attribute, value } => {
            attributes.get(attribute).and_then(|v| v.parse::<u64>().ok()).is_some_and(|v| v >= *value)
        }
        Filter::NumLe { attribute, value } => {
            attributes.get(attribute).and_then(|v| v.parse::<u64>().ok()).is_some_and(|v| v <= *value)
        }
    }
}

impl ObjectStore for MemStore {
    type Object = Cursor<Vec<u8>>;

    async fn get(&self, id: Oid) -> StoreResult<Cursor<Vec<u8>>> {
        if let Some(delay) = self.get_delay {
            tokio::time::sleep(delay).await;
        }
        let inner = self.inner.read().await;
        inner
            .objects
            .get(&id)
            .map(|object| Cursor::new(object.payload.clone()))
            .ok_or(StoreError::NotFound(id))
    }

    async fn search(&self, query: SearchQuery) -> StoreResult<Vec<Oid>> {
        self.searches.lock().await.push(query.clone());

        let inner = self.inner.read().await;
        let sort_attribute = query.filters().first().map(|f| f.attribute().to_owned());

        let mut hits: Vec<(Option<u64>, Oid)> = inner
            .objects
            .iter()
            .filter(|(_, object)| query.filters().iter().all(|f| matches(f, &object.attributes)))
            .map(|(id, object)| {
                let sort_key = sort_attribute
                    .as_deref()
                    .and_then(|attr| object.attributes.get(attr))
                    .and_then(|v| v.parse::<u64>().ok());
                (sort_key, *id)
            })
            .collect();
        hits.sort_by_key(|(key, _)| *key);
        Ok(hits.into_iter().map(|(_, id)| id).collect())
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}
