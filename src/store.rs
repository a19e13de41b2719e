// Document store contract plus an in-process implementation for tests.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::error::{Error, Result};

/// Options applied to a single store request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOpts {
    refresh: bool,
}

impl RequestOpts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the write (or the read's view of prior writes) to be immediately
    /// visible, closing the store's eventual-consistency window.
    #[must_use]
    pub fn refresh(mut self) -> Self {
        self.refresh = true;
        self
    }

    #[must_use]
    pub fn is_refresh(self) -> bool {
        self.refresh
    }
}

/// A document as read from the store, carrying the version observed.
///
/// The version strictly increases on every successful write and is the sole
/// arbiter of who wrote last; callers hand it back to `update` rather than
/// comparing versions themselves.
#[derive(Debug, Clone)]
pub struct Document {
    pub body: Vec<u8>,
    pub version: u64,
}

/// One matching document returned by `search`.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub source: Vec<u8>,
}

/// The document store the election engine coordinates through.
///
/// Implementations must provide linearizable read-after-write semantics per
/// document when `refresh` is requested, atomic create-if-absent, and
/// version-conditioned updates. Cancellation is by dropping the returned
/// future; no call leaves partial state behind on the caller's side.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document. Fails with [`Error::NotFound`] when absent.
    async fn read(&self, index: &str, id: &str, opts: RequestOpts) -> Result<Document>;

    /// Atomically create a document, failing with [`Error::VersionConflict`]
    /// if `id` already exists.
    async fn create(&self, index: &str, id: &str, body: Vec<u8>, opts: RequestOpts) -> Result<()>;

    /// Apply `body` as a partial-document merge (the `{"doc": ..}` envelope),
    /// conditioned on `expected_version` being the document's current
    /// version. Fails with [`Error::VersionConflict`] when the document moved
    /// since it was read.
    async fn update(
        &self,
        index: &str,
        id: &str,
        body: Vec<u8>,
        expected_version: u64,
        opts: RequestOpts,
    ) -> Result<()>;

    /// Run a rendered query. Fails with [`Error::IndexNotFound`] when the
    /// collection has never been created.
    async fn search(&self, index: &str, query: &Value) -> Result<Vec<SearchHit>>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    async fn read(&self, index: &str, id: &str, opts: RequestOpts) -> Result<Document> {
        (**self).read(index, id, opts).await
    }

    async fn create(&self, index: &str, id: &str, body: Vec<u8>, opts: RequestOpts) -> Result<()> {
        (**self).create(index, id, body, opts).await
    }

    async fn update(
        &self,
        index: &str,
        id: &str,
        body: Vec<u8>,
        expected_version: u64,
        opts: RequestOpts,
    ) -> Result<()> {
        (**self).update(index, id, body, expected_version, opts).await
    }

    async fn search(&self, index: &str, query: &Value) -> Result<Vec<SearchHit>> {
        (**self).search(index, query).await
    }
}

#[derive(Debug, Clone)]
struct StoredDoc {
    body: Vec<u8>,
    version: u64,
}

/// Versioned in-process store backing the test suite.
///
/// Writes are always immediately visible, so `refresh` is a no-op here. The
/// concurrency contract is the real one: create-if-absent and
/// version-conditioned updates are atomic per document.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    indices: DashMap<String, DashMap<String, StoredDoc>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current version of a document, if it exists. Test helper.
    #[must_use]
    pub fn version_of(&self, index: &str, id: &str) -> Option<u64> {
        self.indices
            .get(index)
            .and_then(|docs| docs.get(id).map(|doc| doc.version))
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn read(&self, index: &str, id: &str, _opts: RequestOpts) -> Result<Document> {
        let docs = self.indices.get(index).ok_or(Error::NotFound)?;
        let doc = docs.get(id).ok_or(Error::NotFound)?;
        Ok(Document {
            body: doc.body.clone(),
            version: doc.version,
        })
    }

    async fn create(&self, index: &str, id: &str, body: Vec<u8>, _opts: RequestOpts) -> Result<()> {
        let docs = self.indices.entry(index.to_string()).or_default();
        // The entry borrows through the outer guard; keep the outcome in a
        // local so the guard outlives the match temporaries.
        let result = match docs.entry(id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(Error::VersionConflict),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(StoredDoc { body, version: 1 });
                Ok(())
            }
        };
        drop(docs);
        result
    }

    async fn update(
        &self,
        index: &str,
        id: &str,
        body: Vec<u8>,
        expected_version: u64,
        _opts: RequestOpts,
    ) -> Result<()> {
        let docs = self.indices.get(index).ok_or(Error::NotFound)?;
        let mut doc = docs.get_mut(id).ok_or(Error::NotFound)?;
        if doc.version != expected_version {
            return Err(Error::VersionConflict);
        }

        let envelope: Value = serde_json::from_slice(&body)?;
        let patch = envelope
            .get("doc")
            .ok_or_else(|| Error::Other(anyhow!("update body missing doc envelope")))?;
        let mut source: Value = serde_json::from_slice(&doc.body)?;
        merge(&mut source, patch);

        doc.body = serde_json::to_vec(&source)?;
        doc.version += 1;
        Ok(())
    }

    async fn search(&self, index: &str, query: &Value) -> Result<Vec<SearchHit>> {
        let docs = self.indices.get(index).ok_or(Error::IndexNotFound)?;

        let terms = query
            .pointer("/query/terms")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::Other(anyhow!("unsupported query shape")))?;
        let (field, values) = terms
            .iter()
            .next()
            .ok_or_else(|| Error::Other(anyhow!("empty terms query")))?;
        let values: Vec<&str> = values
            .as_array()
            .map(|v| v.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut hits = Vec::new();
        for entry in docs.iter() {
            let matched = if field == "_id" {
                values.contains(&entry.key().as_str())
            } else {
                let source: Value = serde_json::from_slice(&entry.body)?;
                source
                    .get(field)
                    .and_then(Value::as_str)
                    .is_some_and(|v| values.contains(&v))
            };
            if matched {
                hits.push(SearchHit {
                    id: entry.key().clone(),
                    source: entry.body.clone(),
                });
            }
        }
        Ok(hits)
    }
}

/// Recursive object merge, the partial-update semantics of the `doc`
/// envelope. Non-object values replace wholesale.
fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                merge(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}
