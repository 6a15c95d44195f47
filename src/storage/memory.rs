use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::{DeleteOutcome, DocumentStore, InsertOutcome, JsonDocument, StoreError, StoreResult, UpdateOutcome, ID_FIELD};

/// Seed file layout accepted by `MemoryStore::from_seed_file`.
#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub services: Vec<JsonDocument>,
    #[serde(default)]
    pub bookings: Vec<JsonDocument>,
}

#[derive(Default)]
struct Collections {
    services: Vec<(ObjectId, JsonDocument)>,
    bookings: Vec<(ObjectId, JsonDocument)>,
}

/// In-process document store with the same collection semantics as `MongoStore`.
/// Collections keep insertion order, which stands in for MongoDB's natural order.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Collections>>,
}

/// Take the document's own `_id` when it is a valid hex id, otherwise assign one.
/// The stored document always carries `_id` as hex.
fn with_id(mut doc: JsonDocument, keep_existing: bool) -> (ObjectId, JsonDocument) {
    let existing = if keep_existing {
        doc.get(ID_FIELD).and_then(|v| v.as_str()).and_then(|s| ObjectId::parse_str(s).ok())
    } else { None };
    let id = existing.unwrap_or_else(ObjectId::new);
    doc.insert(ID_FIELD.to_string(), JsonValue::String(id.to_hex()));
    (id, doc)
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn from_seed(seed: Seed) -> Self {
        let store = Self::new();
        {
            let mut c = store.inner.write();
            c.services = seed.services.into_iter().map(|d| with_id(d, true)).collect();
            c.bookings = seed.bookings.into_iter().map(|d| with_id(d, true)).collect();
        }
        store
    }

    /// Load a JSON seed of the form `{"services": [...], "bookings": [...]}`.
    pub fn from_seed_file(path: &Path) -> StoreResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| StoreError::Seed(format!("{}: {}", path.display(), e)))?;
        let seed: Seed = serde_json::from_slice(&bytes).map_err(|e| StoreError::Seed(format!("{}: {}", path.display(), e)))?;
        tracing::info!(path = %path.display(), services = seed.services.len(), bookings = seed.bookings.len(), "loaded memory store seed");
        Ok(Self::from_seed(seed))
    }

    /// Add a catalog entry; the catalog has no HTTP write path, so seeding goes through here.
    pub fn insert_service(&self, service: JsonDocument) -> ObjectId {
        let (id, doc) = with_id(service, true);
        self.inner.write().services.push((id, doc));
        id
    }

    pub fn booking(&self, id: ObjectId) -> Option<JsonDocument> {
        self.inner.read().bookings.iter().find(|(bid, _)| *bid == id).map(|(_, d)| d.clone())
    }

    pub fn booking_count(&self) -> usize { self.inner.read().bookings.len() }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_services(&self) -> StoreResult<Vec<JsonDocument>> {
        Ok(self.inner.read().services.iter().map(|(_, d)| d.clone()).collect())
    }

    async fn find_service(&self, id: ObjectId, fields: &[&str]) -> StoreResult<Option<JsonDocument>> {
        let c = self.inner.read();
        Ok(c.services.iter().find(|(sid, _)| *sid == id).map(|(_, d)| super::project(d, fields)))
    }

    async fn find_bookings(&self, email: &str) -> StoreResult<Vec<JsonDocument>> {
        let c = self.inner.read();
        Ok(c.bookings
            .iter()
            .filter(|(_, d)| d.get("email").and_then(|v| v.as_str()) == Some(email))
            .map(|(_, d)| d.clone())
            .collect())
    }

    async fn insert_booking(&self, booking: JsonDocument) -> StoreResult<InsertOutcome> {
        let (id, doc) = with_id(booking, false);
        self.inner.write().bookings.push((id, doc));
        Ok(InsertOutcome { acknowledged: true, inserted_id: id.to_hex() })
    }

    async fn delete_booking(&self, id: ObjectId) -> StoreResult<DeleteOutcome> {
        let mut c = self.inner.write();
        let before = c.bookings.len();
        if let Some(pos) = c.bookings.iter().position(|(bid, _)| *bid == id) { c.bookings.remove(pos); }
        Ok(DeleteOutcome { acknowledged: true, deleted_count: (before - c.bookings.len()) as u64 })
    }

    async fn set_booking_status(&self, id: ObjectId, status: JsonValue) -> StoreResult<UpdateOutcome> {
        let mut c = self.inner.write();
        let (matched, modified) = match c.bookings.iter_mut().find(|(bid, _)| *bid == id) {
            Some((_, doc)) => {
                // MongoDB only counts a modification when the value actually changes
                let changed = doc.get("status") != Some(&status);
                doc.insert("status".to_string(), status);
                (1, u64::from(changed))
            }
            None => (0, 0),
        };
        Ok(UpdateOutcome { acknowledged: true, matched_count: matched, modified_count: modified, upserted_count: 0, upserted_id: None })
    }

    async fn ping(&self) -> StoreResult<()> { Ok(()) }

    async fn shutdown(&self) {}
}
