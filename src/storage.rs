//!
//! car_doctor document storage
//! ---------------------------
//! The store is consumed through the `DocumentStore` trait: one method per
//! collection operation the HTTP surface needs. Two backends implement it:
//! - `mongo::MongoStore`: the `services` / `bookings` collections of a MongoDB database.
//! - `memory::MemoryStore`: the same semantics in process memory (local runs, tests).
//!
//! Documents cross this boundary as JSON objects. The `_id` field is always the
//! 24-char lowercase hex form of the ObjectId.

use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::{AppError, AppResult};

pub mod memory;
pub mod mongo;

/// A flat JSON document as stored in a collection.
pub type JsonDocument = Map<String, JsonValue>;

/// Field holding the store-assigned identifier.
pub const ID_FIELD: &str = "_id";

/// Fields returned by the service detail lookup.
pub const SERVICE_DETAIL_FIELDS: [&str; 4] = ["title", "price", "service_id", "img"];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("mongodb: {0}")]
    Driver(#[from] mongodb::error::Error),
    #[error("document encoding: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),
    #[error("seed data: {0}")]
    Seed(String),
    #[error("{0}")]
    Unexpected(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of inserting one document. Field names follow the driver's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOutcome {
    pub acknowledged: bool,
    pub inserted_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_count: u64,
    pub upserted_id: Option<String>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document of the `services` collection, in natural order.
    async fn find_services(&self) -> StoreResult<Vec<JsonDocument>>;

    /// One service by id, reduced to `fields` (the id itself is not returned).
    async fn find_service(&self, id: ObjectId, fields: &[&str]) -> StoreResult<Option<JsonDocument>>;

    /// Bookings whose `email` field equals `email`.
    async fn find_bookings(&self, email: &str) -> StoreResult<Vec<JsonDocument>>;

    /// Insert a booking; any `_id` in the input is replaced by a fresh one.
    async fn insert_booking(&self, booking: JsonDocument) -> StoreResult<InsertOutcome>;

    async fn delete_booking(&self, id: ObjectId) -> StoreResult<DeleteOutcome>;

    /// `$set` the `status` field of one booking, leaving every other field untouched.
    async fn set_booking_status(&self, id: ObjectId, status: JsonValue) -> StoreResult<UpdateOutcome>;

    /// Round-trip to the backend to confirm it is reachable.
    async fn ping(&self) -> StoreResult<()>;

    /// Release backend resources. Called once on server shutdown.
    async fn shutdown(&self);
}

pub type SharedStore = Arc<dyn DocumentStore>;

/// Validate a path-supplied identifier before it reaches a store query.
pub fn parse_object_id(raw: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(raw)
        .map_err(|_| AppError::user("invalid_id", format!("'{}' is not a valid document id", raw).as_str()))
}

/// Keep only `fields` of `doc` (those present), in the order given.
pub fn project(doc: &JsonDocument, fields: &[&str]) -> JsonDocument {
    let mut out = JsonDocument::new();
    for f in fields {
        if let Some(v) = doc.get(*f) { out.insert((*f).to_string(), v.clone()); }
    }
    out
}
