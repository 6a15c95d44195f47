use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::options::{ClientOptions, ServerApi, ServerApiVersion};
use mongodb::{Client, Collection};
use serde_json::Value as JsonValue;
use tracing::info;

use super::{DeleteOutcome, DocumentStore, InsertOutcome, JsonDocument, StoreError, StoreResult, UpdateOutcome, ID_FIELD};

const SERVICES: &str = "services";
const BOOKINGS: &str = "bookings";

/// MongoDB-backed store. The client is created once and shared by every request.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    services: Collection<Document>,
    bookings: Collection<Document>,
}

impl MongoStore {
    /// Connect with the stable v1 server API (strict, deprecation errors on).
    pub async fn connect(uri: &str, database: &str) -> StoreResult<Self> {
        let mut options = ClientOptions::parse(uri).await?;
        options.server_api = Some(ServerApi::builder().version(ServerApiVersion::V1).strict(true).deprecation_errors(true).build());
        options.app_name = Some("car_doctor".to_string());
        let client = Client::with_options(options)?;
        let db = client.database(database);
        info!(database = database, "mongodb client created");
        Ok(Self { services: db.collection(SERVICES), bookings: db.collection(BOOKINGS), client })
    }
}

/// Convert a stored document to its JSON form: ObjectId `_id` becomes hex,
/// everything else follows relaxed extended JSON.
pub(crate) fn document_to_json(mut doc: Document) -> JsonDocument {
    if let Some(Bson::ObjectId(oid)) = doc.get(ID_FIELD) {
        let hex = oid.to_hex();
        doc.insert(ID_FIELD, hex);
    }
    match Bson::Document(doc).into_relaxed_extjson() {
        JsonValue::Object(map) => map,
        _ => JsonDocument::new(),
    }
}

/// Convert a client-supplied JSON object to BSON, dropping any `_id` so the server assigns one.
pub(crate) fn json_to_document(mut json: JsonDocument) -> StoreResult<Document> {
    json.remove(ID_FIELD);
    Ok(mongodb::bson::to_document(&json)?)
}

fn projection(fields: &[&str]) -> Document {
    let mut p = Document::new();
    for f in fields { p.insert(*f, 1); }
    p.insert(ID_FIELD, 0);
    p
}

fn id_to_string(id: &Bson) -> StoreResult<String> {
    match id {
        Bson::ObjectId(oid) => Ok(oid.to_hex()),
        other => Err(StoreError::Unexpected(format!("unexpected inserted id {}", other))),
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find_services(&self) -> StoreResult<Vec<JsonDocument>> {
        let cursor = self.services.find(doc! {}).await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        Ok(docs.into_iter().map(document_to_json).collect())
    }

    async fn find_service(&self, id: ObjectId, fields: &[&str]) -> StoreResult<Option<JsonDocument>> {
        let found = self.services.find_one(doc! { "_id": id }).projection(projection(fields)).await?;
        Ok(found.map(document_to_json))
    }

    async fn find_bookings(&self, email: &str) -> StoreResult<Vec<JsonDocument>> {
        let cursor = self.bookings.find(doc! { "email": email }).await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        Ok(docs.into_iter().map(document_to_json).collect())
    }

    async fn insert_booking(&self, booking: JsonDocument) -> StoreResult<InsertOutcome> {
        let res = self.bookings.insert_one(json_to_document(booking)?).await?;
        Ok(InsertOutcome { acknowledged: true, inserted_id: id_to_string(&res.inserted_id)? })
    }

    async fn delete_booking(&self, id: ObjectId) -> StoreResult<DeleteOutcome> {
        let res = self.bookings.delete_one(doc! { "_id": id }).await?;
        Ok(DeleteOutcome { acknowledged: true, deleted_count: res.deleted_count })
    }

    async fn set_booking_status(&self, id: ObjectId, status: JsonValue) -> StoreResult<UpdateOutcome> {
        let status = mongodb::bson::to_bson(&status)?;
        let res = self.bookings.update_one(doc! { "_id": id }, doc! { "$set": { "status": status } }).await?;
        let upserted_id = res.upserted_id.as_ref().map(id_to_string).transpose()?;
        Ok(UpdateOutcome {
            acknowledged: true,
            matched_count: res.matched_count,
            modified_count: res.modified_count,
            upserted_count: u64::from(upserted_id.is_some()),
            upserted_id,
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        self.client.database("admin").run_command(doc! { "ping": 1 }).await?;
        info!("pinged deployment; mongodb connection is up");
        Ok(())
    }

    async fn shutdown(&self) {
        self.client.clone().shutdown().await;
        info!("mongodb client shut down");
    }
}
