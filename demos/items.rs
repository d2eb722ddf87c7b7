//! Item resource example
//!
//! This example drives the table accessor the way a small REST layer would:
//! - GET /items lists every item
//! - POST /items checks the natural key first and reports a conflict
//! - GET, PUT and DELETE /items/{id} report not-found for unknown ids
//!
//! Run with: RUST_LOG=debug cargo run --example items [location]

use record_store::prelude::*;
use record_store::SqliteAccessor;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TABLE: &str = "items";

/// Request body for POST and PUT
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemBody {
    group_name: String,
    collection_name: String,
    sequence_number: i64,
    label: String,
}

impl ItemBody {
    fn to_values(&self) -> ValueSet {
        ValueSet::new()
            .with("groupName", self.group_name.as_str())
            .with("collectionName", self.collection_name.as_str())
            .with("sequenceNumber", self.sequence_number)
            .with("label", self.label.as_str())
    }
}

/// Response status of one resource call
#[derive(Debug, PartialEq)]
enum Outcome {
    Found(serde_json::Value),
    Created(String),
    Conflict,
    NotFound,
}

/// The item resource, holding an accessor that is opened per request
struct ItemResource {
    accessor: SqliteAccessor,
}

impl ItemResource {
    async fn new(config: AccessorConfig) -> Result<Self> {
        let accessor = TableAccessor::new(config);
        accessor
            .with_session(|db| {
                Box::pin(async move {
                    db.create_table(
                        &TableSchema::new(TABLE)
                            .primary_key("id")
                            .column(ColumnSpec::text("id"))
                            .column(ColumnSpec::text("groupName"))
                            .column(ColumnSpec::text("collectionName"))
                            .column(ColumnSpec::integer("sequenceNumber"))
                            .column(ColumnSpec::text("label")),
                    )
                    .await
                })
            })
            .await?;

        Ok(Self { accessor })
    }

    /// GET /items
    async fn list(&self) -> Result<Outcome> {
        self.accessor
            .with_session(|db| {
                Box::pin(async move {
                    let rows = db.select(TABLE, &Filter::All).await?;
                    Ok(Outcome::Found(serde_json::to_value(rows.to_vec())
                        .map_err(|e| StoreError::query(e.to_string()))?))
                })
            })
            .await
    }

    /// POST /items
    async fn create(&self, body: &ItemBody) -> Result<Outcome> {
        let new_id = Uuid::new_v4().to_string();
        let values = body.to_values();

        self.accessor
            .with_session(move |db| {
                Box::pin(async move {
                    let existing = db.select(TABLE, &Filter::Matching(values.clone())).await?;
                    if !existing.is_empty() {
                        return Ok(Outcome::Conflict);
                    }

                    let mut row = ValueSet::new().with("id", new_id.as_str());
                    for (column, value) in values {
                        row.set(column, value);
                    }
                    db.insert(TABLE, &row).await?;
                    Ok(Outcome::Created(new_id))
                })
            })
            .await
    }

    /// GET /items/{id}
    async fn get(&self, id: &str) -> Result<Outcome> {
        let id = id.to_string();
        self.accessor
            .with_session(move |db| {
                Box::pin(async move {
                    Ok(match db.select(TABLE, &Filter::by("id", id.as_str())).await?.first() {
                        Some(row) => Outcome::Found(row.to_json()),
                        None => Outcome::NotFound,
                    })
                })
            })
            .await
    }

    /// PUT /items/{id}
    async fn replace(&self, id: &str, body: &ItemBody) -> Result<Outcome> {
        let id = id.to_string();
        let values = body.to_values();
        self.accessor
            .with_session(move |db| {
                Box::pin(async move {
                    if db.select(TABLE, &Filter::by("id", id.as_str())).await?.is_empty() {
                        return Ok(Outcome::NotFound);
                    }
                    db.update_by_key(TABLE, "id", id.as_str(), &values).await?;
                    Ok(Outcome::Found(serde_json::json!({ "result": "modified" })))
                })
            })
            .await
    }

    /// DELETE /items/{id}
    async fn remove(&self, id: &str) -> Result<Outcome> {
        let by_id = Filter::by("id", id);
        self.accessor
            .with_session(move |db| {
                Box::pin(async move {
                    if db.select(TABLE, &by_id).await?.is_empty() {
                        return Ok(Outcome::NotFound);
                    }
                    db.delete(TABLE, &by_id).await?;
                    Ok(Outcome::Found(serde_json::json!({ "result": "removed" })))
                })
            })
            .await
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    println!("=== Record Store - Item Resource Example ===\n");

    // Optional database file, e.g. `db_file.db`
    let scratch = std::env::temp_dir().join("record_store_items_demo.db");
    let location = match std::env::args().nth(1) {
        Some(arg) => arg.parse::<Location>().unwrap_or_default(),
        None => {
            let _ = std::fs::remove_file(&scratch);
            Location::file(&scratch)
        }
    };
    if location.is_memory() {
        // Each request opens its own session, so an in-memory store would not survive
        return Err(StoreError::invalid_argument("items demo needs a file location"));
    }
    println!("Store: {}\n", location);
    let resource = ItemResource::new(AccessorConfig::new(location)).await?;

    let body: ItemBody = serde_json::from_str(
        r#"{"groupName": "Band", "collectionName": "Album", "sequenceNumber": 4, "label": "Track"}"#,
    )
    .map_err(|e| StoreError::invalid_argument(e.to_string()))?;

    let created = resource.create(&body).await?;
    println!("POST /items        -> {:?}", created);
    println!("POST /items        -> {:?}", resource.create(&body).await?);
    println!("GET  /items        -> {:?}", resource.list().await?);

    // A store reused from an earlier run may already hold this item
    let id = match created {
        Outcome::Created(id) => id,
        _ => return Ok(()),
    };
    let unknown = Uuid::new_v4().to_string();
    println!("GET  /items/{{id}}   -> {:?}", resource.get(&id).await?);

    let renamed = ItemBody {
        label: "NewTrack".to_string(),
        ..body
    };
    println!("PUT  /items/{{id}}   -> {:?}", resource.replace(&id, &renamed).await?);
    println!("PUT  /items/{{new}}  -> {:?}", resource.replace(&unknown, &renamed).await?);
    println!("GET  /items/{{id}}   -> {:?}", resource.get(&id).await?);
    println!("DELETE /items/{{id}} -> {:?}", resource.remove(&id).await?);
    println!("DELETE /items/{{id}} -> {:?}", resource.remove(&id).await?);
    println!("GET  /items/{{id}}   -> {:?}", resource.get(&id).await?);

    let _ = std::fs::remove_file(&scratch);
    println!("\n=== Example completed successfully ===");
    Ok(())
}
