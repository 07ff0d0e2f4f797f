use bson::{Document, doc};
use futures::TryStreamExt;
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DaoError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type DaoResult<T> = Result<T, DaoError>;

/// What the store reported for an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAck {
    Inserted,
    Updated,
    /// The write returned without saying whether a document was touched.
    Unconfirmed,
}

pub struct BaseDao<T: Send + Sync> {
    collection: Collection<T>,
}

impl<T> BaseDao<T>
where
    T: Serialize + for<'de> Deserialize<'de> + Unpin + Send + Sync,
{
    pub fn new(db: &Database, collection_name: &str) -> Self {
        Self {
            collection: db.collection::<T>(collection_name),
        }
    }

    pub async fn find_one(&self, filter: Document) -> DaoResult<Option<T>> {
        Ok(self.collection.find_one(filter).await?)
    }

    pub async fn find_many(&self, filter: Document, sort: Option<Document>) -> DaoResult<Vec<T>> {
        let mut cursor = if let Some(sort) = sort {
            self.collection.find(filter).sort(sort).await?
        } else {
            self.collection.find(filter).await?
        };

        let mut results = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            results.push(doc);
        }
        Ok(results)
    }

    /// Applies `update` to the first match, stamping `updated_at`.
    /// Returns whether a document matched.
    pub async fn update_one(&self, filter: Document, update: Document) -> DaoResult<bool> {
        let result = self
            .collection
            .update_one(filter, with_updated_at(update))
            .await?;
        Ok(result.matched_count > 0)
    }

    /// Update-or-insert on `filter`, stamping `updated_at` always and
    /// `created_at` on insert only.
    pub async fn upsert_one(&self, filter: Document, update: Document) -> DaoResult<UpsertAck> {
        let mut update = with_updated_at(update);
        if !update.contains_key("$setOnInsert") {
            update.insert("$setOnInsert", Document::new());
        }
        if let Ok(on_insert) = update.get_document_mut("$setOnInsert") {
            on_insert.insert("created_at", bson::DateTime::now());
        }

        let result = self
            .collection
            .update_one(filter, update)
            .upsert(true)
            .await
            .map_err(map_duplicate_key)?;

        let ack = if result.upserted_id.is_some() {
            UpsertAck::Inserted
        } else if result.matched_count > 0 {
            UpsertAck::Updated
        } else {
            UpsertAck::Unconfirmed
        };
        debug!(?ack, "Upserted document");
        Ok(ack)
    }
}

fn with_updated_at(mut update: Document) -> Document {
    match update.get_document_mut("$set") {
        Ok(set) => {
            set.insert("updated_at", bson::DateTime::now());
        }
        Err(_) => {
            update.insert("$set", doc! { "updated_at": bson::DateTime::now() });
        }
    }
    update
}

fn map_duplicate_key(e: mongodb::error::Error) -> DaoError {
    if let mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(
        ref write_error,
    )) = *e.kind
    {
        if write_error.code == 11000 {
            return DaoError::DuplicateKey(write_error.message.clone());
        }
    }
    DaoError::Mongo(e)
}
