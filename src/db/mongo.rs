//! MongoDB connection and typed collections
//!
//! Every collection is opened through [`MongoClient::collection`], which
//! creates the schema's indexes first. Driver errors surface as
//! [`AppError::Database`].

use bson::{doc, oid::ObjectId, DateTime, Document};
use futures::TryStreamExt;
use mongodb::{
    options::{
        FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument, UpdateModifications,
    },
    results::UpdateResult,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

use crate::db::schemas::Metadata;
use crate::types::AppError;

/// Index specs a schema wants on its collection
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Access to a document's timestamps
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

const CONNECT_TIMEOUTS: &str = "serverSelectionTimeoutMS=3000&connectTimeoutMS=3000";

/// Connected database handle
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and ping; an unreachable server fails within a few seconds
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, AppError> {
        info!("Connecting to MongoDB at {}", redact_uri(uri));

        let separator = if uri.contains('?') { '&' } else { '?' };
        let client = Client::with_uri_str(format!("{uri}{separator}{CONNECT_TIMEOUTS}"))
            .await
            .map_err(|e| AppError::Database(format!("Cannot reach MongoDB: {}", e)))?;

        let connected = Self {
            client,
            db_name: db_name.to_owned(),
        };
        connected.ping().await?;

        info!(database = db_name, "MongoDB connected");
        Ok(connected)
    }

    /// Round trip to the server
    pub async fn ping(&self) -> Result<(), AppError> {
        self.client
            .database(&self.db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| AppError::Database(format!("MongoDB ping failed: {}", e)))?;
        Ok(())
    }

    /// Typed collection with its indexes in place
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, AppError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        let collection = MongoCollection {
            inner: self.client.database(&self.db_name).collection::<T>(name),
        };
        collection.ensure_indexes().await?;
        Ok(collection)
    }
}

/// Strip credentials from a connection string before logging it
fn redact_uri(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &uri[..scheme_end], &uri[at..])
        }
        _ => uri.to_string(),
    }
}

/// Collection of one schema type
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    async fn ensure_indexes(&self) -> Result<(), AppError> {
        let models: Vec<IndexModel> = T::into_indices()
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();
        if models.is_empty() {
            return Ok(());
        }

        self.inner
            .create_indexes(models)
            .await
            .map_err(|e| AppError::Database(format!("Index creation failed: {}", e)))?;
        Ok(())
    }

    /// Insert with fresh timestamps, returning the new id and the stored value
    pub async fn insert_one(&self, mut item: T) -> Result<(ObjectId, T), AppError> {
        *item.mut_metadata() = Metadata::new();

        let inserted = self
            .inner
            .insert_one(&item)
            .await
            .map_err(|e| AppError::Database(format!("Insert failed: {}", e)))?
            .inserted_id;

        let id = inserted
            .as_object_id()
            .ok_or_else(|| AppError::Database(format!("Unexpected inserted id {}", inserted)))?;
        Ok((id, item))
    }

    /// Find one document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, AppError> {
        self.inner
            .find_one(filter)
            .await
            .map_err(|e| AppError::Database(format!("Find failed: {}", e)))
    }

    /// Find one document by `_id`
    pub async fn find_by_id(&self, id: ObjectId) -> Result<Option<T>, AppError> {
        self.find_one(doc! { "_id": id }).await
    }

    /// Find many documents by filter
    ///
    /// A document that fails to decode fails the whole call; callers such as
    /// the deletion cascade must not act on a partial result.
    pub async fn find_many(&self, filter: Document) -> Result<Vec<T>, AppError> {
        self.find_with_options(filter, None).await
    }

    /// Find with sort/skip/limit options
    pub async fn find_with_options(
        &self,
        filter: Document,
        options: Option<FindOptions>,
    ) -> Result<Vec<T>, AppError> {
        let cursor = self
            .inner
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| AppError::Database(format!("Find failed: {}", e)))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| AppError::Database(format!("Error reading documents: {}", e)))
    }

    /// Count documents matching a filter
    pub async fn count(&self, filter: Document) -> Result<u64, AppError> {
        self.inner
            .count_documents(filter)
            .await
            .map_err(|e| AppError::Database(format!("Count failed: {}", e)))
    }

    /// Update one document
    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, AppError> {
        self.inner
            .update_one(filter, update)
            .await
            .map_err(|e| AppError::Database(format!("Update failed: {}", e)))
    }

    /// Update every matching document
    pub async fn update_many(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, AppError> {
        self.inner
            .update_many(filter, update)
            .await
            .map_err(|e| AppError::Database(format!("Update failed: {}", e)))
    }

    /// Update one document and return it as stored afterwards
    pub async fn find_one_and_update(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<Option<T>, AppError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.inner
            .find_one_and_update(filter, update)
            .with_options(options)
            .await
            .map_err(|e| AppError::Database(format!("Update failed: {}", e)))
    }

    /// Hard delete a single document, returning whether one was removed
    pub async fn delete_one(&self, filter: Document) -> Result<bool, AppError> {
        let result = self
            .inner
            .delete_one(filter)
            .await
            .map_err(|e| AppError::Database(format!("Delete failed: {}", e)))?;
        Ok(result.deleted_count > 0)
    }

    /// Hard delete every matching document
    pub async fn delete_many(&self, filter: Document) -> Result<u64, AppError> {
        let result = self
            .inner
            .delete_many(filter)
            .await
            .map_err(|e| AppError::Database(format!("Delete failed: {}", e)))?;
        Ok(result.deleted_count)
    }

    /// Run an aggregation pipeline, returning raw documents
    pub async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, AppError> {
        let cursor = self
            .inner
            .aggregate(pipeline)
            .await
            .map_err(|e| AppError::Database(format!("Aggregation failed: {}", e)))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| AppError::Database(format!("Error reading aggregation: {}", e)))
    }
}
