//! MongoDB client and typed collection wrapper

use bson::{doc, DateTime, Document};
use futures::{Stream, TryStreamExt};
use mongodb::{
    options::{IndexOptions, UpdateModifications},
    results::UpdateResult,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::types::{ExchangeError, Result};

/// Schemas that declare their own indexes
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Schemas carrying common metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and ping the database
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast instead of hanging on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri).await.map_err(|e| {
            ExchangeError::StoreUnavailable(format!("Failed to connect to MongoDB: {}", e))
        })?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| ExchangeError::StoreUnavailable(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection, applying the schema's indexes
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection
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
    pub async fn new(client: &Client, db_name: &str, collection_name: &str) -> Result<Self> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    async fn apply_indexes(&self) -> Result<()> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner.create_indexes(indices).await.map_err(|e| {
            ExchangeError::StoreUnavailable(format!("Failed to create indexes: {}", e))
        })?;

        Ok(())
    }

    /// Insert a document, stamping its metadata
    pub async fn insert_one(&self, mut item: T) -> Result<()> {
        let metadata = item.mut_metadata();
        metadata.created_at = Some(DateTime::now());
        metadata.updated_at = Some(DateTime::now());

        self.inner
            .insert_one(item)
            .await
            .map_err(|e| ExchangeError::StoreUnavailable(format!("Insert failed: {}", e)))?;

        Ok(())
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<T>> {
        self.inner
            .find_one(filter)
            .await
            .map_err(|e| ExchangeError::StoreUnavailable(format!("Find failed: {}", e)))
    }

    /// Find all matching documents, sorted by `sort`.
    ///
    /// The first cursor error fails the whole read; a partial result would
    /// silently shrink candidate sweeps.
    pub async fn find_many(&self, filter: Document, sort: Document) -> Result<Vec<T>> {
        let cursor = self
            .inner
            .find(filter)
            .sort(sort)
            .await
            .map_err(|e| ExchangeError::StoreUnavailable(format!("Find failed: {}", e)))?;

        collect_all(cursor).await
    }

    pub async fn count(&self, filter: Document) -> Result<u64> {
        self.inner
            .count_documents(filter)
            .await
            .map_err(|e| ExchangeError::StoreUnavailable(format!("Count failed: {}", e)))
    }

    /// Update one document, bumping `metadata.updated_at`
    pub async fn update_one(&self, filter: Document, mut update: Document) -> Result<UpdateResult> {
        let touched = doc! { "metadata.updated_at": DateTime::now() };
        if update.contains_key("$set") {
            if let Ok(set) = update.get_document_mut("$set") {
                set.extend(touched);
            }
        } else {
            update.insert("$set", touched);
        }

        self.inner
            .update_one(filter, UpdateModifications::Document(update))
            .await
            .map_err(|e| ExchangeError::StoreUnavailable(format!("Update failed: {}", e)))
    }
}

/// Drain a document stream, failing on the first error
async fn collect_all<T, E, St>(stream: St) -> Result<Vec<T>>
where
    St: Stream<Item = std::result::Result<T, E>>,
    E: std::fmt::Display,
{
    stream
        .map_err(|e| {
            error!("Error reading document: {}", e);
            ExchangeError::StoreUnavailable(format!("Cursor read failed: {}", e))
        })
        .try_collect()
        .await
}
