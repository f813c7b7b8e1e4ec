//! MongoDB cluster adapter for mongo-check.
//!
//! Documents are read as `RawDocumentBuf` so the bytes compared are exactly
//! the bytes the server returned. Every call carries a server-side
//! `maxTimeMS` equal to the configured per-call timeout.

mod query;

use async_trait::async_trait;
use bson::{doc, Document, RawDocumentBuf};
use check_core::{
    ClusterAdapter, ClusterError, DocumentCursor, DocumentKey, IndexDefinition, Namespace,
    OrderedFind, RandomSample,
};
use mongodb::options::{ClientOptions, Hint};
use mongodb::{Client, Collection, Cursor};
use std::time::Duration;

pub use query::{key_filter, ordered_filter, sample_pipeline};

/// Connection options (library type without clap).
#[derive(Clone, Debug)]
pub struct ConnectOpts {
    /// Bound on establishing a connection and selecting a server.
    pub connect_timeout: Duration,
    /// Server-side time limit applied to every read.
    pub call_timeout: Duration,
}

impl Default for ConnectOpts {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(60),
        }
    }
}

/// A connected MongoDB deployment.
#[derive(Clone, Debug)]
pub struct MongoCluster {
    client: Client,
    call_timeout: Duration,
}

impl MongoCluster {
    /// Connect and ping so unreachable clusters fail here rather than on first read.
    pub async fn connect(uri: &str, opts: &ConnectOpts) -> Result<Self, ClusterError> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(ClusterError::connect)?;
        options.connect_timeout = Some(opts.connect_timeout);
        options.server_selection_timeout = Some(opts.connect_timeout);
        tracing::debug!("Parsed MongoDB connection options with timeouts applied");

        let client = Client::with_options(options).map_err(ClusterError::connect)?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(ClusterError::connect)?;
        tracing::debug!("MongoDB ping succeeded");

        Ok(Self {
            client,
            call_timeout: opts.call_timeout,
        })
    }

    /// Close all connections held by the client.
    pub async fn shutdown(self) {
        self.client.shutdown().await;
    }

    fn collection(&self, ns: &Namespace) -> Collection<RawDocumentBuf> {
        self.client
            .database(&ns.database)
            .collection::<RawDocumentBuf>(&ns.collection)
    }
}

struct MongoCursor(Cursor<RawDocumentBuf>);

#[async_trait]
impl DocumentCursor for MongoCursor {
    async fn advance(&mut self) -> Result<Option<RawDocumentBuf>, ClusterError> {
        if self.0.advance().await.map_err(ClusterError::query)? {
            Ok(Some(self.0.current().to_owned()))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl ClusterAdapter for MongoCluster {
    async fn list_database_names(&self) -> Result<Vec<String>, ClusterError> {
        self.client
            .list_database_names()
            .await
            .map_err(ClusterError::query)
    }

    async fn list_collection_names(&self, database: &str) -> Result<Vec<String>, ClusterError> {
        self.client
            .database(database)
            .list_collection_names()
            .await
            .map_err(ClusterError::query)
    }

    async fn estimated_document_count(&self, ns: &Namespace) -> Result<u64, ClusterError> {
        self.collection(ns)
            .estimated_document_count()
            .max_time(self.call_timeout)
            .await
            .map_err(ClusterError::query)
    }

    async fn find_ordered(
        &self,
        ns: &Namespace,
        query: &OrderedFind,
    ) -> Result<Box<dyn DocumentCursor>, ClusterError> {
        let filter = ordered_filter(query);
        tracing::trace!("find on {ns}: filter {filter}, skip {}", query.skip);
        let collection = self.collection(ns);
        let mut action = collection
            .find(filter)
            .sort(query::key_ascending())
            .skip(query.skip)
            .max_time(self.call_timeout);
        if let Some(limit) = query.limit {
            action = action.limit(limit as i64);
        }
        let cursor = action.await.map_err(ClusterError::query)?;
        Ok(Box::new(MongoCursor(cursor)))
    }

    async fn scan(&self, ns: &Namespace) -> Result<Box<dyn DocumentCursor>, ClusterError> {
        let cursor = self
            .collection(ns)
            .find(doc! {})
            .hint(Hint::Keys(query::natural_order()))
            .max_time(self.call_timeout)
            .await
            .map_err(ClusterError::query)?;
        Ok(Box::new(MongoCursor(cursor)))
    }

    async fn find_by_key(
        &self,
        ns: &Namespace,
        key: &DocumentKey,
    ) -> Result<Option<RawDocumentBuf>, ClusterError> {
        self.collection(ns)
            .find_one(key_filter(key))
            .max_time(self.call_timeout)
            .await
            .map_err(ClusterError::query)
    }

    async fn random_sample(
        &self,
        ns: &Namespace,
        sample: &RandomSample,
    ) -> Result<Box<dyn DocumentCursor>, ClusterError> {
        let pipeline = sample_pipeline(sample);
        tracing::debug!("aggregate on {ns}: {pipeline:?}");
        let cursor = self
            .collection(ns)
            .aggregate(pipeline)
            .max_time(self.call_timeout)
            .await
            .map_err(ClusterError::query)?;
        Ok(Box::new(MongoCursor(cursor.with_type::<RawDocumentBuf>())))
    }

    async fn list_indexes(&self, ns: &Namespace) -> Result<Vec<IndexDefinition>, ClusterError> {
        let mut cursor = self
            .collection(ns)
            .list_indexes()
            .max_time(self.call_timeout)
            .await
            .map_err(ClusterError::query)?
            .with_type::<RawDocumentBuf>();

        let mut indexes = Vec::new();
        while cursor.advance().await.map_err(ClusterError::query)? {
            indexes.push(IndexDefinition::new(cursor.current().to_owned()));
        }
        Ok(indexes)
    }

    async fn server_version(&self) -> Result<String, ClusterError> {
        let info: Document = self
            .client
            .database("admin")
            .run_command(doc! { "buildInfo": 1 })
            .await
            .map_err(ClusterError::query)?;
        info.get_str("version")
            .map(str::to_string)
            .map_err(|e| ClusterError::MalformedDocument(format!("buildInfo: {e}")))
    }
}
