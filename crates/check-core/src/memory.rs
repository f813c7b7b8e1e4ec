//! In-memory cluster.
//!
//! Holds collections as `_id`-ordered maps of raw documents and evaluates the
//! random sampling primitives locally with its own seeded RNG. Useful for
//! tests and dry runs of the sampling logic without a server.

use async_trait::async_trait;
use bson::{doc, Bson, Document, RawDocumentBuf};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::cluster::{ClusterAdapter, DocumentCursor, OrderedFind, RandomSample, VecCursor};
use crate::document::{DocumentKey, IndexDefinition, Namespace};
use crate::error::ClusterError;

#[derive(Debug, Default)]
struct MemoryCollection {
    documents: BTreeMap<DocumentKey, RawDocumentBuf>,
    indexes: Vec<RawDocumentBuf>,
    estimated_count: Option<u64>,
}

impl MemoryCollection {
    fn new() -> Result<Self, ClusterError> {
        let id_index = encode(&doc! { "v": 2, "key": { "_id": 1 }, "name": "_id_" })?;
        Ok(Self {
            indexes: vec![id_index],
            ..Default::default()
        })
    }
}

type Databases = BTreeMap<String, BTreeMap<String, MemoryCollection>>;

/// A cluster backed by process memory.
pub struct MemoryCluster {
    version: String,
    databases: Mutex<Databases>,
    rng: Mutex<StdRng>,
}

fn encode(document: &Document) -> Result<RawDocumentBuf, ClusterError> {
    RawDocumentBuf::from_document(document)
        .map_err(|e| ClusterError::MalformedDocument(e.to_string()))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryCluster {
    /// An empty cluster reporting the given engine version.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            databases: Mutex::new(BTreeMap::new()),
            rng: Mutex::new(StdRng::seed_from_u64(0)),
        }
    }

    /// Seed the RNG used by `$sample`, `$sampleRate` and `$rand`.
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    fn with_collection<T>(
        &self,
        ns: &Namespace,
        f: impl FnOnce(&mut MemoryCollection) -> T,
    ) -> Result<T, ClusterError> {
        let mut databases = lock(&self.databases);
        let collections = databases.entry(ns.database.clone()).or_default();
        if !collections.contains_key(&ns.collection) {
            collections.insert(ns.collection.clone(), MemoryCollection::new()?);
        }
        let collection = collections
            .get_mut(&ns.collection)
            .ok_or_else(|| ClusterError::query(format!("collection {ns} vanished")))?;
        Ok(f(collection))
    }

    fn read_collection<T>(
        &self,
        ns: &Namespace,
        f: impl FnOnce(Option<&MemoryCollection>) -> T,
    ) -> T {
        let databases = lock(&self.databases);
        f(databases
            .get(&ns.database)
            .and_then(|c| c.get(&ns.collection)))
    }

    pub fn create_collection(&self, ns: &Namespace) -> Result<(), ClusterError> {
        self.with_collection(ns, |_| ())
    }

    /// Insert or replace a document. The document must carry an `_id`.
    pub fn insert(&self, ns: &Namespace, document: Document) -> Result<(), ClusterError> {
        let raw = encode(&document)?;
        let key = DocumentKey::from_document(&raw)?;
        self.with_collection(ns, |c| {
            c.documents.insert(key, raw);
        })
    }

    pub fn insert_many(
        &self,
        ns: &Namespace,
        documents: impl IntoIterator<Item = Document>,
    ) -> Result<(), ClusterError> {
        for document in documents {
            self.insert(ns, document)?;
        }
        Ok(())
    }

    /// Remove the document with the given `_id`, returning whether it existed.
    pub fn remove(&self, ns: &Namespace, key: impl Into<Bson>) -> bool {
        let key = DocumentKey::new(key);
        self.with_collection(ns, |c| c.documents.remove(&key).is_some())
            .unwrap_or(false)
    }

    /// Append an index specification, e.g. `{ v: 2, key: { a: 1 }, name: "a_1" }`.
    pub fn create_index(&self, ns: &Namespace, spec: Document) -> Result<(), ClusterError> {
        let raw = encode(&spec)?;
        self.with_collection(ns, |c| c.indexes.push(raw))
    }

    /// Override the metadata count, to model a stale estimate.
    pub fn set_estimated_count(&self, ns: &Namespace, count: u64) -> Result<(), ClusterError> {
        self.with_collection(ns, |c| c.estimated_count = Some(count))
    }

    pub fn len(&self, ns: &Namespace) -> usize {
        self.read_collection(ns, |c| c.map(|c| c.documents.len()).unwrap_or(0))
    }

    pub fn is_empty(&self, ns: &Namespace) -> bool {
        self.len(ns) == 0
    }

    fn documents(&self, ns: &Namespace) -> Vec<RawDocumentBuf> {
        self.read_collection(ns, |c| {
            c.map(|c| c.documents.values().cloned().collect())
                .unwrap_or_default()
        })
    }
}

#[async_trait]
impl ClusterAdapter for MemoryCluster {
    async fn list_database_names(&self) -> Result<Vec<String>, ClusterError> {
        Ok(lock(&self.databases).keys().cloned().collect())
    }

    async fn list_collection_names(&self, database: &str) -> Result<Vec<String>, ClusterError> {
        Ok(lock(&self.databases)
            .get(database)
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn estimated_document_count(&self, ns: &Namespace) -> Result<u64, ClusterError> {
        Ok(self.read_collection(ns, |c| {
            c.map(|c| c.estimated_count.unwrap_or(c.documents.len() as u64))
                .unwrap_or(0)
        }))
    }

    async fn find_ordered(
        &self,
        ns: &Namespace,
        query: &OrderedFind,
    ) -> Result<Box<dyn DocumentCursor>, ClusterError> {
        let documents = self.read_collection(ns, |c| {
            let Some(c) = c else {
                return Vec::new();
            };
            let matching: Box<dyn Iterator<Item = &RawDocumentBuf>> = match &query.min_key {
                Some(min) => Box::new(c.documents.range(min.clone()..).map(|(_, d)| d)),
                None => Box::new(c.documents.values()),
            };
            let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
            matching
                .skip(query.skip as usize)
                .take(limit)
                .cloned()
                .collect()
        });
        Ok(Box::new(VecCursor::new(documents)))
    }

    async fn scan(&self, ns: &Namespace) -> Result<Box<dyn DocumentCursor>, ClusterError> {
        Ok(Box::new(VecCursor::new(self.documents(ns))))
    }

    async fn find_by_key(
        &self,
        ns: &Namespace,
        key: &DocumentKey,
    ) -> Result<Option<RawDocumentBuf>, ClusterError> {
        Ok(self.read_collection(ns, |c| c.and_then(|c| c.documents.get(key).cloned())))
    }

    async fn random_sample(
        &self,
        ns: &Namespace,
        sample: &RandomSample,
    ) -> Result<Box<dyn DocumentCursor>, ClusterError> {
        let documents = self.documents(ns);
        let mut rng = lock(&self.rng);
        let picked = match *sample {
            RandomSample::Reservoir { size } => {
                let size = size as usize;
                let mut reservoir: Vec<RawDocumentBuf> = Vec::with_capacity(size);
                for (i, doc) in documents.into_iter().enumerate() {
                    if i < size {
                        reservoir.push(doc);
                    } else {
                        let j = rng.random_range(0..=i);
                        if j < size {
                            reservoir[j] = doc;
                        }
                    }
                }
                reservoir
            }
            RandomSample::Bernoulli { probability, .. } => documents
                .into_iter()
                .filter(|_| rng.random::<f64>() < probability)
                .collect(),
        };
        Ok(Box::new(VecCursor::new(picked)))
    }

    async fn list_indexes(&self, ns: &Namespace) -> Result<Vec<IndexDefinition>, ClusterError> {
        self.read_collection(ns, |c| match c {
            Some(c) => Ok(c.indexes.iter().cloned().map(IndexDefinition::new).collect()),
            None => Err(ClusterError::query(format!("ns does not exist: {ns}"))),
        })
    }

    async fn server_version(&self) -> Result<String, ClusterError> {
        Ok(self.version.clone())
    }
}
