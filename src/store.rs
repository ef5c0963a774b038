//! Main Store struct: type registry, record cache, and transform pipeline.

use crate::adapters::{Adapter, FetchOptions};
use crate::error::{Result, StoreError};
use crate::types::{
    Cardinality, Params, Record, RequestKind, Resolved, TypeOptions, DEFAULT_PRIMARY_KEY,
};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Store configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    /// Primary-key field used by types that don't override it.
    pub primary_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
        }
    }
}

/// A transform applied to data before it enters the cache.
///
/// Called with the record (or collection), the type's metadata, and whether
/// the value is one record or many. Returning `Value::Null` drops the value.
pub type TransformFn = dyn Fn(Value, &TypeOptions, Cardinality) -> Value + Send + Sync;

/// Cached records for one type, keyed by normalized primary key.
type Table = IndexMap<String, Record>;

/// The record store.
///
/// Provides a unified interface for:
/// - Registering types and their metadata
/// - Reading and upserting cached records
/// - Finding records in the cache, falling back to the adapter
/// - Fetching records from the adapter, bypassing the cache
pub struct Store {
    /// Store configuration.
    config: StoreConfig,

    /// Remote source of records.
    adapter: RwLock<Option<Arc<dyn Adapter>>>,

    /// Type name -> metadata.
    registry: RwLock<HashMap<String, TypeOptions>>,

    /// Type name -> cached records.
    data: RwLock<HashMap<String, Table>>,

    /// Transform pipeline, in registration order.
    transforms: RwLock<Vec<Arc<TransformFn>>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("has_adapter", &self.adapter.read().is_some())
            .field("types", &self.registry.read().keys().collect::<Vec<_>>())
            .field("transforms", &self.transforms.read().len())
            .finish()
    }
}

impl Store {
    /// Create a store without an adapter. Remote operations fail until one is set.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            adapter: RwLock::new(None),
            registry: RwLock::new(HashMap::new()),
            data: RwLock::new(HashMap::new()),
            transforms: RwLock::new(Vec::new()),
        }
    }

    /// Create a store backed by `adapter`.
    pub fn with_adapter(config: StoreConfig, adapter: Arc<dyn Adapter>) -> Self {
        let store = Self::new(config);
        *store.adapter.write() = Some(adapter);
        store
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Replace the adapter.
    ///
    /// Endpoints of already registered types are forwarded to the new adapter.
    pub fn set_adapter(&self, adapter: Arc<dyn Adapter>) {
        let registry = self.registry.read();
        for (type_name, options) in registry.iter() {
            if let Some(endpoints) = &options.endpoints {
                adapter.register_endpoints(type_name, endpoints.clone());
            }
        }
        *self.adapter.write() = Some(adapter);
    }

    pub fn adapter(&self) -> Option<Arc<dyn Adapter>> {
        self.adapter.read().clone()
    }

    // --- Registry ---

    /// Register a type, replacing any previous metadata.
    ///
    /// Cached records of the type are kept. Endpoint templates in `options`
    /// are forwarded to the adapter.
    pub fn register(&self, type_name: &str, options: TypeOptions) -> &Self {
        debug!(type_name, primary_key = ?options.primary_key, "registering type");

        if let (Some(endpoints), Some(adapter)) = (&options.endpoints, self.adapter()) {
            adapter.register_endpoints(type_name, endpoints.clone());
        }

        self.registry.write().insert(type_name.to_string(), options);
        self.data.write().entry(type_name.to_string()).or_default();
        self
    }

    /// Metadata for a type; empty if it was never registered.
    pub fn lookup(&self, type_name: &str) -> TypeOptions {
        self.registry
            .read()
            .get(type_name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.registry.read().contains_key(type_name)
    }

    /// Empty every cache table. Registrations are kept.
    pub fn clear(&self) {
        let mut data = self.data.write();
        for table in data.values_mut() {
            table.clear();
        }
        debug!(types = data.len(), "cleared store");
    }

    /// Primary-key field for a type: its override, else the store default.
    pub fn primary_key_for(&self, type_name: &str) -> String {
        self.registry
            .read()
            .get(type_name)
            .and_then(|options| options.primary_key.clone())
            .unwrap_or_else(|| self.config.primary_key.clone())
    }

    /// Infer whether `params` addresses one record or a collection of `type_name`.
    pub fn request_kind(&self, type_name: &str, params: &Params) -> RequestKind {
        params.request_kind(&self.primary_key_for(type_name))
    }

    // --- Transforms ---

    /// Append a function to the transform pipeline.
    pub fn on_transform<F>(&self, transform: F) -> &Self
    where
        F: Fn(Value, &TypeOptions, Cardinality) -> Value + Send + Sync + 'static,
    {
        self.transforms.write().push(Arc::new(transform));
        self
    }

    /// Run the pipeline over `data` without touching the cache.
    pub fn transform(&self, type_name: &str, data: Value, cardinality: Cardinality) -> Value {
        // Snapshot so transforms may call back into the store.
        let transforms: Vec<Arc<TransformFn>> = self.transforms.read().clone();
        if transforms.is_empty() {
            return data;
        }

        let options = self.lookup(type_name);
        let mut data = data;
        for transform in &transforms {
            if data.is_null() {
                break;
            }
            data = transform(data, &options, cardinality);
        }
        data
    }

    // --- Cache Reads ---

    /// Read from the cache.
    ///
    /// A key yields [`Resolved::One`] or [`Resolved::Nothing`]. A collection
    /// request yields every cached record of the type, or
    /// [`Resolved::Nothing`] if the type was never registered.
    pub fn get(&self, type_name: &str, params: impl Into<Params>) -> Resolved {
        let params = params.into();
        match self.request_kind(type_name, &params) {
            RequestKind::One { key } => self
                .get_one(type_name, &key)
                .map_or(Resolved::Nothing, Resolved::One),
            RequestKind::Many { .. } => self
                .get_many(type_name)
                .map_or(Resolved::Nothing, Resolved::Many),
        }
    }

    /// Cached record by normalized key.
    pub fn get_one(&self, type_name: &str, key: &str) -> Option<Record> {
        self.data
            .read()
            .get(type_name)
            .and_then(|table| table.get(key))
            .cloned()
    }

    /// All cached records of a type, in insertion order.
    ///
    /// `None` for a type that was never registered, even if records were
    /// pushed under its name.
    pub fn get_many(&self, type_name: &str) -> Option<Vec<Record>> {
        if !self.is_registered(type_name) {
            return None;
        }
        self.data
            .read()
            .get(type_name)
            .map(|table| table.values().cloned().collect())
    }

    // --- Cache Writes ---

    /// Upsert a record, or every record of an array.
    pub fn push(&self, type_name: &str, data: Value) -> Resolved {
        if data.is_array() {
            self.push_many(type_name, data)
        } else {
            self.push_one(type_name, data)
        }
    }

    fn push_one(&self, type_name: &str, data: Value) -> Resolved {
        let data = self.transform(type_name, data, Cardinality::One);

        let Some(record) = Record::from_value(data) else {
            trace!(type_name, "dropping non-object record");
            return Resolved::Nothing;
        };

        let primary_key = self.primary_key_for(type_name);
        let Some(key) = record.key(&primary_key) else {
            trace!(type_name, %primary_key, "dropping record without primary key");
            return Resolved::Nothing;
        };

        self.data
            .write()
            .entry(type_name.to_string())
            .or_default()
            .insert(key, record.clone());

        Resolved::One(record)
    }

    fn push_many(&self, type_name: &str, data: Value) -> Resolved {
        let records = match self.transform(type_name, data, Cardinality::Many) {
            Value::Array(records) => records,
            _ => return Resolved::Many(Vec::new()),
        };

        Resolved::Many(
            records
                .into_iter()
                .filter_map(|record| self.push_one(type_name, record).into_one())
                .collect(),
        )
    }

    // --- Remote Operations ---

    /// Answer from the cache when it satisfies the request, else fetch.
    ///
    /// A collection is satisfied only by a non-empty table.
    pub async fn find(&self, type_name: &str, params: impl Into<Params>) -> Result<Resolved> {
        let params = params.into();
        match self.request_kind(type_name, &params) {
            RequestKind::One { key } => {
                if let Some(record) = self.get_one(type_name, &key) {
                    return Ok(Resolved::One(record));
                }
            }
            RequestKind::Many { .. } => {
                if let Some(records) = self.get_many(type_name).filter(|r| !r.is_empty()) {
                    return Ok(Resolved::Many(records));
                }
            }
        }

        self.fetch_with(type_name, params, FetchOptions::default())
            .await
    }

    /// Fetch from the adapter, bypassing the cache, and cache the result.
    pub async fn fetch(&self, type_name: &str, params: impl Into<Params>) -> Result<Resolved> {
        self.fetch_with(type_name, params, FetchOptions::default())
            .await
    }

    /// [`Store::fetch`] with explicit request options.
    pub async fn fetch_with(
        &self,
        type_name: &str,
        params: impl Into<Params>,
        options: FetchOptions,
    ) -> Result<Resolved> {
        let params = params.into();
        let adapter = self.adapter().ok_or(StoreError::MissingAdapter)?;
        let cardinality = self.request_kind(type_name, &params).cardinality();

        debug!(type_name, %cardinality, "fetching from adapter");
        let data = adapter.fetch(type_name, &params, options).await?;

        Ok(match cardinality {
            Cardinality::One => self.push_one(type_name, data),
            Cardinality::Many => self.push_many(type_name, data),
        })
    }
}
