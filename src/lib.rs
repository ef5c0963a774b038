//! # Unistore
//!
//! A client-side record store: an in-memory cache of typed records fronted
//! by a pluggable adapter that turns logical requests into remote fetches.
//!
//! ## Core Concepts
//!
//! - **Types**: named record categories with per-type metadata
//! - **Shape inference**: `get`, `find`, and `fetch` address one record or a
//!   collection depending on the params they are given
//! - **Transforms**: an ordered pipeline applied before data is cached
//! - **Adapters**: remote sources; [`RestAdapter`] resolves URLs from
//!   per-type endpoint templates
//!
//! ## Example
//!
//! ```ignore
//! use unistore::{Endpoints, HttpAdapter, HttpConfig, Store, StoreConfig, TypeOptions};
//!
//! let adapter = Arc::new(HttpAdapter::http(HttpConfig::default())?);
//! let store = Store::with_adapter(StoreConfig::default(), adapter);
//!
//! store.register("person", TypeOptions::new().with_endpoints(Endpoints::new(
//!     "https://api.example.com/people/:id",
//!     "https://api.example.com/people",
//! )));
//!
//! // Cache miss: GET https://api.example.com/people/4
//! let person = store.find("person", 4).await?;
//!
//! // Cache hit
//! let same = store.get("person", 4);
//!
//! // Collection filter: GET https://api.example.com/people?limit=20
//! let page = store.fetch("person", json!({"limit": 20})).await?;
//! ```

pub mod adapters;
pub mod error;
pub mod store;
pub mod testing;
pub mod types;

// Re-exports
pub use adapters::{
    Adapter, EndpointResolver, FetchOptions, HttpAdapter, HttpConfig, HttpRequest, HttpResponse,
    Method, ReqwestTransport, RestAdapter, Transport,
};
pub use error::{Result, StoreError};
pub use store::{Store, StoreConfig, TransformFn};
pub use types::*;
