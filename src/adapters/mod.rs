//! Transport adapters.
//!
//! The store never builds URLs or speaks HTTP itself. It hands a type name
//! and the caller's [`Params`] to an [`Adapter`], which resolves them into a
//! remote request and returns the parsed JSON body.
//!
//! - [`RestAdapter`] resolves endpoints from per-type templates and sends
//!   requests through any [`Transport`]
//! - [`HttpAdapter`] is a [`RestAdapter`] over `reqwest`
//!
//! # Example
//!
//! ```ignore
//! let adapter = Arc::new(HttpAdapter::http(HttpConfig::default())?);
//! let store = Store::with_adapter(StoreConfig::default(), adapter);
//!
//! store.register("person", TypeOptions::new().with_endpoints(Endpoints::new(
//!     "https://api.example.com/people/:id",
//!     "https://api.example.com/people",
//! )));
//!
//! let person = store.find("person", 4).await?;
//! ```

mod http;
mod rest;
mod transport;

pub use http::{HttpAdapter, HttpConfig, ReqwestTransport};
pub use rest::{EndpointResolver, RestAdapter};
pub use transport::{HttpRequest, HttpResponse, Method, Transport};

use crate::error::Result;
use crate::types::{Endpoints, Params};
use async_trait::async_trait;
use serde_json::Value;

/// Per-request options.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    /// Explicit request body. Methods that carry a body fall back to the
    /// request params when this is `None`.
    pub body: Option<Value>,
}

impl FetchOptions {
    pub fn method(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Contract between the store and a remote source of records.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Issue one logical request and resolve to the parsed response body.
    async fn fetch(&self, type_name: &str, params: &Params, options: FetchOptions) -> Result<Value>;

    /// Fetch with default options. Bypasses any store.
    async fn get(&self, type_name: &str, params: &Params) -> Result<Value> {
        self.fetch(type_name, params, FetchOptions::default()).await
    }

    /// Receive endpoint templates registered through the store.
    fn register_endpoints(&self, _type_name: &str, _endpoints: Endpoints) {}
}
