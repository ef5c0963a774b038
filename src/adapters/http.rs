//! `reqwest`-backed transport.

use super::rest::RestAdapter;
use super::transport::{HttpRequest, HttpResponse, Method, Transport};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default `User-Agent` sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("unistore/", env!("CARGO_PKG_VERSION"));

/// HTTP transport configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpConfig {
    pub user_agent: String,

    /// Headers added to every request before per-request headers.
    pub default_headers: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_headers: BTreeMap::from([(
                "Accept".to_string(),
                "application/json".to_string(),
            )]),
        }
    }
}

/// [`Transport`] over a shared `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    config: HttpConfig,
}

impl ReqwestTransport {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, config })
    }

    /// Use an existing client; `config.user_agent` is not applied.
    pub fn with_client(client: reqwest::Client, config: HttpConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(reqwest_method(request.method), &request.url);

        for (name, value) in &self.config.default_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// REST adapter speaking HTTP through `reqwest`.
pub type HttpAdapter = RestAdapter<ReqwestTransport>;

impl HttpAdapter {
    pub fn http(config: HttpConfig) -> Result<Self> {
        Ok(RestAdapter::new(ReqwestTransport::new(config)?))
    }
}
