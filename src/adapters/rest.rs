//! REST endpoint resolution and the adapter built on it.

use super::transport::{HttpRequest, Transport};
use super::{Adapter, FetchOptions};
use crate::error::{Result, StoreError};
use crate::types::{normalize_key, Endpoints, Params};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::ops::Range;
use tracing::{debug, warn};

/// Turns a type name and request params into a concrete URL.
///
/// Only the last `:name` segment of a "one" template is substituted. Earlier
/// dynamic segments are left in the URL as written.
#[derive(Debug, Default)]
pub struct EndpointResolver {
    endpoints: RwLock<HashMap<String, Endpoints>>,
}

impl EndpointResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the templates for a type.
    pub fn register_endpoints(&self, type_name: &str, endpoints: Endpoints) {
        debug!(type_name, one = %endpoints.one, many = %endpoints.many, "registering endpoints");
        self.endpoints.write().insert(type_name.to_string(), endpoints);
    }

    /// Templates registered for a type.
    pub fn endpoints(&self, type_name: &str) -> Option<Endpoints> {
        self.endpoints.read().get(type_name).cloned()
    }

    /// Resolve the request URL, or `None` if the type has no templates.
    pub fn endpoint_for(&self, type_name: &str, params: &Params) -> Option<String> {
        let endpoints = self.endpoints(type_name)?;
        let segment = key_segment(&endpoints.one);

        let url = match params {
            Params::None => endpoints.many.clone(),
            Params::Fields(fields) => {
                let key = segment.as_ref().and_then(|segment| {
                    fields
                        .get(segment.name)
                        .and_then(normalize_key)
                        .map(|key| (segment, key))
                });

                match key {
                    None => Self::build_url(&endpoints.many, fields),
                    Some((segment, key)) => {
                        let rest: Map<String, Value> = fields
                            .iter()
                            .filter(|(name, _)| name.as_str() != segment.name)
                            .map(|(name, value)| (name.clone(), value.clone()))
                            .collect();
                        let one = substitute(&endpoints.one, segment.range.clone(), &key);
                        Self::build_url(&one, &rest)
                    }
                }
            }
            Params::Key(value) => match normalize_key(value) {
                None => endpoints.many.clone(),
                Some(key) => match segment {
                    Some(segment) => substitute(&endpoints.one, segment.range, &key),
                    None => endpoints.one.clone(),
                },
            },
        };

        Some(url)
    }

    /// Append `query` to `url` as percent-encoded `key=value` pairs.
    ///
    /// Encoding leaves `A-Z a-z 0-9 - _ . ! ~ * ' ( )` literal.
    pub fn build_url(url: &str, query: &Map<String, Value>) -> String {
        if query.is_empty() {
            return url.to_string();
        }

        let pairs: Vec<String> = query
            .iter()
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    encode_component(name),
                    encode_component(&query_value(value))
                )
            })
            .collect();

        let mut url = url.to_string();
        match url.find('?') {
            None => url.push('?'),
            Some(pos) if pos != url.len() - 1 => url.push('&'),
            Some(_) => {}
        }
        url.push_str(&pairs.join("&"));
        url
    }

    /// Success iff a status was received and it is below 400.
    pub fn is_success(status: u16) -> bool {
        status != 0 && status < 400
    }
}

/// The designated key segment of a "one" template.
struct KeySegment<'a> {
    /// Byte range of `:name`, marker included.
    range: Range<usize>,
    name: &'a str,
}

fn key_segment(template: &str) -> Option<KeySegment<'_>> {
    let bytes = template.as_bytes();
    let mut last = None;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b':' {
            i += 1;
            continue;
        }

        let mut end = i + 1;
        while end < bytes.len() && is_word(bytes[end]) {
            end += 1;
        }

        // `:8080` in an authority is a port, not a segment.
        if end > i + 1 && !bytes[i + 1].is_ascii_digit() {
            last = Some(i..end);
        }
        i = end;
    }

    last.map(|range| KeySegment {
        name: &template[range.start + 1..range.end],
        range,
    })
}

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn substitute(template: &str, range: Range<usize>, key: &str) -> String {
    let mut url = String::with_capacity(template.len() + key.len());
    url.push_str(&template[..range.start]);
    url.push_str(key);
    url.push_str(&template[range.end..]);
    url
}

/// Percent-encode a query component, keeping the URI mark characters.
fn encode_component(raw: &str) -> String {
    let encoded = urlencoding::encode(raw);
    if !encoded.contains('%') {
        return encoded.into_owned();
    }
    encoded
        .replace("%21", "!")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
        .replace("%2A", "*")
}

/// String form of a query value before encoding.
fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(query_value).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

/// An [`Adapter`] that resolves REST endpoints and sends requests through a
/// [`Transport`].
pub struct RestAdapter<T> {
    resolver: EndpointResolver,
    transport: T,
}

impl<T: Transport> RestAdapter<T> {
    pub fn new(transport: T) -> Self {
        Self {
            resolver: EndpointResolver::new(),
            transport,
        }
    }

    pub fn resolver(&self) -> &EndpointResolver {
        &self.resolver
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn register_endpoints(&self, type_name: &str, endpoints: Endpoints) -> &Self {
        self.resolver.register_endpoints(type_name, endpoints);
        self
    }

    pub fn endpoint_for(&self, type_name: &str, params: &Params) -> Option<String> {
        self.resolver.endpoint_for(type_name, params)
    }

    fn request(&self, type_name: &str, params: &Params, options: FetchOptions) -> Result<HttpRequest> {
        let url = self
            .endpoint_for(type_name, params)
            .ok_or_else(|| StoreError::EndpointNotRegistered(type_name.to_string()))?;

        let body = if options.method.has_body() {
            let body = options.body.unwrap_or_else(|| params.to_value());
            Some(serde_json::to_vec(&body).map_err(|e| StoreError::InvalidOperation(e.to_string()))?)
        } else {
            None
        };

        Ok(HttpRequest {
            method: options.method,
            url,
            headers: options.headers,
            body,
        })
    }
}

#[async_trait]
impl<T: Transport> Adapter for RestAdapter<T> {
    async fn fetch(&self, type_name: &str, params: &Params, options: FetchOptions) -> Result<Value> {
        let request = self.request(type_name, params, options)?;
        let url = request.url.clone();
        debug!(type_name, method = %request.method, %url, "sending request");

        let response = self.transport.send(request).await?;

        if !EndpointResolver::is_success(response.status) {
            warn!(type_name, %url, status = response.status, "request failed");
            return Err(StoreError::Transport {
                status: response.status,
                url,
                body: response.text(),
            });
        }

        Ok(serde_json::from_slice(&response.body)?)
    }

    fn register_endpoints(&self, type_name: &str, endpoints: Endpoints) {
        self.resolver.register_endpoints(type_name, endpoints);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person_resolver() -> EndpointResolver {
        let resolver = EndpointResolver::new();
        resolver.register_endpoints(
            "person",
            Endpoints::new("http://x/person/:id", "http://x/person"),
        );
        resolver
    }

    fn query(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_no_params_uses_many() {
        let resolver = person_resolver();
        assert_eq!(
            resolver.endpoint_for("person", &Params::None).as_deref(),
            Some("http://x/person")
        );
    }

    #[test]
    fn test_scalar_key_substitutes_segment() {
        let resolver = person_resolver();
        assert_eq!(
            resolver.endpoint_for("person", &Params::from(1)).as_deref(),
            Some("http://x/person/1")
        );
    }

    #[test]
    fn test_falsy_scalar_keys_substitute() {
        let resolver = person_resolver();
        assert_eq!(
            resolver.endpoint_for("person", &Params::from(0)).as_deref(),
            Some("http://x/person/0")
        );
        assert_eq!(
            resolver.endpoint_for("person", &Params::from("")).as_deref(),
            Some("http://x/person/")
        );
    }

    #[test]
    fn test_mapping_with_key_adds_remaining_query() {
        let resolver = person_resolver();
        let params = Params::from(json!({"id": 1, "include": "bio"}));
        assert_eq!(
            resolver.endpoint_for("person", &params).as_deref(),
            Some("http://x/person/1?include=bio")
        );
    }

    #[test]
    fn test_mapping_without_key_queries_many() {
        let resolver = person_resolver();
        let params = Params::from(json!({"limit": 20, "order": "desc"}));
        assert_eq!(
            resolver.endpoint_for("person", &params).as_deref(),
            Some("http://x/person?limit=20&order=desc")
        );
    }

    #[test]
    fn test_empty_mapping_is_many() {
        let resolver = person_resolver();
        let params = Params::from(json!({}));
        assert_eq!(
            resolver.endpoint_for("person", &params).as_deref(),
            Some("http://x/person")
        );
    }

    #[test]
    fn test_unregistered_type_has_no_endpoint() {
        let resolver = person_resolver();
        assert_eq!(resolver.endpoint_for("pet", &Params::from(1)), None);
    }

    #[test]
    fn test_static_templates() {
        let resolver = EndpointResolver::new();
        resolver.register_endpoints("person", Endpoints::new("foo", "bar"));

        assert_eq!(resolver.endpoint_for("person", &Params::from(1)).as_deref(), Some("foo"));
        assert_eq!(resolver.endpoint_for("person", &Params::None).as_deref(), Some("bar"));
        assert_eq!(
            resolver
                .endpoint_for("person", &Params::from(json!({"id": 1})))
                .as_deref(),
            Some("bar?id=1")
        );
    }

    #[test]
    fn test_key_name_comes_from_template() {
        let resolver = EndpointResolver::new();
        resolver.register_endpoints(
            "person",
            Endpoints::new("http://foo.com/person/:name", "http://foo.com/person"),
        );

        assert_eq!(
            resolver.endpoint_for("person", &Params::from("joe")).as_deref(),
            Some("http://foo.com/person/joe")
        );
        assert_eq!(
            resolver
                .endpoint_for("person", &Params::from(json!({"name": "joe", "id": 3})))
                .as_deref(),
            Some("http://foo.com/person/joe?id=3")
        );
    }

    #[test]
    fn test_only_last_segment_is_substituted() {
        let resolver = EndpointResolver::new();
        resolver.register_endpoints(
            "comment",
            Endpoints::new("http://x/posts/:post_id/comments/:id", "http://x/comments"),
        );

        assert_eq!(
            resolver.endpoint_for("comment", &Params::from(7)).as_deref(),
            Some("http://x/posts/:post_id/comments/7")
        );
    }

    #[test]
    fn test_port_is_not_a_segment() {
        let resolver = EndpointResolver::new();
        resolver.register_endpoints(
            "person",
            Endpoints::new("http://localhost:8080/person", "http://localhost:8080/people"),
        );

        assert_eq!(
            resolver.endpoint_for("person", &Params::from(1)).as_deref(),
            Some("http://localhost:8080/person")
        );
    }

    #[test]
    fn test_reregistering_replaces_templates() {
        let resolver = person_resolver();
        resolver.register_endpoints("person", Endpoints::new("http://y/p/:id", "http://y/p"));
        assert_eq!(
            resolver.endpoint_for("person", &Params::from(2)).as_deref(),
            Some("http://y/p/2")
        );
    }

    #[test]
    fn test_build_url() {
        let empty = Map::new();
        let params = query(json!({"foo": "bar", "baz": 1}));

        assert_eq!(EndpointResolver::build_url("http://foo.com", &empty), "http://foo.com");
        assert_eq!(
            EndpointResolver::build_url("http://foo.com", &params),
            "http://foo.com?foo=bar&baz=1"
        );
        assert_eq!(
            EndpointResolver::build_url("http://foo.com?", &params),
            "http://foo.com?foo=bar&baz=1"
        );
        assert_eq!(
            EndpointResolver::build_url("http://foo.com?api_key=123", &params),
            "http://foo.com?api_key=123&foo=bar&baz=1"
        );
    }

    #[test]
    fn test_build_url_encodes_pairs() {
        let params = query(json!({"q": "a b&c", "tag list": ["x", "y"], "flag": true}));
        assert_eq!(
            EndpointResolver::build_url("http://x/s", &params),
            "http://x/s?q=a%20b%26c&tag%20list=x%2Cy&flag=true"
        );
    }

    #[test]
    fn test_build_url_keeps_mark_characters() {
        let params = query(json!({"q": "it's(1)!*", "path": "a/b?c"}));
        assert_eq!(
            EndpointResolver::build_url("http://x/s", &params),
            "http://x/s?q=it's(1)!*&path=a%2Fb%3Fc"
        );
    }

    #[test]
    fn test_is_success() {
        assert!(EndpointResolver::is_success(200));
        assert!(EndpointResolver::is_success(304));
        assert!(!EndpointResolver::is_success(400));
        assert!(!EndpointResolver::is_success(500));
        assert!(!EndpointResolver::is_success(0));
    }
}
