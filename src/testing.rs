//! Scripted transport for exercising stores without a network.

use crate::adapters::{HttpRequest, HttpResponse, Transport};
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;

enum Scripted {
    Response(HttpResponse),
    NetworkError(String),
}

/// A [`Transport`] that replays queued responses and records every request.
///
/// Queued responses are consumed first; once the queue is empty the fallback
/// set by [`StubTransport::respond_with`] answers every request.
#[derive(Default)]
pub struct StubTransport {
    queue: Mutex<VecDeque<Scripted>>,
    fallback: Mutex<Option<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stub answering every request with `status` and a JSON body.
    pub fn json(status: u16, body: Value) -> Self {
        let stub = Self::new();
        stub.respond_with(HttpResponse::json(status, &body));
        stub
    }

    pub fn respond_with(&self, response: HttpResponse) {
        *self.fallback.lock() = Some(response);
    }

    pub fn enqueue(&self, response: HttpResponse) {
        self.queue.lock().push_back(Scripted::Response(response));
    }

    pub fn enqueue_network_error(&self, message: impl Into<String>) {
        self.queue
            .lock()
            .push_back(Scripted::NetworkError(message.into()));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_url(&self) -> Option<String> {
        self.requests.lock().last().map(|r| r.url.clone())
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().push(request);

        let scripted = self.queue.lock().pop_front();
        match scripted {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::NetworkError(message)) => Err(StoreError::Http(message)),
            None => self
                .fallback
                .lock()
                .clone()
                .ok_or_else(|| StoreError::Http("no stub response scripted".to_string())),
        }
    }
}
