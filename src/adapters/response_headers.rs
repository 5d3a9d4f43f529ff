//! Built-in handlers for response headers.
use std::sync::Arc;

use http::{HeaderMap, HeaderValue};

use crate::{
    core::message::Message,
    ports::{headers::ResponseHeaderHandler, message_producer::ProduceResult},
};

fn prefixed(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}{name}"),
        None => name.to_string(),
    }
}

/// Drops every response header.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardResponseHeaders;

impl ResponseHeaderHandler for DiscardResponseHeaders {
    fn handle(&self, _headers: &HeaderMap, _reply: &mut Message) -> ProduceResult<()> {
        Ok(())
    }
}

/// Copies every response header into string metadata, optionally prefixed.
///
/// Repeated headers are joined with `", "`.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeadersAsMetadata {
    prefix: Option<String>,
}

impl ResponseHeadersAsMetadata {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }
}

impl ResponseHeaderHandler for ResponseHeadersAsMetadata {
    fn handle(&self, headers: &HeaderMap, reply: &mut Message) -> ProduceResult<()> {
        for name in headers.keys() {
            let value = headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(", ");
            let key = prefixed(self.prefix.as_deref(), name.as_str());
            tracing::trace!(key = %key, value = %value, "Response header as metadata");
            reply.add_metadata(key, value);
        }
        Ok(())
    }
}

/// Copies every response header into object metadata as `Vec<HeaderValue>`.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeadersAsObjectMetadata {
    prefix: Option<String>,
}

impl ResponseHeadersAsObjectMetadata {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }
}

impl ResponseHeaderHandler for ResponseHeadersAsObjectMetadata {
    fn handle(&self, headers: &HeaderMap, reply: &mut Message) -> ProduceResult<()> {
        for name in headers.keys() {
            let values: Vec<HeaderValue> = headers.get_all(name).iter().cloned().collect();
            reply.add_object_metadata(prefixed(self.prefix.as_deref(), name.as_str()), values);
        }
        Ok(())
    }
}

/// Applies several handlers in order.
#[derive(Clone, Default)]
pub struct CompositeResponseHeaders {
    handlers: Vec<Arc<dyn ResponseHeaderHandler>>,
}

impl CompositeResponseHeaders {
    pub fn new(handlers: Vec<Arc<dyn ResponseHeaderHandler>>) -> Self {
        Self { handlers }
    }
}

impl ResponseHeaderHandler for CompositeResponseHeaders {
    fn handle(&self, headers: &HeaderMap, reply: &mut Message) -> ProduceResult<()> {
        self.handlers
            .iter()
            .try_for_each(|handler| handler.handle(headers, reply))
    }
}
