//! Built-in providers of outgoing request headers.
use std::sync::Arc;

use http::{HeaderName, HeaderValue};
use regex::Regex;

use crate::{
    core::message::Message,
    ports::{
        headers::RequestHeaderProvider,
        message_producer::{ProduceError, ProduceResult},
    },
};

fn header_name(name: &str) -> ProduceResult<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| ProduceError::Configuration(format!("Invalid header name '{name}': {e}")))
}

fn header_value(name: &str, value: &str) -> ProduceResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| ProduceError::Configuration(format!("Invalid value for header '{name}': {e}")))
}

/// Adds nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRequestHeaders;

impl RequestHeaderProvider for NoRequestHeaders {
    fn add_headers(&self, _message: &Message, _request: &mut reqwest::Request) -> ProduceResult<()> {
        Ok(())
    }
}

/// Adds a fixed set of headers.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredRequestHeaders {
    headers: Vec<(String, String)>,
}

impl ConfiguredRequestHeaders {
    pub fn new(headers: Vec<(String, String)>) -> Self {
        Self { headers }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

impl RequestHeaderProvider for ConfiguredRequestHeaders {
    fn add_headers(&self, _message: &Message, request: &mut reqwest::Request) -> ProduceResult<()> {
        for (name, value) in &self.headers {
            let value = header_value(name, value)?;
            request.headers_mut().insert(header_name(name)?, value);
        }
        Ok(())
    }
}

/// Sends metadata entries as headers.
///
/// Only keys matching `filter` are sent (all keys when no filter is set).
/// Keys that are not valid header names are skipped.
#[derive(Debug, Clone, Default)]
pub struct MetadataRequestHeaders {
    filter: Option<Regex>,
}

impl MetadataRequestHeaders {
    pub fn new(filter: Option<Regex>) -> Self {
        Self { filter }
    }
}

impl RequestHeaderProvider for MetadataRequestHeaders {
    fn add_headers(&self, message: &Message, request: &mut reqwest::Request) -> ProduceResult<()> {
        for (key, value) in message.metadata() {
            if self.filter.as_ref().is_some_and(|f| !f.is_match(key)) {
                continue;
            }
            let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) else {
                tracing::trace!(key = %key, "Skipping metadata that is not a valid header");
                continue;
            };
            request.headers_mut().insert(name, value);
        }
        Ok(())
    }
}

/// Replays header values stored as object metadata (`Vec<HeaderValue>`)
/// under keys starting with `prefix`; the prefix is stripped from the name.
#[derive(Debug, Clone, Default)]
pub struct ObjectMetadataRequestHeaders {
    prefix: String,
}

impl ObjectMetadataRequestHeaders {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl RequestHeaderProvider for ObjectMetadataRequestHeaders {
    fn add_headers(&self, message: &Message, request: &mut reqwest::Request) -> ProduceResult<()> {
        for key in message.object_metadata_keys() {
            let Some(name) = key.strip_prefix(self.prefix.as_str()) else {
                continue;
            };
            let Some(values) = message.object_metadata::<Vec<HeaderValue>>(key) else {
                continue;
            };
            let name = header_name(name)?;
            for value in values {
                request.headers_mut().append(name.clone(), value.clone());
            }
        }
        Ok(())
    }
}

/// Applies several providers in order; later providers win on conflicts.
#[derive(Clone, Default)]
pub struct CompositeRequestHeaders {
    providers: Vec<Arc<dyn RequestHeaderProvider>>,
}

impl CompositeRequestHeaders {
    pub fn new(providers: Vec<Arc<dyn RequestHeaderProvider>>) -> Self {
        Self { providers }
    }
}

impl RequestHeaderProvider for CompositeRequestHeaders {
    fn add_headers(&self, message: &Message, request: &mut reqwest::Request) -> ProduceResult<()> {
        self.providers
            .iter()
            .try_for_each(|provider| provider.add_headers(message, request))
    }
}
