//! Method and content-type resolution strategies.
use http::Method;

use crate::{
    core::message::Message,
    ports::{
        message_producer::{ProduceError, ProduceResult},
        request_properties::{ContentTypeProvider, RequestMethodProvider},
    },
};

pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

pub fn parse_method(name: &str) -> ProduceResult<Method> {
    Method::from_bytes(name.trim().to_ascii_uppercase().as_bytes())
        .map_err(|e| ProduceError::Configuration(format!("Invalid HTTP method '{name}': {e}")))
}

/// Whether a request with this method carries the message payload as body.
pub fn method_allows_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Always the same method.
#[derive(Debug, Clone)]
pub struct ConfiguredMethod {
    method: Method,
}

impl ConfiguredMethod {
    pub fn new(method: Method) -> Self {
        Self { method }
    }

    pub fn parse(name: &str) -> ProduceResult<Self> {
        Ok(Self::new(parse_method(name)?))
    }
}

impl Default for ConfiguredMethod {
    fn default() -> Self {
        Self::new(Method::POST)
    }
}

impl RequestMethodProvider for ConfiguredMethod {
    fn method(&self, _message: &Message) -> ProduceResult<Method> {
        Ok(self.method.clone())
    }
}

/// Reads the method name from a metadata key, falling back to `default`.
#[derive(Debug, Clone)]
pub struct MetadataMethod {
    key: String,
    default: Method,
}

impl MetadataMethod {
    pub fn new(key: impl Into<String>, default: Method) -> Self {
        Self {
            key: key.into(),
            default,
        }
    }
}

impl RequestMethodProvider for MetadataMethod {
    fn method(&self, message: &Message) -> ProduceResult<Method> {
        match message.metadata_value(&self.key) {
            Some(name) if !name.trim().is_empty() => parse_method(name),
            _ => Ok(self.default.clone()),
        }
    }
}

/// Always the same content type.
#[derive(Debug, Clone)]
pub struct ConfiguredContentType {
    mime_type: String,
}

impl ConfiguredContentType {
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
        }
    }
}

impl Default for ConfiguredContentType {
    fn default() -> Self {
        Self::new(DEFAULT_CONTENT_TYPE)
    }
}

impl ContentTypeProvider for ConfiguredContentType {
    fn content_type(&self, message: &Message) -> ProduceResult<String> {
        Ok(with_charset(&self.mime_type, message.content_encoding()))
    }
}

/// Reads the content type from a metadata key, falling back to `default`.
#[derive(Debug, Clone)]
pub struct MetadataContentType {
    key: String,
    default: String,
}

impl MetadataContentType {
    pub fn new(key: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            default: default.into(),
        }
    }
}

impl ContentTypeProvider for MetadataContentType {
    fn content_type(&self, message: &Message) -> ProduceResult<String> {
        let mime_type = message
            .metadata_value(&self.key)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(self.default.as_str());
        Ok(with_charset(mime_type, message.content_encoding()))
    }
}

/// Append the message encoding as a charset unless the type already has one.
fn with_charset(mime_type: &str, encoding: Option<&str>) -> String {
    match encoding {
        Some(charset) if !mime_type.to_ascii_lowercase().contains("charset=") => {
            format!("{mime_type}; charset={charset}")
        }
        _ => mime_type.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_method_parse() {
        let provider = ConfiguredMethod::parse("get").unwrap();
        assert_eq!(provider.method(&Message::new()).unwrap(), Method::GET);
        assert!(ConfiguredMethod::parse("NOT A METHOD").is_err());
    }

    #[test]
    fn test_metadata_method_falls_back() {
        let provider = MetadataMethod::new("httpmethod", Method::POST);
        let mut msg = Message::new();
        assert_eq!(provider.method(&msg).unwrap(), Method::POST);
        msg.add_metadata("httpmethod", "delete");
        assert_eq!(provider.method(&msg).unwrap(), Method::DELETE);
    }

    #[test]
    fn test_method_allows_body() {
        assert!(method_allows_body(&Method::POST));
        assert!(method_allows_body(&Method::PUT));
        assert!(method_allows_body(&Method::PATCH));
        assert!(!method_allows_body(&Method::GET));
        assert!(!method_allows_body(&Method::HEAD));
    }

    #[test]
    fn test_content_type_adds_message_charset() {
        let mut msg = Message::new();
        let provider = ConfiguredContentType::new("application/xml");
        assert_eq!(provider.content_type(&msg).unwrap(), "application/xml");
        msg.set_content_encoding("UTF-8");
        assert_eq!(
            provider.content_type(&msg).unwrap(),
            "application/xml; charset=UTF-8"
        );
        let explicit = ConfiguredContentType::new("text/plain; charset=ISO-8859-1");
        assert_eq!(
            explicit.content_type(&msg).unwrap(),
            "text/plain; charset=ISO-8859-1"
        );
    }

    #[test]
    fn test_metadata_content_type() {
        let provider = MetadataContentType::new("contentType", "text/plain");
        let mut msg = Message::new();
        assert_eq!(provider.content_type(&msg).unwrap(), "text/plain");
        msg.add_metadata("contentType", "application/json");
        assert_eq!(provider.content_type(&msg).unwrap(), "application/json");
    }
}
