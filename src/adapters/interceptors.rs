//! Request interceptors installed through the client builder chain.
use http::{HeaderMap, HeaderName, HeaderValue, header};

use crate::ports::{
    client_configurator::RequestInterceptor,
    message_producer::{ProduceError, ProduceResult},
};

fn parse_names(names: &[String]) -> ProduceResult<Vec<HeaderName>> {
    names
        .iter()
        .map(|name| {
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ProduceError::Configuration(format!("Invalid header name '{name}': {e}"))
            })
        })
        .collect()
}

/// Strips headers from every outgoing request.
#[derive(Debug, Clone)]
pub struct RemoveHeadersInterceptor {
    names: Vec<HeaderName>,
}

impl RemoveHeadersInterceptor {
    pub fn new(names: &[String]) -> ProduceResult<Self> {
        Ok(Self {
            names: parse_names(names)?,
        })
    }
}

impl RequestInterceptor for RemoveHeadersInterceptor {
    fn intercept(&self, request: &mut reqwest::Request) -> ProduceResult<()> {
        for name in &self.names {
            request.headers_mut().remove(name);
        }
        Ok(())
    }
}

/// Fills in headers the caller did not set.
#[derive(Debug, Clone, Default)]
pub struct DefaultHeadersInterceptor {
    headers: HeaderMap,
}

impl DefaultHeadersInterceptor {
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    /// `User-Agent` and `Accept` defaults.
    pub fn standard() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static(concat!("courier/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
        Self { headers }
    }
}

impl RequestInterceptor for DefaultHeadersInterceptor {
    fn intercept(&self, request: &mut reqwest::Request) -> ProduceResult<()> {
        let headers = request.headers_mut();
        for (name, value) in &self.headers {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
        Ok(())
    }
}

/// Logs every outgoing request, headers at trace level when enabled.
#[derive(Debug, Clone, Default)]
pub struct RequestLoggingInterceptor {
    log_headers: bool,
}

impl RequestLoggingInterceptor {
    pub fn new(log_headers: bool) -> Self {
        Self { log_headers }
    }
}

impl RequestInterceptor for RequestLoggingInterceptor {
    fn intercept(&self, request: &mut reqwest::Request) -> ProduceResult<()> {
        tracing::debug!(
            method = %request.method(),
            url = %request.url(),
            "Sending HTTP request"
        );
        if self.log_headers {
            for (name, value) in request.headers() {
                if value.is_sensitive() {
                    tracing::trace!(header = %name, "Request header <redacted>");
                } else {
                    tracing::trace!(header = %name, value = ?value, "Request header");
                }
            }
        }
        Ok(())
    }
}
