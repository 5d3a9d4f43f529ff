//! Classification of HTTP responses into success or failure.
//!
//! On success the body goes to the configured [`EntityConsumer`], the headers
//! to the configured [`ResponseHeaderHandler`], and the numeric status is
//! stamped on the reply under [`HTTP_STATUS_KEY`].
use std::sync::Arc;

use http::{HeaderMap, StatusCode, header};
use tracing::Level;

use crate::{
    core::message::{Message, MessageFactory},
    ports::{
        entity_consumer::EntityConsumer,
        headers::ResponseHeaderHandler,
        message_producer::{ProduceError, ProduceResult},
    },
};

/// Metadata key (string and object metadata) holding the response status code.
pub const HTTP_STATUS_KEY: &str = "httpstatus";

/// Charset used when a response does not declare one.
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// The charset parameter of the response `Content-Type`, as declared.
///
/// `mime` lowercases the charset it parses, so it only validates the header
/// here and the value is taken from the raw parameter list.
pub fn declared_charset(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let mime: mime::Mime = content_type.parse().ok()?;
    mime.get_param(mime::CHARSET)?;
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|charset| !charset.is_empty())
}

/// What a classified response did to the reply.
#[derive(Debug, Clone)]
pub struct ResponseOutcome {
    pub status: StatusCode,
    /// Whether the entity consumer replaced the reply payload.
    pub payload_replaced: bool,
    pub headers: Option<HeaderMap>,
}

#[derive(Clone)]
pub struct ResponseClassifier {
    ignore_server_response_code: bool,
    entity_consumer: Arc<dyn EntityConsumer>,
    header_handler: Arc<dyn ResponseHeaderHandler>,
}

impl ResponseClassifier {
    pub fn new(
        entity_consumer: Arc<dyn EntityConsumer>,
        header_handler: Arc<dyn ResponseHeaderHandler>,
    ) -> Self {
        Self {
            ignore_server_response_code: false,
            entity_consumer,
            header_handler,
        }
    }

    /// Treat statuses above 299 as successes for data extraction.
    pub fn ignore_server_response_code(mut self, ignore: bool) -> Self {
        self.ignore_server_response_code = ignore;
        self
    }

    pub fn is_error(&self, status: StatusCode) -> bool {
        status.as_u16() > 299 && !self.ignore_server_response_code
    }

    /// Classify `response`, filling `reply` on success.
    ///
    /// # Errors
    /// [`ProduceError::Status`] for error statuses that are not ignored. Errors
    /// from the header handler or entity consumer propagate unchanged and leave
    /// `reply` in an unspecified state.
    pub async fn classify(
        &self,
        response: reqwest::Response,
        reply: &mut Message,
        factory: &MessageFactory,
    ) -> ProduceResult<ResponseOutcome> {
        let status = response.status();
        if self.is_error(status) {
            let url = response.url().to_string();
            log_error_body(response).await;
            return Err(ProduceError::Status { url, status });
        }
        if status.as_u16() > 299 {
            tracing::debug!(%status, "Ignoring server response code");
        }

        // Headers first: once the body is consumed nothing else may fail and
        // strand a file-backed payload.
        let headers = response.headers().clone();
        self.header_handler.handle(&headers, reply)?;
        let payload_replaced = self
            .entity_consumer
            .consume(response, reply, factory)
            .await?;
        reply.add_metadata(HTTP_STATUS_KEY, status.as_u16().to_string());
        reply.add_object_metadata(HTTP_STATUS_KEY, status.as_u16());

        Ok(ResponseOutcome {
            status,
            payload_replaced,
            headers: Some(headers),
        })
    }
}

/// Best-effort trace of an error body. Read failures are swallowed.
async fn log_error_body(response: reqwest::Response) {
    if !tracing::enabled!(Level::TRACE) {
        return;
    }
    let status = response.status();
    match response.text_with_charset(DEFAULT_CHARSET).await {
        Ok(body) => tracing::trace!(%status, body = %body, "Error response body"),
        Err(e) => tracing::trace!(%status, error = %e, "Could not read error response body"),
    }
}
