use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use thiserror::Error;

use crate::core::message::Message;

/// Error type for a single produce call.
///
/// Every failure in the request pipeline collapses into one of these variants,
/// carrying the originating cause.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProduceError {
    /// Malformed or missing configuration (credentials, URLs, header names ...).
    /// Raised before any network I/O.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connection, TLS or timeout failure reported by the transport
    #[error("Request to {url} failed: {source}")]
    Transport {
        /// The URL that was requested
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with an error status and it was not ignored
    #[error("Failed to send payload to {url}, got status code [{status}]")]
    Status {
        /// The URL that was requested
        url: String,
        /// The status code returned by the server
        status: StatusCode,
    },

    /// Response body or header handling failed after a successful exchange
    #[error("Failed to process response: {0}")]
    PostProcessing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProduceError {
    /// Whether the error was raised by configuration rather than by I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ProduceError::Configuration(_))
    }

    /// Status code carried by a [`ProduceError::Status`].
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ProduceError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProduceError::Transport { source, .. } if source.is_timeout())
    }
}

/// Result type alias for produce operations
pub type ProduceResult<T> = Result<T, ProduceError>;

/// MessageProducer defines the port for issuing one HTTP exchange per message.
#[async_trait]
pub trait MessageProducer: Send + Sync + 'static {
    /// Send `message` and return it enriched with the response.
    ///
    /// # Arguments
    /// * `message` - The message whose payload becomes the request body
    /// * `target` - Optional URL overriding the configured one
    /// * `timeout` - Per-call timeout; `None` keeps the configured timeouts
    ///
    /// # Returns
    /// The message carrying the response payload (or the original payload when
    /// the response had no body) and the response metadata.
    async fn request(
        &self,
        message: Message,
        target: Option<&str>,
        timeout: Option<Duration>,
    ) -> ProduceResult<Message>;

    /// Fire-and-forget variant of [`MessageProducer::request`].
    async fn produce(&self, message: &Message, target: Option<&str>) -> ProduceResult<()> {
        self.request(message.clone(), target, None).await.map(|_| ())
    }
}
