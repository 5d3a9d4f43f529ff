//! Built-in strategies for successful response bodies.
use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    core::{
        message::{Message, MessageFactory},
        response::{DEFAULT_CHARSET, declared_charset},
    },
    ports::{
        entity_consumer::EntityConsumer,
        message_producer::{ProduceError, ProduceResult},
    },
};

async fn next_chunk(response: &mut reqwest::Response) -> ProduceResult<Option<Bytes>> {
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) if chunk.is_empty() => continue,
            Ok(chunk) => return Ok(chunk),
            Err(e) => {
                return Err(ProduceError::PostProcessing(format!(
                    "Failed to read response body: {e}"
                )));
            }
        }
    }
}

/// Streams the response body into the reply payload.
///
/// The reply's content encoding is taken from the response charset when one
/// is declared. An empty body leaves the payload alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadEntityConsumer;

#[async_trait]
impl EntityConsumer for PayloadEntityConsumer {
    async fn consume(
        &self,
        mut response: reqwest::Response,
        reply: &mut Message,
        factory: &MessageFactory,
    ) -> ProduceResult<bool> {
        let charset = declared_charset(response.headers());
        let Some(first) = next_chunk(&mut response).await? else {
            return Ok(false);
        };

        let mut writer = factory.payload_writer().await?;
        let mut written = first.len();
        writer.write(&first).await?;
        while let Some(chunk) = next_chunk(&mut response).await? {
            written += chunk.len();
            writer.write(&chunk).await?;
        }
        reply.set_payload(writer.finish().await?);
        if let Some(charset) = charset {
            reply.set_content_encoding(charset);
        }
        tracing::debug!(bytes = written, "Response body written to payload");
        Ok(true)
    }
}

/// Decodes the whole response body into a metadata entry.
#[derive(Debug, Clone)]
pub struct MetadataEntityConsumer {
    key: String,
}

impl MetadataEntityConsumer {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl EntityConsumer for MetadataEntityConsumer {
    async fn consume(
        &self,
        response: reqwest::Response,
        reply: &mut Message,
        _factory: &MessageFactory,
    ) -> ProduceResult<bool> {
        let body = response
            .text_with_charset(DEFAULT_CHARSET)
            .await
            .map_err(|e| ProduceError::PostProcessing(format!("Failed to read response body: {e}")))?;
        if !body.is_empty() {
            reply.add_metadata(self.key.clone(), body);
        }
        Ok(false)
    }
}
