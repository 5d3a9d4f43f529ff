//! Streams a message payload into an outgoing request body.
use http::{HeaderValue, header};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use crate::{
    core::message::{Message, Payload},
    ports::{
        message_producer::{ProduceError, ProduceResult},
        request_properties::ContentTypeProvider,
    },
};

/// Request body backed by a message payload.
///
/// File payloads are never buffered: each [`StreamingRequestEntity::body`] call
/// opens a fresh reader over the file, which also makes the entity repeatable.
/// In-memory payloads are handed to the transport as they are.
/// The content type is resolved once, when the entity is created.
#[derive(Debug, Clone)]
pub struct StreamingRequestEntity {
    payload: Payload,
    content_type: String,
    content_length: u64,
}

impl StreamingRequestEntity {
    pub async fn new(
        message: &Message,
        content_type: &dyn ContentTypeProvider,
    ) -> ProduceResult<Self> {
        let content_type = content_type.content_type(message)?;
        let content_length = message.payload_size().await?;
        Ok(Self {
            payload: message.payload().clone(),
            content_type,
            content_length,
        })
    }

    pub fn is_repeatable(&self) -> bool {
        true
    }

    pub fn is_streaming(&self) -> bool {
        true
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Copy the payload into `output` and flush it.
    ///
    /// The payload reader is owned by this call and dropped on every path.
    pub async fn write_to<W>(&self, output: &mut W) -> std::io::Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut input = self.payload.open().await?;
        let copied = tokio::io::copy(&mut input, output).await?;
        output.flush().await?;
        Ok(copied)
    }

    /// A new transport body over the payload.
    pub async fn body(&self) -> std::io::Result<reqwest::Body> {
        match &self.payload {
            Payload::Bytes(bytes) => Ok(reqwest::Body::from(bytes.clone())),
            Payload::File(_) => {
                let input = self.payload.open().await?;
                Ok(reqwest::Body::wrap_stream(ReaderStream::new(input)))
            }
        }
    }

    /// Set `Content-Type`, `Content-Length` and the body on `request`.
    pub async fn attach(&self, request: &mut reqwest::Request) -> ProduceResult<()> {
        let content_type = HeaderValue::from_str(&self.content_type).map_err(|e| {
            ProduceError::Configuration(format!(
                "Invalid content type '{}': {e}",
                self.content_type
            ))
        })?;
        let headers = request.headers_mut();
        headers.insert(header::CONTENT_TYPE, content_type);
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(self.content_length));
        *request.body_mut() = Some(self.body().await?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::Write,
        pin::Pin,
        sync::atomic::{AtomicUsize, Ordering},
        task::{Context, Poll},
    };

    use http::Method;

    use super::*;

    struct CountingContentType(AtomicUsize);

    impl ContentTypeProvider for CountingContentType {
        fn content_type(&self, _message: &Message) -> ProduceResult<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("text/plain; charset=UTF-8".to_string())
        }
    }

    struct FailingWriter;

    impl AsyncWrite for FailingWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::Error::other("sink closed")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_entity_reports_size_and_type_once() {
        let provider = CountingContentType(AtomicUsize::new(0));
        let msg = Message::from_bytes("hello world");
        let entity = StreamingRequestEntity::new(&msg, &provider).await.unwrap();

        assert!(entity.is_repeatable());
        assert!(entity.is_streaming());
        assert_eq!(entity.content_length(), 11);
        assert_eq!(entity.content_type(), "text/plain; charset=UTF-8");
        let _ = entity.content_type();
        assert_eq!(provider.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_write_to_is_repeatable() {
        let provider = CountingContentType(AtomicUsize::new(0));
        let msg = Message::from_bytes("payload");
        let entity = StreamingRequestEntity::new(&msg, &provider).await.unwrap();

        for _ in 0..2 {
            let mut out = Vec::new();
            assert_eq!(entity.write_to(&mut out).await.unwrap(), 7);
            assert_eq!(out, b"payload");
        }
    }

    #[tokio::test]
    async fn test_write_to_streams_file_payload() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![b'x'; 64 * 1024]).unwrap();
        let msg = Message::from_file(file.path());

        let provider = CountingContentType(AtomicUsize::new(0));
        let entity = StreamingRequestEntity::new(&msg, &provider).await.unwrap();
        assert_eq!(entity.content_length(), 64 * 1024);

        let mut out = Vec::new();
        entity.write_to(&mut out).await.unwrap();
        assert_eq!(out.len(), 64 * 1024);
    }

    #[tokio::test]
    async fn test_write_to_propagates_copy_failure() {
        let provider = CountingContentType(AtomicUsize::new(0));
        let entity = StreamingRequestEntity::new(&Message::from_bytes("data"), &provider)
            .await
            .unwrap();
        let err = entity.write_to(&mut FailingWriter).await.unwrap_err();
        assert_eq!(err.to_string(), "sink closed");
    }

    #[tokio::test]
    async fn test_attach_sets_headers_and_body() {
        let provider = CountingContentType(AtomicUsize::new(0));
        let entity = StreamingRequestEntity::new(&Message::from_bytes("abc"), &provider)
            .await
            .unwrap();
        let mut request =
            reqwest::Request::new(Method::POST, "http://localhost/".parse().unwrap());
        entity.attach(&mut request).await.unwrap();

        assert_eq!(request.headers()[header::CONTENT_LENGTH], "3");
        assert_eq!(
            request.headers()[header::CONTENT_TYPE],
            "text/plain; charset=UTF-8"
        );
        let body = request.body().unwrap();
        assert_eq!(body.as_bytes(), Some(&b"abc"[..]));
        assert!(request.try_clone().is_some());
    }

    #[tokio::test]
    async fn test_file_body_is_streamed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"on disk").unwrap();
        let provider = CountingContentType(AtomicUsize::new(0));
        let entity = StreamingRequestEntity::new(&Message::from_file(file.path()), &provider)
            .await
            .unwrap();

        let body = entity.body().await.unwrap();
        assert!(body.as_bytes().is_none());
        assert_eq!(entity.content_length(), 7);
    }

    #[tokio::test]
    async fn test_missing_file_payload_fails() {
        let provider = CountingContentType(AtomicUsize::new(0));
        let msg = Message::from_file("/definitely/not/here.payload");
        let err = StreamingRequestEntity::new(&msg, &provider).await.unwrap_err();
        assert!(matches!(err, ProduceError::Io(_)));
    }
}
