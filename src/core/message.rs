//! The unit of work flowing through a single request/response cycle.
//!
//! A [`Message`] carries a repeatable payload (in memory or backed by a file),
//! string metadata and a side channel of typed "object" metadata for values that
//! are not strings (raw header values, numeric status codes ...).
use std::{
    any::Any,
    collections::HashMap,
    fmt,
    io::Cursor,
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::{Bytes, BytesMut};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::ports::message_producer::{ProduceError, ProduceResult};

static METADATA_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%message\{([^}]+)\}").expect("invalid metadata token regex"));

/// A freshly opened, owned reader over a message payload.
pub type PayloadReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Typed value stored in object metadata.
pub type ObjectValue = Arc<dyn Any + Send + Sync>;

/// Where the bytes of a message live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Bytes(Bytes),
    File(PathBuf),
}

impl Payload {
    pub async fn size(&self) -> std::io::Result<u64> {
        match self {
            Payload::Bytes(bytes) => Ok(bytes.len() as u64),
            Payload::File(path) => Ok(tokio::fs::metadata(path).await?.len()),
        }
    }

    /// Open a new reader positioned at the start of the payload.
    ///
    /// Every call returns an independent reader, so the payload can be read
    /// more than once.
    pub async fn open(&self) -> std::io::Result<PayloadReader> {
        match self {
            Payload::Bytes(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            Payload::File(path) => Ok(Box::new(tokio::fs::File::open(path).await?)),
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Bytes(Bytes::new())
    }
}

#[derive(Clone)]
pub struct Message {
    id: String,
    payload: Payload,
    content_encoding: Option<String>,
    metadata: HashMap<String, String>,
    object_metadata: HashMap<String, ObjectValue>,
}

impl Message {
    /// Create an empty in-memory message with a random unique id.
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            payload: Payload::default(),
            content_encoding: None,
            metadata: HashMap::new(),
            object_metadata: HashMap::new(),
        }
    }

    pub fn from_bytes(payload: impl Into<Bytes>) -> Self {
        let mut msg = Self::new();
        msg.payload = Payload::Bytes(payload.into());
        msg
    }

    /// Create a message whose payload is read from `path` on demand.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let mut msg = Self::new();
        msg.payload = Payload::File(path.into());
        msg
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn set_payload(&mut self, payload: Payload) {
        self.payload = payload;
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.content_encoding.as_deref()
    }

    pub fn set_content_encoding(&mut self, encoding: impl Into<String>) {
        self.content_encoding = Some(encoding.into());
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn has_metadata(&self, key: &str) -> bool {
        self.metadata.contains_key(key)
    }

    /// Add (or overwrite) a metadata entry. Last write wins.
    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn remove_metadata(&mut self, key: &str) -> Option<String> {
        self.metadata.remove(key)
    }

    pub fn add_object_metadata<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.object_metadata.insert(key.into(), Arc::new(value));
    }

    /// Typed lookup into object metadata; `None` when missing or of another type.
    pub fn object_metadata<T: Any>(&self, key: &str) -> Option<&T> {
        self.object_metadata
            .get(key)
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn object_metadata_keys(&self) -> impl Iterator<Item = &str> {
        self.object_metadata.keys().map(String::as_str)
    }

    /// Size of the payload in bytes.
    pub async fn payload_size(&self) -> std::io::Result<u64> {
        self.payload.size().await
    }

    pub async fn open_payload(&self) -> std::io::Result<PayloadReader> {
        self.payload.open().await
    }

    /// Materialize the whole payload. Intended for small payloads.
    pub async fn payload_bytes(&self) -> std::io::Result<Bytes> {
        match &self.payload {
            Payload::Bytes(bytes) => Ok(bytes.clone()),
            Payload::File(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
        }
    }

    /// Replace every `%message{key}` token in `template` with the metadata value.
    pub fn resolve(&self, template: &str) -> ProduceResult<String> {
        let mut missing = None;
        let resolved = METADATA_TOKEN.replace_all(template, |caps: &regex::Captures<'_>| {
            let key = &caps[1];
            match self.metadata_value(key) {
                Some(value) => value.to_string(),
                None => {
                    missing.get_or_insert_with(|| key.to_string());
                    String::new()
                }
            }
        });
        match missing {
            Some(key) => Err(ProduceError::Configuration(format!(
                "metadata key '{key}' referenced by '{template}' is not present"
            ))),
            None => Ok(resolved.into_owned()),
        }
    }

    /// Fold a reply into this message: payload and encoding are taken from the
    /// reply, metadata from both with the reply winning on conflicts.
    pub fn merge_reply(&mut self, reply: Message) {
        self.payload = reply.payload;
        if reply.content_encoding.is_some() {
            self.content_encoding = reply.content_encoding;
        }
        self.metadata.extend(reply.metadata);
        self.object_metadata.extend(reply.object_metadata);
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut object_keys: Vec<_> = self.object_metadata.keys().collect();
        object_keys.sort();
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("payload", &self.payload)
            .field("content_encoding", &self.content_encoding)
            .field("metadata", &self.metadata)
            .field("object_metadata", &object_keys)
            .finish()
    }
}

/// Creates reply messages and the writers that fill their payloads.
#[derive(Debug, Clone, Default)]
pub enum MessageFactory {
    #[default]
    InMemory,
    /// Payloads written by the factory are streamed into files under `directory`.
    FileBacked { directory: PathBuf },
}

impl MessageFactory {
    pub fn new_message(&self) -> Message {
        Message::new()
    }

    pub async fn payload_writer(&self) -> std::io::Result<PayloadWriter> {
        match self {
            MessageFactory::InMemory => Ok(PayloadWriter::Memory(BytesMut::new())),
            MessageFactory::FileBacked { directory } => {
                let directory = directory.clone();
                let temp = tokio::task::spawn_blocking(move || {
                    tempfile::Builder::new()
                        .suffix(".payload")
                        .tempfile_in(directory)
                })
                .await
                .map_err(std::io::Error::other)??;
                let (file, path) = temp.into_parts();
                Ok(PayloadWriter::File {
                    path,
                    file: tokio::fs::File::from_std(file),
                })
            }
        }
    }
}

/// Incremental sink for a payload, finished into a [`Payload`].
///
/// A file-backed writer that is dropped before [`PayloadWriter::finish`]
/// deletes its file.
pub enum PayloadWriter {
    Memory(BytesMut),
    File {
        path: tempfile::TempPath,
        file: tokio::fs::File,
    },
}

impl PayloadWriter {
    pub async fn write(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        match self {
            PayloadWriter::Memory(buf) => {
                buf.extend_from_slice(chunk);
                Ok(())
            }
            PayloadWriter::File { file, .. } => file.write_all(chunk).await,
        }
    }

    pub async fn finish(self) -> std::io::Result<Payload> {
        match self {
            PayloadWriter::Memory(buf) => Ok(Payload::Bytes(buf.freeze())),
            PayloadWriter::File { path, mut file } => {
                file.flush().await?;
                drop(file);
                let path = path.keep().map_err(|e| e.error)?;
                Ok(Payload::File(path))
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            PayloadWriter::Memory(_) => None,
            PayloadWriter::File { path, .. } => Some(&**path),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    #[test]
    fn test_metadata_last_write_wins() {
        let mut msg = Message::new();
        msg.add_metadata("key", "one");
        msg.add_metadata("key", "two");
        assert_eq!(msg.metadata_value("key"), Some("two"));
        assert_eq!(msg.metadata().len(), 1);
    }

    #[test]
    fn test_object_metadata_is_typed() {
        let mut msg = Message::new();
        msg.add_object_metadata("status", 200u16);
        assert_eq!(msg.object_metadata::<u16>("status"), Some(&200));
        assert!(msg.object_metadata::<String>("status").is_none());
        assert!(msg.object_metadata::<u16>("missing").is_none());
    }

    #[test]
    fn test_resolve_metadata_tokens() {
        let mut msg = Message::new();
        msg.add_metadata("host", "example.com");
        msg.add_metadata("id", "42");

        let url = msg.resolve("http://%message{host}/items/%message{id}").unwrap();
        assert_eq!(url, "http://example.com/items/42");
        assert_eq!(msg.resolve("http://plain/").unwrap(), "http://plain/");
    }

    #[test]
    fn test_resolve_missing_key_is_configuration_error() {
        let msg = Message::new();
        let err = msg.resolve("http://%message{nope}/").unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_payload_can_be_opened_twice() {
        let msg = Message::from_bytes("hello");
        for _ in 0..2 {
            let mut reader = msg.open_payload().await.unwrap();
            let mut out = String::new();
            reader.read_to_string(&mut out).await.unwrap();
            assert_eq!(out, "hello");
        }
        assert_eq!(msg.payload_size().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_file_backed_writer_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let factory = MessageFactory::FileBacked {
            directory: dir.path().to_path_buf(),
        };
        let mut writer = factory.payload_writer().await.unwrap();
        assert!(writer.path().is_some());
        writer.write(b"abc").await.unwrap();
        writer.write(b"def").await.unwrap();

        let mut msg = factory.new_message();
        msg.set_payload(writer.finish().await.unwrap());
        assert_eq!(msg.payload_bytes().await.unwrap(), Bytes::from("abcdef"));
        assert_eq!(msg.payload_size().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_unfinished_file_writer_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let factory = MessageFactory::FileBacked {
            directory: dir.path().to_path_buf(),
        };
        let mut writer = factory.payload_writer().await.unwrap();
        writer.write(b"partial").await.unwrap();
        let path = writer.path().unwrap().to_path_buf();
        assert!(path.exists());

        drop(writer);
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_merge_reply_prefers_reply_values() {
        let mut msg = Message::from_bytes("request");
        msg.add_metadata("a", "original");
        msg.add_metadata("b", "kept");

        let mut reply = Message::from_bytes("reply");
        reply.add_metadata("a", "replaced");
        reply.set_content_encoding("UTF-8");

        msg.merge_reply(reply);
        assert_eq!(msg.payload(), &Payload::Bytes(Bytes::from("reply")));
        assert_eq!(msg.metadata_value("a"), Some("replaced"));
        assert_eq!(msg.metadata_value("b"), Some("kept"));
        assert_eq!(msg.content_encoding(), Some("UTF-8"));
    }
}
