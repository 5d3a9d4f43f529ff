//! Courier - message-oriented HTTP request producer.
//!
//! Courier sends one HTTP request per [`Message`] and maps the response back onto it:
//! the body replaces the payload (or lands in metadata), response headers are copied
//! according to a pluggable strategy and the numeric status is always recorded under
//! [`HTTP_STATUS_KEY`]. When a response carries no body the original payload is kept.
//!
//! # Features
//! - Client configurator chains (proxy, redirects, timeouts, TLS trust, pooling, interceptors)
//! - Per-request authentication scoped to the resolved target, released on every path
//! - Streaming request bodies from in-memory or file-backed payloads
//! - Response classification with an "ignore server response code" switch
//! - Pluggable method, content-type, request header and response header strategies
//! - YAML / JSON / TOML / INI producer definitions with validation
//! - Structured tracing via `tracing`
//!
//! # Quick Example
//! ```no_run
//! use courier::{HttpRequestExecutor, Message, MessageProducer};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let executor = HttpRequestExecutor::builder()
//!     .url("http://localhost:8080/orders/%message{order_id}")
//!     .build();
//! let mut msg = Message::from_bytes("{\"qty\": 1}");
//! msg.add_metadata("order_id", "42");
//! let reply = executor.request(msg, None, None).await?;
//! println!("status {:?}", reply.metadata_value(courier::HTTP_STATUS_KEY));
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations) while keeping
//! the pipeline inside `core`. End users should prefer the re-exports below instead of
//! reaching into internal modules directly.
//!
//! # Error Handling
//! Every produce call returns a [`ProduceError`] on failure. Configuration errors are raised
//! before any network I/O; nothing is retried. The binary and the loader use `eyre`.
//!
//! # Concurrency
//! Executors are `Send + Sync` and may be shared between tasks. Built clients are cached per
//! timeout behind a mutex; credentials armed for a request live in an [`AuthenticatorRegistry`]
//! that is swapped atomically and only consulted through the request's target matcher.
pub mod config;
pub mod ports;
pub mod tracing_setup;

// These modules are implementation details and should not be directly used by users
pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    core::{
        AuthenticatorRegistry, ClientBuilderChain, ExecutorFactory, HTTP_STATUS_KEY,
        HttpRequestExecutor, Message, MessageFactory, Payload,
    },
    ports::{MessageProducer, ProduceError, ProduceResult},
};
