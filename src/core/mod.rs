pub mod auth;
pub mod challenge;
pub mod client_builder;
pub mod entity;
pub mod executor;
pub mod factory;
pub mod message;
pub mod response;
pub mod target;

pub use auth::{AuthenticationScope, AuthenticatorRegistry, Credentials};
pub use client_builder::{ClientBuilderChain, ClientBuilderState, ClientCache, ConfiguredClient};
pub use executor::{HttpRequestExecutor, HttpRequestExecutorBuilder};
pub use factory::ExecutorFactory;
pub use message::{Message, MessageFactory, Payload};
pub use response::{HTTP_STATUS_KEY, ResponseClassifier, ResponseOutcome};
pub use target::{Challenge, RequestTarget, ResourceTargetMatcher};
