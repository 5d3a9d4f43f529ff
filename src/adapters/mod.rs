pub mod authenticators;
pub mod client_configurators;
pub mod entity_consumers;
pub mod interceptors;
pub mod request_headers;
pub mod request_properties;
pub mod response_headers;

/// Re-export commonly used types from adapters
pub use authenticators::{
    ConfiguredAuthorizationHeader, ConfiguredUsernamePassword, MetadataAuthorizationHeader,
    MetadataUsernamePassword, NoAuthentication,
};
pub use client_configurators::{
    ConnectionPoolConfigurator, DefaultClientConfigurator, InterceptorConfigurator, ProxyMode,
    RedirectMode, TlsClientConfigurator,
};
pub use entity_consumers::{MetadataEntityConsumer, PayloadEntityConsumer};
