pub mod authenticator;
pub mod client_configurator;
pub mod entity_consumer;
pub mod headers;
pub mod message_producer;
pub mod request_properties;

pub use authenticator::{AuthenticationContext, HttpAuthenticator};
pub use client_configurator::{ClientConfigurator, RequestInterceptor};
pub use entity_consumer::EntityConsumer;
pub use headers::{RequestHeaderProvider, ResponseHeaderHandler};
pub use message_producer::{MessageProducer, ProduceError, ProduceResult};
pub use request_properties::{ContentTypeProvider, RequestMethodProvider};
