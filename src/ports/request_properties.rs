use http::Method;

use crate::{core::message::Message, ports::message_producer::ProduceResult};

/// Resolves the HTTP method for a message.
pub trait RequestMethodProvider: Send + Sync {
    fn method(&self, message: &Message) -> ProduceResult<Method>;
}

/// Resolves the `Content-Type` of the request body for a message.
pub trait ContentTypeProvider: Send + Sync {
    fn content_type(&self, message: &Message) -> ProduceResult<String>;
}
