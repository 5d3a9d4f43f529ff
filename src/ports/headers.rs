use http::HeaderMap;

use crate::{core::message::Message, ports::message_producer::ProduceResult};

/// Adds headers derived from the message to the outgoing request.
pub trait RequestHeaderProvider: Send + Sync {
    fn add_headers(&self, message: &Message, request: &mut reqwest::Request) -> ProduceResult<()>;
}

/// Copies (or discards) the response headers onto the reply message.
pub trait ResponseHeaderHandler: Send + Sync {
    fn handle(&self, headers: &HeaderMap, reply: &mut Message) -> ProduceResult<()>;
}
