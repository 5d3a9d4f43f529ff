use async_trait::async_trait;

use crate::{
    core::message::{Message, MessageFactory},
    ports::message_producer::ProduceResult,
};

/// Strategy that decides what happens to a successful response body.
#[async_trait]
pub trait EntityConsumer: Send + Sync {
    /// Consume the body of `response` into `reply`.
    ///
    /// # Returns
    /// `true` when the reply payload was replaced by the response body.
    async fn consume(
        &self,
        response: reqwest::Response,
        reply: &mut Message,
        factory: &MessageFactory,
    ) -> ProduceResult<bool>;
}
