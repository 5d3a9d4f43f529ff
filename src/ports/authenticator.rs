use crate::{
    core::{message::Message, target::RequestTarget, target::ResourceTargetMatcher},
    ports::message_producer::ProduceResult,
};

/// Per-request credential setup.
///
/// `setup` arms an [`AuthenticationContext`] for one request. The context may
/// install credentials into a process-wide registry; it is released through
/// [`AuthenticationContext::close`] once the request finishes, whatever the
/// outcome.
pub trait HttpAuthenticator: Send + Sync {
    /// Resolve the credentials for `target` and arm a context.
    ///
    /// # Arguments
    /// * `target` - The resolved request target
    /// * `message` - The message being sent (credentials may come from metadata)
    /// * `matcher` - Decides which authentication challenges belong to this request
    ///
    /// # Errors
    /// Returns [`crate::ports::message_producer::ProduceError::Configuration`]
    /// when the credential material is missing or malformed.
    fn setup(
        &self,
        target: &RequestTarget,
        message: &Message,
        matcher: ResourceTargetMatcher,
    ) -> ProduceResult<Box<dyn AuthenticationContext>>;
}

/// An armed authentication scope for a single request.
pub trait AuthenticationContext: Send + Sync {
    /// Inject per-request data straight onto the outgoing request.
    fn configure(&self, request: &mut reqwest::Request) -> ProduceResult<()> {
        let _ = request;
        Ok(())
    }

    /// Release anything installed by setup. Must be idempotent.
    fn close(&mut self);
}
