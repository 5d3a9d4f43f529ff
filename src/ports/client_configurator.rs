use std::time::Duration;

use crate::{core::client_builder::ClientBuilderState, ports::message_producer::ProduceResult};

/// A single mutation step applied to the client builder state.
///
/// Configurators are composed in order by a `ClientBuilderChain`; each one
/// receives the output of the previous one.
pub trait ClientConfigurator: Send + Sync {
    /// Apply this configurator without a per-call timeout.
    fn configure(&self, state: ClientBuilderState) -> ProduceResult<ClientBuilderState>;

    /// Apply this configurator honouring a per-call timeout.
    ///
    /// `None` means "unspecified" and must behave exactly like
    /// [`ClientConfigurator::configure`]. Configurators that own timeouts
    /// override this.
    fn configure_with_timeout(
        &self,
        state: ClientBuilderState,
        timeout: Option<Duration>,
    ) -> ProduceResult<ClientBuilderState> {
        let _ = timeout;
        self.configure(state)
    }
}

impl<F> ClientConfigurator for F
where
    F: Fn(ClientBuilderState) -> ProduceResult<ClientBuilderState> + Send + Sync,
{
    fn configure(&self, state: ClientBuilderState) -> ProduceResult<ClientBuilderState> {
        self(state)
    }
}

/// Hook run against every outgoing request just before it hits the wire.
pub trait RequestInterceptor: Send + Sync {
    fn intercept(&self, request: &mut reqwest::Request) -> ProduceResult<()>;
}
