//! Built-in client configurators.
use std::{fs::File, io::BufReader, path::PathBuf, sync::Arc, time::Duration};

use rustls_native_certs::load_native_certs;

use crate::{
    adapters::authenticators::decode_password,
    core::client_builder::ClientBuilderState,
    ports::{
        client_configurator::{ClientConfigurator, RequestInterceptor},
        message_producer::{ProduceError, ProduceResult},
    },
};

/// How the client reaches the network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProxyMode {
    /// Honour the environment / system proxy settings.
    #[default]
    System,
    /// Never use a proxy.
    Direct,
    Custom {
        url: String,
        username: Option<String>,
        password: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RedirectMode {
    /// Follow redirects with the transport default limit.
    #[default]
    Follow,
    None,
    Limited(usize),
}

/// Proxy, redirect, timeout and user-agent settings.
///
/// The default value reproduces the transport defaults: system proxy,
/// redirects followed, no timeouts. A per-call timeout overrides both the
/// connect and read timeouts configured here.
#[derive(Debug, Clone, Default)]
pub struct DefaultClientConfigurator {
    pub proxy: ProxyMode,
    pub redirects: RedirectMode,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub user_agent: Option<String>,
}

impl DefaultClientConfigurator {
    fn apply(
        &self,
        state: ClientBuilderState,
        connect_timeout: Option<Duration>,
        read_timeout: Option<Duration>,
    ) -> ProduceResult<ClientBuilderState> {
        let proxy = match &self.proxy {
            ProxyMode::Custom {
                url,
                username,
                password,
            } => {
                let mut proxy = reqwest::Proxy::all(url).map_err(|e| {
                    ProduceError::Configuration(format!("Invalid proxy URL '{url}': {e}"))
                })?;
                if let Some(username) = username {
                    let password = decode_password(password.as_deref().unwrap_or_default())?;
                    proxy = proxy.basic_auth(username, &password);
                }
                Some(proxy)
            }
            _ => None,
        };
        let redirect = match self.redirects {
            RedirectMode::Follow => reqwest::redirect::Policy::default(),
            RedirectMode::None => reqwest::redirect::Policy::none(),
            RedirectMode::Limited(max) => reqwest::redirect::Policy::limited(max),
        };

        Ok(state.map_builder(|mut builder| {
            builder = builder.redirect(redirect);
            match (&self.proxy, proxy) {
                (ProxyMode::Direct, _) => builder = builder.no_proxy(),
                (_, Some(proxy)) => builder = builder.proxy(proxy),
                _ => {}
            }
            if let Some(timeout) = connect_timeout {
                builder = builder.connect_timeout(timeout);
            }
            if let Some(timeout) = read_timeout {
                builder = builder.read_timeout(timeout);
            }
            if let Some(user_agent) = &self.user_agent {
                builder = builder.user_agent(user_agent.clone());
            }
            builder
        }))
    }
}

impl ClientConfigurator for DefaultClientConfigurator {
    fn configure(&self, state: ClientBuilderState) -> ProduceResult<ClientBuilderState> {
        self.apply(state, self.connect_timeout, self.read_timeout)
    }

    fn configure_with_timeout(
        &self,
        state: ClientBuilderState,
        timeout: Option<Duration>,
    ) -> ProduceResult<ClientBuilderState> {
        match timeout {
            Some(timeout) => self.apply(state, Some(timeout), Some(timeout)),
            None => self.configure(state),
        }
    }
}

/// Trust configuration for HTTPS.
#[derive(Debug, Clone)]
pub struct TlsClientConfigurator {
    pub native_roots: bool,
    /// Extra PEM encoded CA certificates to trust.
    pub ca_bundle: Option<PathBuf>,
}

impl Default for TlsClientConfigurator {
    fn default() -> Self {
        Self {
            native_roots: true,
            ca_bundle: None,
        }
    }
}

impl TlsClientConfigurator {
    fn root_store(&self) -> ProduceResult<rustls::RootCertStore> {
        let mut root_cert_store = rustls::RootCertStore::empty();

        if self.native_roots {
            let native_certs = load_native_certs();
            for cert in native_certs.certs {
                if root_cert_store.add(cert).is_err() {
                    tracing::warn!("Failed to add native certificate to rustls RootCertStore");
                }
            }
            if !native_certs.errors.is_empty() {
                tracing::warn!(
                    "Some native certificates failed to load: {:?}",
                    native_certs.errors
                );
            }
            tracing::debug!("Loaded {} native root certificates.", root_cert_store.len());
        }

        if let Some(path) = &self.ca_bundle {
            let file = File::open(path).map_err(|e| {
                ProduceError::Configuration(format!("Cannot open CA bundle {}: {e}", path.display()))
            })?;
            for cert in rustls_pemfile::certs(&mut BufReader::new(file)) {
                let cert = cert.map_err(|e| {
                    ProduceError::Configuration(format!(
                        "Malformed certificate in {}: {e}",
                        path.display()
                    ))
                })?;
                root_cert_store.add(cert).map_err(|e| {
                    ProduceError::Configuration(format!(
                        "Rejected certificate in {}: {e}",
                        path.display()
                    ))
                })?;
            }
        }

        if root_cert_store.is_empty() {
            return Err(ProduceError::Configuration(
                "TLS configuration has no trusted root certificates".to_string(),
            ));
        }
        Ok(root_cert_store)
    }
}

impl ClientConfigurator for TlsClientConfigurator {
    fn configure(&self, state: ClientBuilderState) -> ProduceResult<ClientBuilderState> {
        // Install default crypto provider for rustls if not already set
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(self.root_store()?)
            .with_no_client_auth();
        tls_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

        Ok(state.map_builder(|builder| builder.use_preconfigured_tls(tls_config)))
    }
}

/// Connection reuse settings.
#[derive(Debug, Clone, Default)]
pub struct ConnectionPoolConfigurator {
    pub max_idle_per_host: Option<usize>,
    pub idle_timeout: Option<Duration>,
    pub tcp_keepalive: Option<Duration>,
}

impl ClientConfigurator for ConnectionPoolConfigurator {
    fn configure(&self, state: ClientBuilderState) -> ProduceResult<ClientBuilderState> {
        Ok(state.map_builder(|mut builder| {
            if let Some(max) = self.max_idle_per_host {
                builder = builder.pool_max_idle_per_host(max);
            }
            if let Some(timeout) = self.idle_timeout {
                builder = builder.pool_idle_timeout(timeout);
            }
            if let Some(keepalive) = self.tcp_keepalive {
                builder = builder.tcp_keepalive(keepalive);
            }
            builder
        }))
    }
}

/// Adds request interceptors to the client.
#[derive(Clone, Default)]
pub struct InterceptorConfigurator {
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
}

impl InterceptorConfigurator {
    pub fn new(interceptors: Vec<Arc<dyn RequestInterceptor>>) -> Self {
        Self { interceptors }
    }
}

impl ClientConfigurator for InterceptorConfigurator {
    fn configure(&self, state: ClientBuilderState) -> ProduceResult<ClientBuilderState> {
        Ok(self
            .interceptors
            .iter()
            .fold(state, |state, interceptor| state.with_interceptor(interceptor.clone())))
    }
}
