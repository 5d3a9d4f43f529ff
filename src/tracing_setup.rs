use eyre::{Result, WrapErr};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// `RUST_LOG` when set, warnings otherwise.
fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Initialize structured logging with JSON output
pub fn init_tracing() -> Result<()> {
    Registry::default()
        .with(default_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .wrap_err("Failed to install JSON tracing subscriber")?;

    tracing::debug!("Courier structured logging initialized");
    Ok(())
}

/// Initialize console-friendly logging for interactive use
pub fn init_console_tracing() -> Result<()> {
    Registry::default()
        .with(default_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .wrap_err("Failed to install console tracing subscriber")?;

    tracing::debug!("Courier console logging initialized");
    Ok(())
}

/// Initialize tracing with custom configuration
pub fn init_tracing_with_config(level: &str, json_format: bool, include_spans: bool) -> Result<()> {
    let env_filter =
        EnvFilter::try_new(level).wrap_err_with(|| format!("Invalid log level: {level}"))?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    if json_format {
        Registry::default()
            .with(env_filter)
            .with(
                fmt_layer
                    .json()
                    .with_current_span(include_spans)
                    .with_span_list(include_spans),
            )
            .try_init()
            .wrap_err("Failed to install JSON tracing subscriber")?;
    } else {
        Registry::default()
            .with(env_filter)
            .with(fmt_layer.pretty().with_ansi(true))
            .try_init()
            .wrap_err("Failed to install console tracing subscriber")?;
    }

    tracing::debug!(level, json_format, include_spans, "Courier logging initialized");
    Ok(())
}

/// Span wrapping one produce call. `http.status_code` is recorded once the
/// response has been classified.
pub fn create_request_span(method: &str, url: &str, message_id: &str) -> tracing::Span {
    tracing::info_span!(
        "http_request",
        http.method = method,
        http.url = url,
        message.id = message_id,
        http.status_code = tracing::field::Empty,
        duration_ms = tracing::field::Empty,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_with_config_rejects_bad_level() {
        assert!(init_tracing_with_config("courier=verbose", false, false).is_err());
    }

    #[test]
    fn test_create_request_span() {
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::fmt().with_test_writer().finish(),
        );
        let span = create_request_span("GET", "http://localhost/api", "msg-123");
        assert_eq!(span.metadata().map(|m| m.name()), Some("http_request"));
    }
}
