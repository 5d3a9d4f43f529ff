use std::{path::Path, time::Duration};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use courier::{
    ExecutorFactory, HTTP_STATUS_KEY, Message, MessageProducer, Payload,
    config::{ProducerConfigValidator, loader::load_config, parse_duration},
    tracing_setup,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Commands,

    /// Log level filter (e.g. "info", "courier=debug"); defaults to RUST_LOG or "warn"
    #[clap(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[clap(long, global = true)]
    json_logs: bool,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Send one message using a producer definition
    Send {
        /// Producer definition to use
        #[clap(short, long, default_value = "courier.yaml")]
        config: String,
        /// Override the configured URL
        #[clap(long)]
        url: Option<String>,
        /// Read the payload from a file (streamed, never buffered)
        #[clap(long, conflicts_with = "payload")]
        payload_file: Option<String>,
        /// Inline payload
        #[clap(long)]
        payload: Option<String>,
        /// Message metadata as key=value, repeatable
        #[clap(short, long = "metadata", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,
        /// Per-call timeout, e.g. "5s"
        #[clap(long)]
        timeout: Option<String>,
    },
    /// Validate a producer definition
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "courier.yaml")]
        config: String,
    },
    /// Initialize a new producer definition
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "courier.yaml")]
        config: String,
    },
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    match (args.log_level.as_deref(), args.json_logs) {
        (Some(level), json) => tracing_setup::init_tracing_with_config(level, json, true),
        (None, true) => tracing_setup::init_tracing(),
        (None, false) => tracing_setup::init_console_tracing(),
    }
    .map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;

    match args.command {
        Commands::Send {
            config,
            url,
            payload_file,
            payload,
            metadata,
            timeout,
        } => {
            send_command(
                &config,
                url.as_deref(),
                payload_file,
                payload,
                metadata,
                timeout.as_deref(),
            )
            .await
        }
        Commands::Validate { config } => validate_config_command(&config).await,
        Commands::Init { config } => init_config_command(&config).await,
    }
}

async fn send_command(
    config_path: &str,
    url: Option<&str>,
    payload_file: Option<String>,
    payload: Option<String>,
    metadata: Vec<(String, String)>,
    timeout: Option<&str>,
) -> Result<()> {
    let config = load_config(config_path)
        .await
        .with_context(|| format!("Failed to load producer definition from {config_path}"))?;
    ProducerConfigValidator::validate(&config).context("Invalid producer definition")?;

    let executor = ExecutorFactory::new()
        .build(&config)
        .context("Failed to build HTTP request executor")?;

    // Without --timeout the executor falls back to the configured one.
    let timeout: Option<Duration> = timeout
        .map(|raw| parse_duration(raw).with_context(|| format!("Invalid timeout '{raw}'")))
        .transpose()?;

    let mut message = match (payload_file, payload) {
        (Some(path), _) => Message::from_file(path),
        (None, Some(text)) => Message::from_bytes(text),
        (None, None) => Message::new(),
    };
    for (key, value) in metadata {
        message.add_metadata(key, value);
    }

    let reply = executor
        .request(message, url, timeout)
        .await
        .context("Request failed")?;
    executor.shutdown();

    println!(
        "Status: {}",
        reply.metadata_value(HTTP_STATUS_KEY).unwrap_or("unknown")
    );
    let mut keys: Vec<_> = reply.metadata().keys().collect();
    keys.sort();
    for key in keys {
        if key != HTTP_STATUS_KEY {
            println!("  {key}: {}", reply.metadata()[key]);
        }
    }
    match reply.payload() {
        Payload::File(path) => println!("Payload written to {}", path.display()),
        Payload::Bytes(_) => {
            let body = reply.payload_bytes().await?;
            println!();
            println!("{}", String::from_utf8_lossy(&body));
        }
    }
    Ok(())
}

/// Validate a producer definition
async fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating producer definition: {config_path}");

    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let config = match load_config(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e}");
            std::process::exit(1);
        }
    };

    match ProducerConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • URL: {}", config.url.as_deref().unwrap_or("<none>"));
            println!("   • Method: {:?}", config.method);
            println!("   • Client configurators: {}", config.client.len());
            println!(
                "   • Ignore server response code: {}",
                config.ignore_server_response_code
            );
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Ensure all URLs start with http:// or https://");
            println!("   • Check that CA bundle paths exist");
            println!("   • Ensure timeouts use valid units (ms, s, m)");
            std::process::exit(1);
        }
    }
}

/// Initialize a new producer definition
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# Courier producer definition

# Target URL; %message{key} is replaced by message metadata
url: "http://localhost:8080/orders/%message{order_id}"

method:
  type: configured
  method: POST

content_type:
  type: configured
  mime_type: "application/json"

# Copy response headers into metadata
response_headers:
  - type: metadata
    prefix: "http_"

# Uncomment to answer Basic challenges
# authentication:
#   type: username_password
#   username: admin
#   password: "b64:c2VjcmV0"

# Client builder chain, applied in order
client:
  - type: default
    proxy:
      mode: system
    connect_timeout: "5s"
    read_timeout: "30s"
  - type: connection_pool
    max_idle_per_host: 8
    idle_timeout: "90s"

ignore_server_response_code: false
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default producer definition at: {config_path}");
    println!("   Run 'courier send --config {config_path} --metadata order_id=1' to send a message");
    Ok(())
}
