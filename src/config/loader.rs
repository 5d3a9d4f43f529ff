use std::path::Path;

use config::{Config, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::ProducerConfig;

/// Load a producer definition from a file using the config crate
/// Supports multiple formats: YAML, JSON, TOML, INI
pub async fn load_config(config_path: &str) -> Result<ProducerConfig> {
    load_config_sync(config_path)
}

/// Load a producer definition synchronously
pub fn load_config_sync(config_path: &str) -> Result<ProducerConfig> {
    let config_path = Path::new(config_path);

    // Determine file format based on extension
    let format = match config_path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        Some("toml") => FileFormat::Toml,
        Some("ini") => FileFormat::Ini,
        _ => FileFormat::Yaml, // Default to YAML
    };

    let settings = Config::builder()
        .add_source(File::new(
            config_path
                .to_str()
                .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", config_path.display()))?,
            format,
        ))
        .build()
        .with_context(|| format!("Failed to build config from {}", config_path.display()))?;

    let producer_config: ProducerConfig = settings.try_deserialize().with_context(|| {
        format!(
            "Failed to deserialize config from {}",
            config_path.display()
        )
    })?;

    tracing::debug!(path = %config_path.display(), "Loaded producer configuration");
    Ok(producer_config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::config::models::{AuthenticationConfig, ClientConfiguratorConfig, ResponseHeadersConfig};

    #[tokio::test]
    async fn test_load_yaml_config() {
        let yaml_content = r#"
url: "http://localhost:8080/orders"
method:
  type: configured
  method: PUT
authentication:
  type: username_password
  username: admin
  password: "b64:c2VjcmV0"
response_headers:
  - type: metadata
    prefix: "resp_"
client:
  - type: default
    connect_timeout: "5s"
    proxy:
      mode: direct
  - type: tls
    native_roots: true
ignore_server_response_code: true
"#;

        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        write!(temp_file, "{}", yaml_content).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(config.url.as_deref(), Some("http://localhost:8080/orders"));
        assert!(config.ignore_server_response_code);
        assert!(matches!(
            config.authentication,
            AuthenticationConfig::UsernamePassword { .. }
        ));
        assert_eq!(config.response_headers.len(), 1);
        assert!(matches!(
            config.response_headers[0],
            ResponseHeadersConfig::Metadata { .. }
        ));
        assert!(matches!(config.client[1], ClientConfiguratorConfig::Tls { .. }));
    }

    #[tokio::test]
    async fn test_load_json_config() {
        let json_content = r#"
{
  "url": "http://localhost:8080/",
  "client": [
    { "type": "connection_pool", "max_idle_per_host": 8, "idle_timeout": "90s" }
  ]
}
"#;

        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        write!(temp_file, "{}", json_content).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(config.client.len(), 1);
        assert!(config.cache_clients);
    }

    #[tokio::test]
    async fn test_load_missing_file_fails() {
        assert!(load_config("/definitely/not/here.yaml").await.is_err());
    }
}
