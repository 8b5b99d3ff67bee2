//! Configuration Loader
//!
//! Layers an optional configuration file (format picked from its extension)
//! under `CONNECTOR_`-prefixed environment variables. Nested keys use `__`,
//! e.g. `CONNECTOR_CHECKPOINT_RETRY__MAX_ATTEMPTS=10`.

use std::path::Path;

use config::{Config, Environment, File};
use tracing::debug;

use super::error::{ConfigResult, ConfigurationError};
use super::ConnectorConfig;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "CONNECTOR";

impl ConnectorConfig {
    /// Load from an optional file plus the process environment, then validate
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        Self::load_with_environment(path, Environment::with_prefix(ENV_PREFIX))
    }

    /// Load from an optional file only, ignoring the process environment
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let config = Self::build(Config::builder().add_source(file_source(path)?))?;
        config.validate()?;
        Ok(config)
    }

    fn load_with_environment(path: Option<&Path>, environment: Environment) -> ConfigResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(file_source(path)?);
        }
        builder = builder.add_source(
            environment
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = Self::build(builder)?;
        config.validate()?;

        debug!(
            config = %serde_json::to_string(&config)
                .unwrap_or_else(|_| "[serialization error]".to_string()),
            "Connector configuration loaded"
        );
        Ok(config)
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> ConfigResult<Self> {
        builder
            .build()?
            .try_deserialize::<ConnectorConfig>()
            .map_err(|e| ConfigurationError::load_error("connector configuration", e))
    }
}

fn file_source(
    path: &Path,
) -> ConfigResult<File<config::FileSourceFile, config::FileFormat>> {
    if !path.exists() {
        return Err(ConfigurationError::load_error(
            path.display().to_string(),
            "file does not exist",
        ));
    }
    Ok(File::from(path).required(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
app_name = "archiver"
stream_name = "orders"
stream_region = "eu-west-1"
buffer_size = 100
key_prefix = "raw"

[checkpoint_retry]
max_attempts = 5
"#
        )
        .unwrap();

        let config = ConnectorConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.app_name, "archiver");
        assert_eq!(config.buffer_size, 100);
        assert_eq!(config.key_prefix.as_deref(), Some("raw"));
        assert_eq!(config.checkpoint_retry.max_attempts, Some(5));
        assert_eq!(config.checkpoint_retry.initial_backoff_ms, 50);
        assert_eq!(config.checkpoint_flush_interval_ms, 60_000);
    }

    #[test]
    fn test_load_rejects_missing_required() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "app_name = \"archiver\"").unwrap();

        let err = ConnectorConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingRequiredField { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ConnectorConfig::load_from_file(Path::new("/nonexistent/connector.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::LoadError { .. }));
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "app_name = \"archiver\"\nstream_name = \"orders\"\nstream_region = \"eu-west-1\""
        )
        .unwrap();

        let source = std::collections::HashMap::from([
            ("CONNECTOR_BUFFER_SIZE".to_string(), "42".to_string()),
            (
                "CONNECTOR_CHECKPOINT_RETRY__MAX_ATTEMPTS".to_string(),
                "3".to_string(),
            ),
        ]);
        let environment = Environment::with_prefix(ENV_PREFIX).source(Some(source));

        let config =
            ConnectorConfig::load_with_environment(Some(file.path()), environment).unwrap();
        assert_eq!(config.buffer_size, 42);
        assert_eq!(config.checkpoint_retry.max_attempts, Some(3));
        assert_eq!(config.stream_name, "orders");
    }
}
