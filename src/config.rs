//! Configuration management for the advisory proxy
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::AdvisoryError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;

/// Environment variable the upstream key is read from when not set otherwise
pub const API_KEY_ENV: &str = "PERPLEXITY_API_KEY";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisoryConfig {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Upstream completion API settings
    pub upstream: UpstreamConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Trace export configuration
    pub telemetry: TelemetryConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Front-end origins allowed to call the API from a browser
    pub allowed_origins: Vec<String>,
    /// Upper bound for handling a whole request
    pub request_timeout_seconds: u32,
    pub max_body_bytes: usize,
    pub tls_cert_path: Option<PathBuf>,
    pub tls_key_path: Option<PathBuf>,
}

/// Upstream completion API settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Timeout of the single outbound call
    pub timeout_seconds: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (pretty or json)
    pub format: String,
}

/// OpenTelemetry trace export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// OTLP/HTTP traces endpoint, export is disabled when unset
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_allowed_origins() -> Vec<String> {
    [
        "http://localhost",
        "http://localhost:3000",
        "http://localhost:5173",
        "http://localhost:8000",
        "http://localhost:5500",
        "http://127.0.0.1",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:5173",
        "http://127.0.0.1:8000",
        "http://127.0.0.1:5500",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_request_timeout() -> u32 {
    90
}

fn default_max_body_bytes() -> usize {
    16 * 1024
}

fn default_upstream_base_url() -> String {
    "https://api.perplexity.ai".to_string()
}

fn default_upstream_model() -> String {
    "sonar-pro".to_string()
}

fn default_upstream_max_tokens() -> u32 {
    1000
}

fn default_upstream_temperature() -> f32 {
    0.2
}

fn default_upstream_timeout() -> u32 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_service_name() -> String {
    "advisory-proxy".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
            request_timeout_seconds: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_upstream_base_url(),
            model: default_upstream_model(),
            max_tokens: default_upstream_max_tokens(),
            temperature: default_upstream_temperature(),
            timeout_seconds: default_upstream_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: default_service_name(),
        }
    }
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl UpstreamConfig {
    /// The configured API key, `None` when absent or blank
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl AdvisoryConfig {
    /// Load configuration from file and environment variables; `None` uses
    /// the default file location
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path()
                .filter(|path| path.exists())
                .unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides, e.g. ADVISORY_UPSTREAM__API_KEY
        builder = builder.add_source(
            Environment::with_prefix("ADVISORY")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.allowed_origins")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: AdvisoryConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        if config.upstream.api_key().is_none() {
            config.upstream.api_key = std::env::var(API_KEY_ENV).ok();
        }

        // Apply defaults for missing values
        config.apply_defaults();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("advisory-proxy").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.server.host.is_empty() {
            self.server.host = default_host();
        }
        if self.server.port == 0 {
            self.server.port = default_port();
        }
        if self.server.request_timeout_seconds == 0 {
            self.server.request_timeout_seconds = default_request_timeout();
        }
        if self.server.max_body_bytes == 0 {
            self.server.max_body_bytes = default_max_body_bytes();
        }
        if self.upstream.base_url.is_empty() {
            self.upstream.base_url = default_upstream_base_url();
        }
        if self.upstream.model.is_empty() {
            self.upstream.model = default_upstream_model();
        }
        if self.upstream.max_tokens == 0 {
            self.upstream.max_tokens = default_upstream_max_tokens();
        }
        if self.upstream.timeout_seconds == 0 {
            self.upstream.timeout_seconds = default_upstream_timeout();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
        if self.telemetry.service_name.is_empty() {
            self.telemetry.service_name = default_service_name();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        self.validate_origins()?;
        self.validate_tls()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.upstream.timeout_seconds > 300 {
            return Err(
                AdvisoryError::config("Upstream timeout cannot exceed 300 seconds").into(),
            );
        }

        if self.upstream.max_tokens > 8000 {
            return Err(AdvisoryError::config("Upstream max tokens cannot exceed 8000").into());
        }

        if !(0.0..=2.0).contains(&self.upstream.temperature) {
            return Err(
                AdvisoryError::config("Upstream temperature must be between 0.0 and 2.0").into(),
            );
        }

        if self.server.request_timeout_seconds > 600 {
            return Err(
                AdvisoryError::config("Request timeout cannot exceed 600 seconds").into(),
            );
        }

        // A hung upstream must surface as its own timeout, not the server's
        if self.server.request_timeout_seconds <= self.upstream.timeout_seconds {
            return Err(AdvisoryError::config(format!(
                "Request timeout ({}s) must be greater than the upstream timeout ({}s)",
                self.server.request_timeout_seconds, self.upstream.timeout_seconds
            ))
            .into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        if self.server.host.parse::<IpAddr>().is_err() {
            return Err(AdvisoryError::config(format!(
                "Invalid server host '{}'. Must be an IP address such as 0.0.0.0 or ::",
                self.server.host
            ))
            .into());
        }

        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(AdvisoryError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(AdvisoryError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        if !is_http_url(&self.upstream.base_url) {
            return Err(AdvisoryError::config(
                "Upstream base URL must be a valid HTTP or HTTPS URL",
            )
            .into());
        }

        if let Some(endpoint) = &self.telemetry.otlp_endpoint {
            if !is_http_url(endpoint) {
                return Err(AdvisoryError::config(
                    "OTLP endpoint must be a valid HTTP or HTTPS URL",
                )
                .into());
            }
        }

        Ok(())
    }

    /// Allowed origins must be explicit `scheme://host[:port]` values
    fn validate_origins(&self) -> Result<()> {
        for origin in &self.server.allowed_origins {
            if origin.contains('*') {
                return Err(AdvisoryError::config(format!(
                    "Wildcard origin '{origin}' is not allowed, list origins explicitly"
                ))
                .into());
            }

            let host = origin
                .strip_prefix("http://")
                .or_else(|| origin.strip_prefix("https://"));
            match host {
                Some(host) if !host.is_empty() && !host.contains('/') => {}
                _ => {
                    return Err(AdvisoryError::config(format!(
                        "Invalid allowed origin '{origin}'. Expected e.g. 'https://example.com'"
                    ))
                    .into());
                }
            }
        }

        Ok(())
    }

    fn validate_tls(&self) -> Result<()> {
        match (&self.server.tls_cert_path, &self.server.tls_key_path) {
            (Some(_), None) | (None, Some(_)) => Err(AdvisoryError::config(
                "TLS requires both tls_cert_path and tls_key_path",
            )
            .into()),
            _ => Ok(()),
        }
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_config() {
        let config = AdvisoryConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.upstream.base_url, "https://api.perplexity.ai");
        assert_eq!(config.upstream.model, "sonar-pro");
        assert_eq!(config.upstream.max_tokens, 1000);
        assert_eq!(config.upstream.timeout_seconds, 60);
        assert_eq!(config.logging.level, "info");
        assert!(config.upstream.api_key.is_none());
        assert!(
            config
                .server
                .allowed_origins
                .contains(&"http://127.0.0.1:5500".to_string())
        );
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case(None, None)]
    #[case(Some(""), None)]
    #[case(Some("   "), None)]
    #[case(Some(" pplx-abc "), Some("pplx-abc"))]
    fn test_api_key_presence(#[case] raw: Option<&str>, #[case] expected: Option<&str>) {
        let mut config = AdvisoryConfig::default();
        config.upstream.api_key = raw.map(String::from);
        assert_eq!(config.upstream.api_key(), expected);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let mut config = AdvisoryConfig::default();
        config.upstream.api_key = Some("pplx-super-secret".to_string());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("pplx-super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = AdvisoryConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = AdvisoryConfig::default();
        config.upstream.timeout_seconds = 500;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("timeout cannot exceed"));

        let mut config = AdvisoryConfig::default();
        config.upstream.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[rstest]
    #[case(90, 60, true)]
    #[case(61, 60, true)]
    #[case(60, 60, false)]
    #[case(1, 3, false)]
    fn test_request_timeout_must_exceed_upstream_timeout(
        #[case] request_timeout: u32,
        #[case] upstream_timeout: u32,
        #[case] valid: bool,
    ) {
        let mut config = AdvisoryConfig::default();
        config.server.request_timeout_seconds = request_timeout;
        config.upstream.timeout_seconds = upstream_timeout;
        let result = config.validate();
        assert_eq!(result.is_ok(), valid);
        if let Err(err) = result {
            assert!(err.to_string().contains("greater than the upstream timeout"));
        }
    }

    #[rstest]
    #[case("0.0.0.0", true)]
    #[case("127.0.0.1", true)]
    #[case("::", true)]
    #[case("::1", true)]
    #[case("localhost", false)]
    #[case("example.com", false)]
    fn test_server_host_must_be_ip(#[case] host: &str, #[case] valid: bool) {
        let mut config = AdvisoryConfig::default();
        config.server.host = host.to_string();
        assert_eq!(config.validate().is_ok(), valid);
    }

    #[rstest]
    #[case("*")]
    #[case("http://*.example.com")]
    #[case("localhost:3000")]
    #[case("https://example.com/")]
    #[case("https://")]
    fn test_config_validation_rejects_origin(#[case] origin: &str) {
        let mut config = AdvisoryConfig::default();
        config.server.allowed_origins = vec![origin.to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_tls_pair() {
        let mut config = AdvisoryConfig::default();
        config.server.tls_cert_path = Some(PathBuf::from("cert.pem"));
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("both"));

        config.server.tls_key_path = Some(PathBuf::from("key.pem"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_defaults_fills_zeroes() {
        let mut config = AdvisoryConfig::default();
        config.server.port = 0;
        config.upstream.model.clear();
        config.logging.format.clear();
        config.apply_defaults();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.upstream.model, "sonar-pro");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir().join(format!(
            "advisory-proxy-config-{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"
[server]
port = 9100
allowed_origins = ["https://advisories.example.org"]

[upstream]
model = "sonar"
timeout_seconds = 20
"#,
        )
        .unwrap();

        let config = AdvisoryConfig::load_from_path(Some(path.clone())).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(
            config.server.allowed_origins,
            vec!["https://advisories.example.org".to_string()]
        );
        assert_eq!(config.upstream.model, "sonar");
        assert_eq!(config.upstream.timeout_seconds, 20);
        assert_eq!(config.upstream.max_tokens, 1000);
    }

    #[test]
    fn test_config_path_generation() {
        if let Some(path) = AdvisoryConfig::get_config_path() {
            assert!(path.to_string_lossy().contains("advisory-proxy"));
            assert!(path.to_string_lossy().ends_with("config.toml"));
        }
    }
}
