//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `LEASECHECK_CONFIG`
//! environment variable. A missing file is not an error: every field has a default.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **GEMINI_API_KEY / PORT** - The plain variables used by existing deployments
//! 3. **Environment variables** - Variables prefixed with `LEASECHECK_` override everything else
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `LEASECHECK_UPLOADS__MAX_FILE_SIZE=5242880` sets the `uploads.max_file_size` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use leasecheck::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! GEMINI_API_KEY="AIza..."
//! PORT=8080
//!
//! LEASECHECK_GEMINI__MODEL=gemini-2.5-pro
//! LEASECHECK_GEMINI__REQUEST_TIMEOUT=90s
//! LEASECHECK_UPLOADS__DIR=/var/tmp/leasecheck
//! LEASECHECK_ENABLE_METRICS=true
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, time::Duration};
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "LEASECHECK_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Generative model connection settings
    pub gemini: GeminiConfig,
    /// Transient storage and validation limits for uploaded contracts
    pub uploads: UploadConfig,
    /// Cross-origin settings. With no origins configured no CORS layer is installed.
    pub cors: CorsConfig,
    /// Enable Prometheus metrics endpoint at `/internal/metrics`
    pub enable_metrics: bool,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

/// Gemini `generateContent` client configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeminiConfig {
    /// API key. Usually supplied through `GEMINI_API_KEY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model name used in the request path
    pub model: String,
    /// Base URL of the Generative Language API
    pub base_url: Url,
    /// Upper bound for one model call. Unset means wait indefinitely.
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<Duration>,
}

// Hand-written so the key never ends up in logs.
impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url.as_str())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            base_url: Url::parse("https://generativelanguage.googleapis.com").expect("static URL is valid"),
            request_timeout: None,
        }
    }
}

/// Upload handling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Directory holding uploaded files for the duration of one request
    pub dir: PathBuf,
    /// Maximum accepted file size in bytes (default: 10 MiB)
    pub max_file_size: u64,
}

impl UploadConfig {
    /// Multipart framing and headers on top of the file itself.
    const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

    /// Request body limit for the upload route.
    ///
    /// Slightly above the file limit so that a file just over the limit reaches the handler and
    /// gets the precise size message rather than a bare body-limit rejection.
    pub fn body_limit(&self) -> usize {
        self.max_file_size.saturating_add(Self::MULTIPART_OVERHEAD) as usize
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("uploads"),
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            gemini: GeminiConfig::default(),
            uploads: UploadConfig::default(),
            cors: CorsConfig::default(),
            enable_metrics: false,
            enable_otel_export: false,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::raw().only(&["GEMINI_API_KEY"]).map(|_| "gemini.api_key".into()))
            .merge(Env::raw().only(&["PORT"]))
            .merge(Env::prefixed("LEASECHECK_").split("__").ignore(&["config"]))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.uploads.max_file_size == 0 {
            return Err(Error::Internal {
                operation: "Config validation: uploads.max_file_size must be positive (default: 10485760 = 10 MiB)".to_string(),
            });
        }

        if self.gemini.model.trim().is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: gemini.model cannot be empty".to_string(),
            });
        }

        if !self
            .gemini
            .model
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'))
        {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: gemini.model may only contain letters, digits, '-', '.' and '_', got '{}'",
                    self.gemini.model
                ),
            });
        }

        if !matches!(self.gemini.base_url.scheme(), "http" | "https") {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: gemini.base_url must be an http(s) URL, got '{}'",
                    self.gemini.base_url
                ),
            });
        }

        if let Some(timeout) = self.gemini.request_timeout
            && timeout.is_zero()
        {
            return Err(Error::Internal {
                operation: "Config validation: gemini.request_timeout must be positive when set".to_string(),
            });
        }

        Ok(())
    }

    /// Whether a non-blank model API key is present
    pub fn gemini_configured(&self) -> bool {
        self.gemini.api_key.as_deref().is_some_and(|key| !key.trim().is_empty())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
