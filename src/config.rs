use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Default upload cap in megabytes.
pub const DEFAULT_MAX_UPLOAD_MB: f64 = 50.0;
/// Default tiktoken encoding used for RAG token budgets.
pub const DEFAULT_TOKENIZER_MODEL: &str = "cl100k_base";
const DEFAULT_DOCLING_TIMEOUT_SECS: u64 = 300;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the chunking service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interface the HTTP server binds to.
    pub server_host: String,
    /// Optional fixed HTTP port; when unset the first free port in 8000–8099 is used.
    pub server_port: Option<u16>,
    /// Shared secret expected in `X-API-Key`; authentication is disabled when unset.
    pub api_key: Option<String>,
    /// Upload cap in megabytes (1 MB = 1024² bytes).
    pub max_upload_mb: f64,
    /// Directory holding per-request temporary upload files.
    pub upload_temp_dir: PathBuf,
    /// Conversion backend selected at startup.
    pub converter_backend: ConverterBackend,
    /// Base URL of docling-serve (docling backend only).
    pub docling_serve_url: Option<String>,
    /// API key forwarded to docling-serve.
    pub docling_serve_api_key: Option<String>,
    /// Request timeout for docling-serve conversions.
    pub docling_timeout: Duration,
    /// tiktoken encoding or model name used to count tokens.
    pub tokenizer_model: String,
    /// Allowed CORS origins; `None` allows any origin.
    pub cors_allow_origins: Option<Vec<String>>,
}

/// Document conversion backends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConverterBackend {
    /// In-process Rust parsers.
    #[default]
    Native,
    /// Remote docling-serve instance.
    Docling,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".into(),
            server_port: None,
            api_key: None,
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            upload_temp_dir: env::temp_dir().join("docchunk"),
            converter_backend: ConverterBackend::Native,
            docling_serve_url: None,
            docling_serve_api_key: None,
            docling_timeout: Duration::from_secs(DEFAULT_DOCLING_TIMEOUT_SECS),
            tokenizer_model: DEFAULT_TOKENIZER_MODEL.into(),
            cors_allow_origins: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let converter_backend = match get("CONVERTER_BACKEND") {
            Some(value) => value
                .parse()
                .map_err(|()| ConfigError::InvalidValue("CONVERTER_BACKEND".into()))?,
            None => defaults.converter_backend,
        };
        let docling_serve_url = get("DOCLING_SERVE_URL");
        if converter_backend == ConverterBackend::Docling && docling_serve_url.is_none() {
            return Err(ConfigError::MissingVariable("DOCLING_SERVE_URL".into()));
        }

        let max_upload_mb = parse_optional::<f64>(get("MAX_UPLOAD_MB"), "MAX_UPLOAD_MB")?
            .unwrap_or(defaults.max_upload_mb);
        if !(max_upload_mb.is_finite() && max_upload_mb > 0.0) {
            return Err(ConfigError::InvalidValue("MAX_UPLOAD_MB".into()));
        }

        Ok(Self {
            server_host: get("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse_optional(get("SERVER_PORT"), "SERVER_PORT")?,
            api_key: get("API_KEY"),
            max_upload_mb,
            upload_temp_dir: get("UPLOAD_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_temp_dir),
            converter_backend,
            docling_serve_url,
            docling_serve_api_key: get("DOCLING_SERVE_API_KEY"),
            docling_timeout: parse_optional::<u64>(
                get("DOCLING_TIMEOUT_SECS"),
                "DOCLING_TIMEOUT_SECS",
            )?
            .map(Duration::from_secs)
            .unwrap_or(defaults.docling_timeout),
            tokenizer_model: get("TOKENIZER_MODEL").unwrap_or(defaults.tokenizer_model),
            cors_allow_origins: get("CORS_ALLOW_ORIGINS").map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            }),
        })
    }
}

fn parse_optional<T: std::str::FromStr>(
    value: Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl std::str::FromStr for ConverterBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "docling" => Ok(Self::Docling),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load `.env` and the environment, install the result in the global cache and return it.
///
/// Subsequent calls return the cached configuration.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        host = %config.server_host,
        server_port = ?config.server_port,
        backend = ?config.converter_backend,
        max_upload_mb = config.max_upload_mb,
        auth_enabled = config.api_key.is_some(),
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = load(&[]).expect("defaults");
        assert_eq!(config.server_host, "0.0.0.0");
        assert_eq!(config.server_port, None);
        assert_eq!(config.api_key, None);
        assert_eq!(config.max_upload_mb, 50.0);
        assert_eq!(config.converter_backend, ConverterBackend::Native);
        assert_eq!(config.docling_timeout, Duration::from_secs(300));
        assert_eq!(config.tokenizer_model, "cl100k_base");
        assert!(config.cors_allow_origins.is_none());
    }

    #[test]
    fn parses_overrides() {
        let config = load(&[
            ("SERVER_PORT", "9000"),
            ("API_KEY", "secret"),
            ("MAX_UPLOAD_MB", "12.5"),
            ("CONVERTER_BACKEND", "Docling"),
            ("DOCLING_SERVE_URL", "http://localhost:5001"),
            ("DOCLING_TIMEOUT_SECS", "30"),
            ("CORS_ALLOW_ORIGINS", "https://a.example, https://b.example,"),
        ])
        .expect("config");

        assert_eq!(config.server_port, Some(9000));
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.max_upload_mb, 12.5);
        assert_eq!(config.converter_backend, ConverterBackend::Docling);
        assert_eq!(config.docling_timeout, Duration::from_secs(30));
        assert_eq!(
            config.cors_allow_origins,
            Some(vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ])
        );
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = load(&[("API_KEY", "  "), ("SERVER_PORT", "")]).expect("config");
        assert_eq!(config.api_key, None);
        assert_eq!(config.server_port, None);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            load(&[("SERVER_PORT", "eighty")]),
            Err(ConfigError::InvalidValue(key)) if key == "SERVER_PORT"
        ));
        assert!(matches!(
            load(&[("MAX_UPLOAD_MB", "0")]),
            Err(ConfigError::InvalidValue(key)) if key == "MAX_UPLOAD_MB"
        ));
        assert!(matches!(
            load(&[("CONVERTER_BACKEND", "pandoc")]),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn docling_backend_requires_url() {
        assert!(matches!(
            load(&[("CONVERTER_BACKEND", "docling")]),
            Err(ConfigError::MissingVariable(key)) if key == "DOCLING_SERVE_URL"
        ));
    }
}
