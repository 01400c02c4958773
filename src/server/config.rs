use reqwest::Url;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const ENV_PREFIX: &str = "STATUS_PROXY_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub upstream_base_url: String,
    pub page_id: String,
    pub cache_ttl_secs: u64,
    pub fetch_timeout_ms: u64,
    pub allowed_origins: Vec<String>,
    pub allowed_origin_suffixes: Vec<String>,
    pub widget_origin: String,
    pub environment: String,
    pub log_dir: String,
    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
pub struct PartialServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub upstream_base_url: Option<String>,
    pub page_id: Option<String>,
    pub cache_ttl_secs: Option<u64>,
    pub fetch_timeout_ms: Option<u64>,
    pub allowed_origins: Option<Vec<String>>,
    pub allowed_origin_suffixes: Option<Vec<String>>,
    pub widget_origin: Option<String>,
    pub environment: Option<String>,
    pub log_dir: Option<String>,
    pub rate_limit_max: Option<u32>,
    pub rate_limit_window_secs: Option<u64>,
}

// Plain PORT as set by most hosting platforms.
#[derive(Deserialize, Default, Debug)]
struct PlatformPort {
    port: Option<u16>,
}

fn default_widget_origin() -> String {
    "https://youthful-vacation-500847.framer.app".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        default_widget_origin(),
        "https://uptime-status-proxy.vercel.app".to_string(),
        "http://localhost:3000".to_string(),
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            upstream_base_url: "https://stats.uptimerobot.com".to_string(),
            page_id: "H8lyexLCjy".to_string(),
            cache_ttl_secs: 30,
            fetch_timeout_ms: 15_000,
            allowed_origins: default_allowed_origins(),
            allowed_origin_suffixes: vec![".framer.app".to_string()],
            widget_origin: default_widget_origin(),
            environment: "development".to_string(),
            log_dir: "logs".to_string(),
            rate_limit_max: 100,
            rate_limit_window_secs: 15 * 60,
        }
    }
}

impl ServerConfig {
    /// Defaults, then the optional TOML file, then environment variables.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config = match config_path {
            Some(path_str) if Path::new(path_str).exists() => Self::read_file(path_str)?,
            _ => PartialServerConfig::default(),
        };

        // 2. Load from environment variables
        let mut env_config: PartialServerConfig = envy::prefixed(ENV_PREFIX).from_env()?;
        if env_config.port.is_none() {
            env_config.port = envy::from_env::<PlatformPort>()?.port;
        }

        // 3. Merge: environment overrides file
        let config = Self::merge(env_config, file_config);
        config.validate()?;
        Ok(config)
    }

    pub fn read_file(path_str: &str) -> Result<PartialServerConfig, ConfigError> {
        let contents = fs::read_to_string(path_str).map_err(|source| ConfigError::Read {
            path: path_str.to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path_str.to_string(),
            source,
        })
    }

    pub fn merge(env: PartialServerConfig, file: PartialServerConfig) -> Self {
        let d = Self::default();
        Self {
            host: env.host.or(file.host).unwrap_or(d.host),
            port: env.port.or(file.port).unwrap_or(d.port),
            upstream_base_url: env
                .upstream_base_url
                .or(file.upstream_base_url)
                .unwrap_or(d.upstream_base_url),
            page_id: env.page_id.or(file.page_id).unwrap_or(d.page_id),
            cache_ttl_secs: env
                .cache_ttl_secs
                .or(file.cache_ttl_secs)
                .unwrap_or(d.cache_ttl_secs),
            fetch_timeout_ms: env
                .fetch_timeout_ms
                .or(file.fetch_timeout_ms)
                .unwrap_or(d.fetch_timeout_ms),
            allowed_origins: env
                .allowed_origins
                .or(file.allowed_origins)
                .unwrap_or(d.allowed_origins),
            allowed_origin_suffixes: env
                .allowed_origin_suffixes
                .or(file.allowed_origin_suffixes)
                .unwrap_or(d.allowed_origin_suffixes),
            widget_origin: env
                .widget_origin
                .or(file.widget_origin)
                .unwrap_or(d.widget_origin),
            environment: env.environment.or(file.environment).unwrap_or(d.environment),
            log_dir: env.log_dir.or(file.log_dir).unwrap_or(d.log_dir),
            rate_limit_max: env
                .rate_limit_max
                .or(file.rate_limit_max)
                .unwrap_or(d.rate_limit_max),
            rate_limit_window_secs: env
                .rate_limit_window_secs
                .or(file.rate_limit_window_secs)
                .unwrap_or(d.rate_limit_window_secs),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid("cache_ttl_secs must be greater than 0".into()));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(ConfigError::Invalid("fetch_timeout_ms must be greater than 0".into()));
        }
        if self.rate_limit_window_secs == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit_window_secs must be greater than 0".into(),
            ));
        }
        if self.page_id.trim().is_empty() {
            return Err(ConfigError::Invalid("page_id must not be empty".into()));
        }
        Url::parse(&self.upstream_url())
            .map_err(|e| ConfigError::Invalid(format!("upstream URL is not valid: {e}")))?;
        Ok(())
    }

    pub fn upstream_url(&self) -> String {
        format!(
            "{}/api/getMonitorList/{}",
            self.upstream_base_url.trim_end_matches('/'),
            self.page_id
        )
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}
