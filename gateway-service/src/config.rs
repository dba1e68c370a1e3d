use std::{fmt, path::Path, time::Duration};

use serde::Deserialize;
use thiserror::Error;

/// Origins the web front-ends are served from.
const DEFAULT_ALLOWED_ORIGINS: [&str; 4] = [
    "https://lifeistoolong.id.vn",
    "https://www.lifeistoolong.id.vn",
    "http://localhost:5173",
    "http://localhost:4173",
];
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_ANALYTICS_URL: &str = "http://localhost:5000";
const DEFAULT_ANALYTICS_TIMEOUT_SECS: u64 = 15;
const DEFAULT_COOKIE_NAME: &str = "auth_token";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Where a deployment expects the session credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialTransport {
    /// A named cookie holding the access token.
    Cookie { name: String },
    /// An `Authorization: Bearer <token>` header.
    Bearer,
}

impl Default for CredentialTransport {
    fn default() -> Self {
        Self::Cookie {
            name: DEFAULT_COOKIE_NAME.to_owned(),
        }
    }
}

/// Optional settings read from the TOML file; environment variables win.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub port: Option<u16>,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub analytics_url: Option<String>,
    pub analytics_timeout_secs: Option<u64>,
    pub auth_transport: Option<String>,
    pub auth_cookie_name: Option<String>,
    pub allowed_origins: Option<Vec<String>>,
    pub max_upload_bytes: Option<usize>,
}

#[derive(Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub analytics_url: String,
    pub analytics_timeout: Duration,
    pub credential_transport: CredentialTransport,
    pub allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("port", &self.port)
            .field("supabase_url", &self.supabase_url)
            .field("supabase_anon_key", &"[REDACTED]")
            .field("analytics_url", &self.analytics_url)
            .field("analytics_timeout", &self.analytics_timeout)
            .field("credential_transport", &self.credential_transport)
            .field("allowed_origins", &self.allowed_origins)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl GatewayConfig {
    /// Loads the optional TOML file at `path`, then applies the process environment.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let file = if Path::new(path).exists() {
            let content = std::fs::read_to_string(path)?;
            tracing::info!("Loaded gateway config from {path}");
            toml::from_str(&content)?
        } else {
            tracing::info!("Config file not found at {path}, using environment only");
            FileConfig::default()
        };

        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Merges file settings with values from `lookup` (environment variable names).
    pub fn resolve(
        file: FileConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match var("SERVER_PORT") {
            Some(raw) => parse(&raw, "SERVER_PORT")?,
            None => file.port.unwrap_or(DEFAULT_PORT),
        };
        let supabase_url = var("SUPABASE_URL")
            .or(file.supabase_url)
            .ok_or(ConfigError::Missing("SUPABASE_URL"))?;
        let supabase_anon_key = var("SUPABASE_ANON_KEY")
            .or(file.supabase_anon_key)
            .ok_or(ConfigError::Missing("SUPABASE_ANON_KEY"))?;
        let analytics_url = var("FLASK_API_ENDPOINT")
            .or(file.analytics_url)
            .unwrap_or_else(|| DEFAULT_ANALYTICS_URL.to_owned());
        let analytics_timeout_secs = match var("ANALYTICS_TIMEOUT_SECS") {
            Some(raw) => parse(&raw, "ANALYTICS_TIMEOUT_SECS")?,
            None => file
                .analytics_timeout_secs
                .unwrap_or(DEFAULT_ANALYTICS_TIMEOUT_SECS),
        };
        let max_upload_bytes = match var("MAX_UPLOAD_BYTES") {
            Some(raw) => parse(&raw, "MAX_UPLOAD_BYTES")?,
            None => file.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        };

        let cookie_name = var("AUTH_COOKIE_NAME")
            .or(file.auth_cookie_name)
            .unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_owned());
        let credential_transport = match var("AUTH_TRANSPORT").or(file.auth_transport) {
            None => CredentialTransport::Cookie { name: cookie_name },
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "cookie" => CredentialTransport::Cookie { name: cookie_name },
                "bearer" => CredentialTransport::Bearer,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "AUTH_TRANSPORT",
                        value: raw,
                    });
                }
            },
        };

        let allowed_origins = match var("CORS_ALLOWED_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_owned)
                .collect(),
            None => file.allowed_origins.unwrap_or_else(|| {
                DEFAULT_ALLOWED_ORIGINS
                    .iter()
                    .map(|origin| (*origin).to_owned())
                    .collect()
            }),
        };

        Ok(Self {
            port,
            supabase_url: supabase_url.trim_end_matches('/').to_owned(),
            supabase_anon_key,
            analytics_url: analytics_url.trim_end_matches('/').to_owned(),
            analytics_timeout: Duration::from_secs(analytics_timeout_secs),
            credential_transport,
            allowed_origins,
            max_upload_bytes,
        })
    }
}

fn parse<T: std::str::FromStr>(raw: &str, key: &'static str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_owned(),
    })
}
