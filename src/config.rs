use crate::models::Source;
use crate::sync::SourceSyncConfig;
use crate::webhooks::DispatcherConfig;
use std::collections::HashMap;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got '{value}'")]
    Invalid {
        name: String,
        value: String,
        expected: &'static str,
    },
    #[error("APP_HOST must parse to an IPv4 or IPv6 address")]
    InvalidHost {
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("INBOUND_WEBHOOK_SECRETS entry '{0}' must look like provider:secret")]
    InvalidSecret(String),
}

/// Top-level configuration for the service
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub sync: SyncConfig,
    pub webhooks: WebhookConfig,
    /// JSON file seeding the in-memory lead store
    pub leads_path: Option<PathBuf>,
}

/// Settings controlling the HTTP server binding
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// One provider feed; a source is only synced when its URL is configured
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub source: Source,
    pub base_url: String,
    pub requests_per_minute: u32,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub interval_minutes: u64,
    pub batch_size: usize,
    pub notify_tenants: bool,
    pub sources: Vec<SourceConfig>,
}

impl SyncConfig {
    pub fn source_config(&self, source: &SourceConfig) -> SourceSyncConfig {
        SourceSyncConfig {
            interval: Duration::from_secs(self.interval_minutes.max(1) * 60),
            requests_per_minute: source.requests_per_minute,
            batch_size: self.batch_size,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub timeout_secs: u64,
    pub max_concurrency: usize,
    /// Provider id -> shared secret for inbound signature checks
    pub inbound_secrets: HashMap<String, String>,
}

impl WebhookConfig {
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            max_concurrent_deliveries: self.max_concurrency.max(1),
        }
    }
}

fn default_requests_per_minute(source: Source) -> u32 {
    match source {
        Source::Zillow | Source::Realtor => 5,
        Source::Mls => 10,
    }
}

impl AppConfig {
    /// Load from the process environment, reading `.env` first if present
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = ServerConfig {
            host: lookup("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_var(&lookup, "APP_PORT", "3000", "u16")?,
        };
        let telemetry = TelemetryConfig {
            log_level: lookup("APP_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        };

        let mut sources = Vec::new();
        for source in Source::ALL {
            let prefix = source.as_str().to_ascii_uppercase();
            let Some(base_url) = lookup(&format!("{prefix}_API_URL")).filter(|u| !u.trim().is_empty())
            else {
                continue;
            };
            let default_rpm = default_requests_per_minute(source).to_string();
            sources.push(SourceConfig {
                source,
                base_url: base_url.trim().to_string(),
                requests_per_minute: parse_var(
                    &lookup,
                    &format!("{prefix}_REQUESTS_PER_MINUTE"),
                    &default_rpm,
                    "u32",
                )?,
            });
        }

        let sync = SyncConfig {
            interval_minutes: parse_var(&lookup, "SYNC_INTERVAL_MINUTES", "15", "u64")?,
            batch_size: parse_var(&lookup, "SYNC_BATCH_SIZE", "25", "usize")?,
            notify_tenants: parse_var(&lookup, "SYNC_NOTIFY_TENANTS", "true", "bool")?,
            sources,
        };

        let webhooks = WebhookConfig {
            timeout_secs: parse_var(&lookup, "WEBHOOK_TIMEOUT_SECS", "10", "u64")?,
            max_concurrency: parse_var(&lookup, "WEBHOOK_MAX_CONCURRENCY", "50", "usize")?,
            inbound_secrets: parse_secrets(lookup("INBOUND_WEBHOOK_SECRETS").as_deref())?,
        };

        Ok(Self {
            server,
            telemetry,
            sync,
            webhooks,
            leads_path: lookup("LEADS_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}

fn parse_var<T, F>(
    lookup: &F,
    name: &str,
    default: &str,
    expected: &'static str,
) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(name).unwrap_or_else(|| default.to_string());
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name: name.to_string(),
        value,
        expected,
    })
}

fn parse_secrets(raw: Option<&str>) -> Result<HashMap<String, String>, ConfigError> {
    let mut secrets = HashMap::new();
    for entry in raw.unwrap_or_default().split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.split_once(':') {
            Some((provider, secret)) if !provider.trim().is_empty() && !secret.is_empty() => {
                secrets.insert(provider.trim().to_ascii_lowercase(), secret.to_string());
            }
            _ => return Err(ConfigError::InvalidSecret(entry.to_string())),
        }
    }
    Ok(secrets)
}
