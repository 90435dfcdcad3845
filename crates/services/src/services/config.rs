//! Process configuration, read once at startup and passed down explicitly.

use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const GUSTO_API_BASE: &str = "https://api.gusto.com";
const QUICKBOOKS_API_BASE: &str = "https://quickbooks.api.intuit.com";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: SecretString,
    pub database_max_connections: u32,
    pub environment: String,
    pub sentry_dsn: Option<String>,
    /// Unset disables the background anomaly scan
    pub anomaly_scan_interval: Option<Duration>,
    pub payroll: Option<PayrollConfig>,
}

#[derive(Debug)]
pub struct PayrollConfig {
    pub token_encryption_key: [u8; 32],
    pub gusto: Option<OAuthClientConfig>,
    pub quickbooks: Option<OAuthClientConfig>,
}

#[derive(Debug)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub api_base: String,
}

impl Config {
    /// Load `.env` if present and read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;
        let database_max_connections = parse_or(
            "DATABASE_MAX_CONNECTIONS",
            get("DATABASE_MAX_CONNECTIONS"),
            DEFAULT_MAX_CONNECTIONS,
        )?;
        if database_max_connections == 0 {
            return Err(ConfigError::Invalid {
                name: "DATABASE_MAX_CONNECTIONS",
                reason: "must be at least 1".to_string(),
            });
        }

        let anomaly_scan_interval = match get("ANOMALY_SCAN_INTERVAL_SECS") {
            Some(raw) => {
                let secs: u64 = parse("ANOMALY_SCAN_INTERVAL_SECS", &raw)?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        name: "ANOMALY_SCAN_INTERVAL_SECS",
                        reason: "must be greater than zero".to_string(),
                    });
                }
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        let gusto = oauth_client(
            &get,
            ("GUSTO_CLIENT_ID", "GUSTO_CLIENT_SECRET", "GUSTO_API_BASE"),
            GUSTO_API_BASE,
        )?;
        let quickbooks = oauth_client(
            &get,
            (
                "QUICKBOOKS_CLIENT_ID",
                "QUICKBOOKS_CLIENT_SECRET",
                "QUICKBOOKS_API_BASE",
            ),
            QUICKBOOKS_API_BASE,
        )?;

        let payroll = if gusto.is_some() || quickbooks.is_some() {
            let raw = get("PAYROLL_TOKEN_ENCRYPTION_KEY")
                .ok_or(ConfigError::Missing("PAYROLL_TOKEN_ENCRYPTION_KEY"))?;
            Some(PayrollConfig {
                token_encryption_key: decode_key(&raw)?,
                gusto,
                quickbooks,
            })
        } else {
            None
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            database_url: SecretString::from(database_url),
            database_max_connections,
            environment: get("APP_ENV").unwrap_or_else(|| "development".to_string()),
            sentry_dsn: get("SENTRY_DSN"),
            anomaly_scan_interval,
            payroll,
        })
    }

    pub fn database_url(&self) -> &str {
        self.database_url.expose_secret()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn oauth_client<G>(
    get: &G,
    (id_key, secret_key, base_key): (&'static str, &'static str, &'static str),
    default_base: &str,
) -> Result<Option<OAuthClientConfig>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match (get(id_key), get(secret_key)) {
        (Some(client_id), Some(client_secret)) => Ok(Some(OAuthClientConfig {
            client_id,
            client_secret: SecretString::from(client_secret),
            api_base: get(base_key)
                .unwrap_or_else(|| default_base.to_string())
                .trim_end_matches('/')
                .to_string(),
        })),
        (Some(_), None) => Err(ConfigError::Missing(secret_key)),
        (None, Some(_)) => Err(ConfigError::Missing(id_key)),
        (None, None) => Ok(None),
    }
}

fn decode_key(raw: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = STANDARD
        .decode(raw.trim())
        .map_err(|e| ConfigError::Invalid {
            name: "PAYROLL_TOKEN_ENCRYPTION_KEY",
            reason: e.to_string(),
        })?;
    bytes.try_into().map_err(|b: Vec<u8>| ConfigError::Invalid {
        name: "PAYROLL_TOKEN_ENCRYPTION_KEY",
        reason: format!("expected 32 bytes, got {}", b.len()),
    })
}

fn parse<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.map_or(Ok(default), |raw| parse(name, &raw))
}
