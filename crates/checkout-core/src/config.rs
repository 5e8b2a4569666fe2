use serde::Deserialize;
use std::env;
use std::time::Duration;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:3000/";
const DEFAULT_CALL_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_SETTLE_DELAY_MS: u64 = 2_000;
const DEFAULT_FALLBACK_ADDRESS_ID: i64 = 1;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub server_port: String,
    pub session_file: Option<String>,
    pub checkout: CheckoutConfig,
}

/// What to do when the address cannot be created remotely.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum AddressFallback {
    /// Carry on with a previously known address id.
    UseDefault(i64),
    /// Fail the placement.
    Abort,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CheckoutConfig {
    /// Upper bound on every remote call, including the gateway settle wait.
    pub call_timeout: Duration,
    pub settle_delay: Duration,
    pub address_fallback: AddressFallback,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_millis(DEFAULT_CALL_TIMEOUT_MS),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
            address_fallback: AddressFallback::UseDefault(DEFAULT_FALLBACK_ADDRESS_ID),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_base_url =
            env::var("API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.into());
        let server_port = env::var("SERVER_PORT").unwrap_or_else(|_| "3000".into());
        let session_file = env::var("SESSION_FILE").ok().filter(|s| !s.is_empty());

        let call_timeout = env_millis("CALL_TIMEOUT_MS", DEFAULT_CALL_TIMEOUT_MS)?;
        let settle_delay = env_millis("SETTLE_DELAY_MS", DEFAULT_SETTLE_DELAY_MS)?;
        if settle_delay >= call_timeout {
            tracing::warn!(
                settle_ms = settle_delay.as_millis() as u64,
                timeout_ms = call_timeout.as_millis() as u64,
                "settle delay exceeds call timeout; every confirmation will time out"
            );
        }

        let address_fallback = match env::var("FALLBACK_ADDRESS_ID") {
            Err(_) => AddressFallback::UseDefault(DEFAULT_FALLBACK_ADDRESS_ID),
            Ok(v) => parse_fallback(&v)?,
        };

        Ok(Self {
            api_base_url,
            server_port,
            session_file,
            checkout: CheckoutConfig {
                call_timeout,
                settle_delay,
                address_fallback,
            },
        })
    }
}

fn env_millis(key: &str, default: u64) -> anyhow::Result<Duration> {
    match env::var(key) {
        Err(_) => Ok(Duration::from_millis(default)),
        Ok(v) => {
            let ms: u64 = v
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("{key} must be milliseconds: {e}"))?;
            Ok(Duration::from_millis(ms))
        }
    }
}

fn parse_fallback(raw: &str) -> anyhow::Result<AddressFallback> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("none") || raw.is_empty() {
        return Ok(AddressFallback::Abort);
    }
    let id: i64 = raw
        .parse()
        .map_err(|e| anyhow::anyhow!("FALLBACK_ADDRESS_ID must be an id or `none`: {e}"))?;
    Ok(AddressFallback::UseDefault(id))
}
