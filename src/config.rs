// src/config.rs

use color_eyre::eyre::{Result, WrapErr, eyre};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::core::whois::WHOIS_PORT;
use crate::logging::get_data_dir;

const ENV_PREFIX: &str = "RECON_RELAY_";

/// Process configuration, read once at startup and handed to the core.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// Outbound events queued per session before job output waits on the socket.
    pub session_buffer: usize,
    /// Largest inbound WebSocket message accepted, in bytes.
    pub max_message_bytes: usize,
    pub rate_limit: RateLimitSettings,
    pub jobs: JobSettings,
}

/// Per-address connection budgets for `/ws`. Zero disables a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub per_hour: u32,
    pub per_day: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self { per_hour: 50, per_day: 200 }
    }
}

/// Everything the job handlers need to know about the outside world.
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub ping_bin: String,
    pub ping_count: u32,
    pub nmap_bin: String,
    pub subfinder_bin: String,
    pub http_timeout: Duration,
    pub scan_timeout: Duration,
    pub whois_timeout: Duration,
    pub geoip_url: Url,
    pub crtsh_url: Url,
    pub whois_server: String,
    pub whois_port: u16,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            ping_bin: "ping".to_string(),
            ping_count: 4,
            nmap_bin: "nmap".to_string(),
            subfinder_bin: "subfinder".to_string(),
            http_timeout: Duration::from_secs(10),
            scan_timeout: Duration::from_secs(300),
            whois_timeout: Duration::from_secs(10),
            geoip_url: Url::parse("http://ip-api.com/json/").expect("static URL"),
            crtsh_url: Url::parse("https://crt.sh/").expect("static URL"),
            whois_server: "whois.iana.org".to_string(),
            whois_port: WHOIS_PORT,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; unset keys fall back to
    /// defaults, malformed values are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = JobSettings::default();
        let rate_defaults = RateLimitSettings::default();
        let prefixed = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        let jobs = JobSettings {
            ping_bin: prefixed("PING_BIN").unwrap_or(defaults.ping_bin),
            ping_count: parse_or(prefixed("PING_COUNT"), "PING_COUNT", defaults.ping_count)?,
            nmap_bin: prefixed("NMAP_BIN").unwrap_or(defaults.nmap_bin),
            subfinder_bin: prefixed("SUBFINDER_BIN").unwrap_or(defaults.subfinder_bin),
            http_timeout: secs_or(prefixed("HTTP_TIMEOUT_SECS"), "HTTP_TIMEOUT_SECS", defaults.http_timeout)?,
            scan_timeout: secs_or(prefixed("SCAN_TIMEOUT_SECS"), "SCAN_TIMEOUT_SECS", defaults.scan_timeout)?,
            whois_timeout: secs_or(prefixed("WHOIS_TIMEOUT_SECS"), "WHOIS_TIMEOUT_SECS", defaults.whois_timeout)?,
            geoip_url: base_url_or(prefixed("GEOIP_URL"), "GEOIP_URL", defaults.geoip_url)?,
            crtsh_url: base_url_or(prefixed("CRTSH_URL"), "CRTSH_URL", defaults.crtsh_url)?,
            whois_server: prefixed("WHOIS_SERVER").unwrap_or(defaults.whois_server),
            whois_port: parse_or(prefixed("WHOIS_PORT"), "WHOIS_PORT", defaults.whois_port)?,
        };

        if jobs.ping_count == 0 {
            return Err(eyre!("{ENV_PREFIX}PING_COUNT must be at least 1"));
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(lookup("PORT"), "PORT", 5000)?,
            db_path: prefixed("DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| get_data_dir().join("recon.db")),
            session_buffer: parse_or(prefixed("SESSION_BUFFER"), "SESSION_BUFFER", 64)?,
            max_message_bytes: parse_or(prefixed("MAX_MESSAGE_BYTES"), "MAX_MESSAGE_BYTES", 16 * 1024 * 1024)?,
            rate_limit: RateLimitSettings {
                per_hour: parse_or(prefixed("RATE_LIMIT_HOURLY"), "RATE_LIMIT_HOURLY", rate_defaults.per_hour)?,
                per_day: parse_or(prefixed("RATE_LIMIT_DAILY"), "RATE_LIMIT_DAILY", rate_defaults.per_day)?,
            },
            jobs,
        })
    }
}

fn parse_or<T>(raw: Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .wrap_err_with(|| format!("invalid value {value:?} for {name}")),
        None => Ok(default),
    }
}

fn secs_or(raw: Option<String>, name: &str, default: Duration) -> Result<Duration> {
    let secs = parse_or(raw, name, default.as_secs())?;
    Ok(Duration::from_secs(secs))
}

/// Parses a base URL, making sure it ends with `/` so paths join beneath it.
fn base_url_or(raw: Option<String>, name: &str, default: Url) -> Result<Url> {
    let Some(mut value) = raw else {
        return Ok(default);
    };
    if !value.ends_with('/') {
        value.push('/');
    }
    Url::parse(&value).wrap_err_with(|| format!("invalid URL {value:?} for {name}"))
}
