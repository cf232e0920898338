//! Daemon configuration from `KEYRELAY_*` environment variables

use anyhow::{Context, Result};
use keyrelay_core::application::worker::constants::{
    DEFAULT_BACKFILL_INTERVAL, DEFAULT_RETRY_BASE_DELAY_MS,
};
use keyrelay_core::application::AttemptBudgets;
use keyrelay_infra_external::DEFAULT_SUCCESS_RATIO;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "~/.keyrelay/keyrelay.db";
const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
const DEFAULT_HTTP_PORT: u16 = 3000;
const DEFAULT_WORKERS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("unknown log format {:?} (expected pretty or json)", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db_path: PathBuf,
    pub http_host: String,
    pub http_port: u16,
    pub workers: usize,
    pub retry_base_delay_ms: i64,
    pub backfill_interval: Duration,
    /// Unset: simulated key authority
    pub key_authority_url: Option<String>,
    pub key_success_ratio: f64,
    /// Unset: notifications are only logged
    pub client_webhook_url: Option<String>,
    pub notify_max_attempts: i32,
    pub log_format: LogFormat,
    pub log_dir: Option<PathBuf>,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let db_path = get("KEYRELAY_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let db_path = PathBuf::from(shellexpand::tilde(&db_path).into_owned());

        let workers: usize = parse_or(&get, "KEYRELAY_WORKERS", DEFAULT_WORKERS)?;
        if workers == 0 {
            anyhow::bail!("KEYRELAY_WORKERS must be at least 1");
        }

        let notify_max_attempts: i32 = parse_or(
            &get,
            "KEYRELAY_NOTIFY_MAX_ATTEMPTS",
            AttemptBudgets::default().send_account_key_to_client,
        )?;
        if notify_max_attempts < 1 {
            anyhow::bail!("KEYRELAY_NOTIFY_MAX_ATTEMPTS must be at least 1");
        }

        let key_success_ratio: f64 =
            parse_or(&get, "KEYRELAY_KEY_SUCCESS_RATIO", DEFAULT_SUCCESS_RATIO)?;
        if !(0.0..=1.0).contains(&key_success_ratio) {
            anyhow::bail!("KEYRELAY_KEY_SUCCESS_RATIO must be between 0 and 1");
        }

        let backfill_secs: u64 = parse_or(
            &get,
            "KEYRELAY_BACKFILL_INTERVAL_SECS",
            DEFAULT_BACKFILL_INTERVAL.as_secs(),
        )?;
        if backfill_secs == 0 {
            anyhow::bail!("KEYRELAY_BACKFILL_INTERVAL_SECS must be at least 1");
        }

        let retry_base_delay_ms: i64 = parse_or(
            &get,
            "KEYRELAY_RETRY_BASE_DELAY_MS",
            DEFAULT_RETRY_BASE_DELAY_MS,
        )?;
        if retry_base_delay_ms < 0 {
            anyhow::bail!("KEYRELAY_RETRY_BASE_DELAY_MS must not be negative");
        }

        Ok(Self {
            db_path,
            http_host: get("KEYRELAY_HTTP_HOST").unwrap_or_else(|| DEFAULT_HTTP_HOST.to_string()),
            http_port: parse_or(&get, "KEYRELAY_HTTP_PORT", DEFAULT_HTTP_PORT)?,
            workers,
            retry_base_delay_ms,
            backfill_interval: Duration::from_secs(backfill_secs),
            key_authority_url: get("KEYRELAY_KEY_AUTHORITY_URL"),
            key_success_ratio,
            client_webhook_url: get("KEYRELAY_CLIENT_WEBHOOK_URL"),
            notify_max_attempts,
            log_format: parse_or(&get, "KEYRELAY_LOG_FORMAT", LogFormat::Pretty)?,
            log_dir: get("KEYRELAY_LOG_DIR")
                .map(|dir| PathBuf::from(shellexpand::tilde(&dir).into_owned())),
        })
    }

    pub fn database_url(&self) -> String {
        format!("sqlite://{}", self.db_path.display())
    }

    pub fn attempt_budgets(&self) -> AttemptBudgets {
        AttemptBudgets {
            send_account_key_to_client: self.notify_max_attempts,
            ..AttemptBudgets::default()
        }
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| anyhow::anyhow!("{}", e))
            .with_context(|| format!("invalid value {:?} for {}", raw, name)),
    }
}
