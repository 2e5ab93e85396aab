use std::{env, time::Duration};

use chrono::Duration as ChronoDuration;
use log::*;
use tender_common::helpers::parse_boolean_flag;

const DEFAULT_TENDER_HOST: &str = "127.0.0.1";
const DEFAULT_TENDER_PORT: u16 = 8460;
const DEFAULT_AUTHORIZE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STALE_PAYMENT_TIMEOUT_HOURS: i64 = 24;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Cap on the gateway authorize call inside payment initialization.
    pub authorize_timeout: Duration,
    /// How long a transaction may sit in Pending/Processing before the reconciliation sweep cancels it.
    /// A buyer who abandons a 3-D-Secure challenge lands here.
    pub stale_payment_timeout: ChronoDuration,
    /// How often the reconciliation sweep runs.
    pub sweep_interval: Duration,
    /// When true, the sandbox gateway demands a challenge on every authorization, which exercises the full
    /// callback flow end to end.
    pub sandbox_challenge: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_TENDER_HOST.to_string(),
            port: DEFAULT_TENDER_PORT,
            database_url: String::default(),
            authorize_timeout: Duration::from_secs(DEFAULT_AUTHORIZE_TIMEOUT_SECS),
            stale_payment_timeout: ChronoDuration::hours(DEFAULT_STALE_PAYMENT_TIMEOUT_HOURS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            sandbox_challenge: true,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("TENDER_HOST").ok().unwrap_or_else(|| DEFAULT_TENDER_HOST.into());
        let port = env::var("TENDER_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for TENDER_PORT. {e} Using the default, \
                         {DEFAULT_TENDER_PORT}, instead."
                    );
                    DEFAULT_TENDER_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_TENDER_PORT);
        let database_url = env::var("TENDER_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ TENDER_DATABASE_URL is not set. Please set it to the URL for the marketplace database.");
            String::default()
        });
        let authorize_timeout = env::var("TENDER_GATEWAY_TIMEOUT_SECS")
            .map_err(|_| {
                info!(
                    "🪛️ TENDER_GATEWAY_TIMEOUT_SECS is not set. Using the default value of \
                     {DEFAULT_AUTHORIZE_TIMEOUT_SECS} s."
                )
            })
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for TENDER_GATEWAY_TIMEOUT_SECS. {e}"))
            })
            .map(Duration::from_secs)
            .ok()
            .unwrap_or(Duration::from_secs(DEFAULT_AUTHORIZE_TIMEOUT_SECS));
        let stale_payment_timeout = env::var("TENDER_STALE_PAYMENT_TIMEOUT_HOURS")
            .map_err(|_| {
                info!(
                    "🪛️ TENDER_STALE_PAYMENT_TIMEOUT_HOURS is not set. Using the default value of \
                     {DEFAULT_STALE_PAYMENT_TIMEOUT_HOURS} hrs."
                )
            })
            .and_then(|s| {
                s.parse::<i64>()
                    .map(ChronoDuration::hours)
                    .map_err(|e| warn!("🪛️ Invalid configuration value for TENDER_STALE_PAYMENT_TIMEOUT_HOURS. {e}"))
            })
            .ok()
            .unwrap_or(ChronoDuration::hours(DEFAULT_STALE_PAYMENT_TIMEOUT_HOURS));
        let sweep_interval = env::var("TENDER_SWEEP_INTERVAL_SECS")
            .map_err(|_| {
                info!(
                    "🪛️ TENDER_SWEEP_INTERVAL_SECS is not set. Using the default value of \
                     {DEFAULT_SWEEP_INTERVAL_SECS} s."
                )
            })
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for TENDER_SWEEP_INTERVAL_SECS. {e}"))
            })
            .map(Duration::from_secs)
            .ok()
            .unwrap_or(Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS));
        let sandbox_challenge = parse_boolean_flag(env::var("TENDER_SANDBOX_CHALLENGE").ok(), true);
        Self {
            host,
            port,
            database_url,
            authorize_timeout,
            stale_payment_timeout,
            sweep_interval,
            sandbox_challenge,
        }
    }
}
