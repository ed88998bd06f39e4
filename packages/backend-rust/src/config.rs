use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use pecs_algo::{AdaptiveSettings, AdaptiveSettingsOverrides, SettingsError};

const DEFAULT_PENDING_FLUSH_SCHEDULE: &str = "*/30 * * * * *";
const DEFAULT_SESSION_CLEANUP_SCHEDULE: &str = "0 */5 * * * *";
const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: u64 = 30 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    /// Daily rolling file output next to stdout
    pub log_to_file: bool,
    pub log_dir: PathBuf,
    pub database_url: Option<String>,
    pub pending_flush_enabled: bool,
    pub pending_flush_schedule: String,
    pub session_cleanup_schedule: String,
    /// Live sessions with no activity for this long are ended by the cleanup worker
    pub session_idle_timeout: Duration,
    /// Server-wide settings overrides; validated by [`Config::adaptive_settings`]
    pub adaptive: AdaptiveSettingsOverrides,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3000);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let log_to_file = env_bool("ENABLE_FILE_LOGS").unwrap_or(false);
        let log_dir = std::env::var("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./logs"));

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty());

        let pending_flush_enabled = env_bool("ENABLE_PENDING_FLUSH_WORKER").unwrap_or(true);
        let pending_flush_schedule = std::env::var("PENDING_FLUSH_SCHEDULE")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PENDING_FLUSH_SCHEDULE.to_string());

        let session_cleanup_schedule = std::env::var("SESSION_CLEANUP_SCHEDULE")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SESSION_CLEANUP_SCHEDULE.to_string());
        let session_idle_timeout = Duration::from_secs(
            env_parse::<u64>("SESSION_IDLE_TIMEOUT")
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_SESSION_IDLE_TIMEOUT_SECS),
        );

        Self {
            host,
            port,
            log_level,
            log_to_file,
            log_dir,
            database_url,
            pending_flush_enabled,
            pending_flush_schedule,
            session_cleanup_schedule,
            session_idle_timeout,
            adaptive: adaptive_overrides_from_env(),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn adaptive_settings(&self) -> Result<AdaptiveSettings, SettingsError> {
        AdaptiveSettings::new(self.adaptive.clone())
    }
}

fn adaptive_overrides_from_env() -> AdaptiveSettingsOverrides {
    AdaptiveSettingsOverrides {
        min_array_size: env_parse("ADAPTIVE_MIN_ARRAY_SIZE"),
        max_array_size: env_parse("ADAPTIVE_MAX_ARRAY_SIZE"),
        current_array_size: env_parse("ADAPTIVE_CURRENT_ARRAY_SIZE"),
        target_success_rate: env_parse("ADAPTIVE_TARGET_SUCCESS_RATE"),
        window_size: env_parse("ADAPTIVE_WINDOW_SIZE"),
        increase_threshold: env_parse("ADAPTIVE_INCREASE_THRESHOLD"),
        decrease_threshold: env_parse("ADAPTIVE_DECREASE_THRESHOLD"),
        min_trials_before_adjust: env_parse("ADAPTIVE_MIN_TRIALS_BEFORE_ADJUST"),
        trend_margin: env_parse("ADAPTIVE_TREND_MARGIN"),
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    let value = std::env::var(key).ok()?;
    let normalized = value.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return None;
    }
    match normalized.as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
