/// Application configuration module
use std::env;
use std::time::Duration;

pub const TNS_BASE_URL_SANDBOX: &str = "https://sandbox-tns.weizmann.ac.il/api/";
pub const TNS_BASE_URL_REAL: &str = "https://wis-tns.weizmann.ac.il/api/";

/// Timeout applied to submission, reply and search requests
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 300;
pub const DEFAULT_REPLY_ATTEMPTS: u32 = 10;
pub const DEFAULT_REPLY_SLEEP_SECONDS: u64 = 1;
pub const DEFAULT_SEARCH_RADIUS_ARCSEC: f64 = 5.0;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub sandbox: bool,
    pub sandbox_url: String,
    pub production_url: String,
    pub timeout: Duration,
    pub reply_policy: ReplyPolicy,
    pub search_radius_arcsec: f64,
    pub reporter: ReporterInfo,
}

/// Bounded fixed-interval polling for a report reply
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplyPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl ReplyPolicy {
    /// A budget of zero still makes one attempt
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for ReplyPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_REPLY_ATTEMPTS,
            Duration::from_secs(DEFAULT_REPLY_SLEEP_SECONDS),
        )
    }
}

/// Reporter metadata stamped on every AT report
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReporterInfo {
    pub group_id: String,
    pub reporter: String,
    pub at_type: String,
}

impl Default for ReporterInfo {
    fn default() -> Self {
        Self {
            group_id: "48".to_string(),
            reporter: "ZTF MSIP submitted by AMPEL".to_string(),
            at_type: "1".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sandbox: true,
            sandbox_url: TNS_BASE_URL_SANDBOX.to_string(),
            production_url: TNS_BASE_URL_REAL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            reply_policy: ReplyPolicy::default(),
            search_radius_arcsec: DEFAULT_SEARCH_RADIUS_ARCSEC,
            reporter: ReporterInfo::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let reporter_defaults = ReporterInfo::default();

        let sandbox = env_bool("TNS_SANDBOX", defaults.sandbox)?;
        let sandbox_url = env_string("TNS_SANDBOX_URL", &defaults.sandbox_url);
        let production_url = env_string("TNS_PRODUCTION_URL", &defaults.production_url);

        let timeout = Duration::from_secs(env_u64("TNS_TIMEOUT_SECONDS", DEFAULT_TIMEOUT_SECONDS));
        let reply_policy = ReplyPolicy::new(
            env_u64("TNS_REPLY_ATTEMPTS", DEFAULT_REPLY_ATTEMPTS as u64)
                .try_into()
                .unwrap_or(u32::MAX),
            Duration::from_secs(env_u64(
                "TNS_REPLY_SLEEP_SECONDS",
                DEFAULT_REPLY_SLEEP_SECONDS,
            )),
        );

        let search_radius_arcsec = env::var("TNS_SEARCH_RADIUS_ARCSEC")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|r| *r > 0.0)
            .unwrap_or(DEFAULT_SEARCH_RADIUS_ARCSEC);

        let reporter = ReporterInfo {
            group_id: env_string("TNS_GROUP_ID", &reporter_defaults.group_id),
            reporter: env_string("TNS_REPORTER", &reporter_defaults.reporter),
            at_type: env_string("TNS_AT_TYPE", &reporter_defaults.at_type),
        };

        Ok(Self {
            sandbox,
            sandbox_url,
            production_url,
            timeout,
            reply_policy,
            search_radius_arcsec,
            reporter,
        })
    }

    /// Base URL for the selected TNS environment
    pub fn base_url(&self) -> &str {
        if self.sandbox {
            &self.sandbox_url
        } else {
            &self.production_url
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_bool(key: &str, default: bool) -> anyhow::Result<bool> {
    match env::var(key) {
        Ok(raw) => parse_bool(&raw)
            .ok_or_else(|| anyhow::anyhow!("{} must be true or false, got '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
