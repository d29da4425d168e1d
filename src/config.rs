//! Engine configuration, loaded from the environment.
//!
//! API keys are optional at load time — each command checks for the keys it
//! actually needs and fails with a `ConfigError` if one is missing.

use chrono::NaiveDate;
use secrecy::SecretString;

use crate::error::ConfigError;

/// Default global daily send cap, used once the warm-up ramp is exhausted.
pub const DEFAULT_DAILY_LIMIT: u32 = 50;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the local database file.
    pub database_path: String,
    /// Anthropic API key (personalization + reply classification).
    pub anthropic_api_key: Option<SecretString>,
    /// Resend API key (mail delivery).
    pub resend_api_key: Option<SecretString>,
    /// Apollo API key (contact discovery). Absent key = scraping fallback.
    pub apollo_api_key: Option<SecretString>,
    /// Sender address for outreach mail.
    pub from_email: String,
    /// Global daily send cap (post warm-up).
    pub daily_email_limit: u32,
    /// Cities to source leads in.
    pub target_cities: Vec<String>,
    /// Date the sending domain was registered. Anchors the warm-up ramp.
    pub domain_birth_date: NaiveDate,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/outreach.db".to_string());

        let daily_email_limit = match std::env::var("DAILY_EMAIL_LIMIT") {
            Ok(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "DAILY_EMAIL_LIMIT".to_string(),
                message: format!("expected an integer, got {v:?}"),
            })?,
            Err(_) => DEFAULT_DAILY_LIMIT,
        };

        let target_cities: Vec<String> = std::env::var("TARGET_CITIES")
            .unwrap_or_else(|_| "New York".to_string())
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        let domain_birth_date = match std::env::var("DOMAIN_BIRTH_DATE") {
            Ok(v) => NaiveDate::parse_from_str(&v, "%Y-%m-%d").map_err(|_| {
                ConfigError::InvalidValue {
                    key: "DOMAIN_BIRTH_DATE".to_string(),
                    message: format!("expected YYYY-MM-DD, got {v:?}"),
                }
            })?,
            // Domain registered 2026-02-22.
            Err(_) => NaiveDate::from_ymd_opt(2026, 2, 22).unwrap(),
        };

        Ok(Self {
            database_path,
            anthropic_api_key: env_secret("ANTHROPIC_API_KEY"),
            resend_api_key: env_secret("RESEND_API_KEY"),
            apollo_api_key: env_secret("APOLLO_API_KEY"),
            from_email: std::env::var("FROM_EMAIL")
                .unwrap_or_else(|_| "justin@leaseflex.com".to_string()),
            daily_email_limit,
            target_cities,
            domain_birth_date,
        })
    }

    /// The Anthropic key, or a config error naming what's missing.
    pub fn require_anthropic_key(&self) -> Result<&SecretString, ConfigError> {
        self.anthropic_api_key
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired {
                key: "ANTHROPIC_API_KEY".to_string(),
                hint: "export ANTHROPIC_API_KEY=sk-ant-... or add it to .env".to_string(),
            })
    }

    /// The Resend key, or a config error naming what's missing.
    pub fn require_resend_key(&self) -> Result<&SecretString, ConfigError> {
        self.resend_api_key
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired {
                key: "RESEND_API_KEY".to_string(),
                hint: "export RESEND_API_KEY=re_... or add it to .env".to_string(),
            })
    }
}

fn env_secret(key: &str) -> Option<SecretString> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}
