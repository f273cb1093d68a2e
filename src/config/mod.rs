//! Application configuration, assembled once from the environment.
//!
//! Only the case identity is required; everything else degrades to a logged
//! default. The orchestrator never touches the environment itself.

use std::env;

use chrono_tz::Tz;
use thiserror::Error;
use tracing::warn;

use crate::gate::{self, ActiveWindow};
use crate::source::CaseIdentity;

pub const DEFAULT_SENSITIVE_STATUS: &str = "Refused";
pub const DEFAULT_STATUS_FILE: &str = "status_record.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error(transparent)]
    Window(#[from] gate::WindowError),
}

#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub from: String,
    pub to: String,
    pub password: String,
    pub smtp_host: String,
}

#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone)]
pub struct BarkSettings {
    pub device_key: String,
    pub server_url: String,
}

/// Channel credential sets; each channel is enabled iff its set is complete.
#[derive(Debug, Clone, Default)]
pub struct ChannelSettings {
    pub email: Option<EmailSettings>,
    pub telegram: Option<TelegramSettings>,
    pub bark: Option<BarkSettings>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub identity: CaseIdentity,
    pub active_window: ActiveWindow,
    pub timezone: Option<Tz>,
    pub sensitive_status: String,
    pub channels: ChannelSettings,
    pub captcha_solver_url: Option<String>,
}

impl AppConfig {
    /// Read the whole configuration. Missing identity variables and an
    /// inverted active-hours window are the only fatal paths.
    pub fn from_env() -> Result<Self, ConfigError> {
        let identity = CaseIdentity {
            location: require("LOCATION")?,
            number: require("NUMBER")?,
            passport_number: require("PASSPORT_NUMBER")?,
            surname: require("SURNAME")?,
        };

        let active_window = ActiveWindow::parse(&optional("ACTIVE_HOURS").unwrap_or_default())?;
        let tz_name = optional("TIMEZONE");
        if tz_name.is_none() {
            warn!("TIMEZONE not set, using process-local time for the active-hours gate");
        }
        let timezone = gate::resolve_timezone(tz_name.as_deref());

        let sensitive_status =
            optional("SENSITIVE_STATUS").unwrap_or_else(|| DEFAULT_SENSITIVE_STATUS.to_string());

        Ok(Self {
            identity,
            active_window,
            timezone,
            sensitive_status,
            channels: ChannelSettings::from_env(),
            captcha_solver_url: optional("CAPTCHA_SOLVER_URL"),
        })
    }
}

impl ChannelSettings {
    fn from_env() -> Self {
        let email = match (optional("FROM"), optional("TO"), optional("PASSWORD")) {
            (Some(from), Some(to), Some(password)) => Some(EmailSettings {
                from,
                to,
                password,
                smtp_host: optional("SMTP").unwrap_or_else(|| "smtp.gmail.com".to_string()),
            }),
            _ => None,
        };

        let telegram = match (optional("TG_BOT_TOKEN"), optional("TG_CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramSettings { bot_token, chat_id }),
            _ => None,
        };

        let bark = optional("BARK_DEVICE_KEY").map(|device_key| BarkSettings {
            device_key,
            server_url: optional("BARK_SERVER_URL")
                .unwrap_or_else(|| crate::notify::bark::DEFAULT_SERVER_URL.to_string()),
        });

        Self {
            email,
            telegram,
            bark,
        }
    }
}

fn require(key: &'static str) -> Result<String, ConfigError> {
    optional(key).ok_or(ConfigError::MissingVar(key))
}

/// Empty strings count as unset, matching how CI secrets surface.
fn optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}
