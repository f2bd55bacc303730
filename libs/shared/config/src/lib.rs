use std::env;
use std::str::FromStr;

use chrono::{Duration, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub jwt_secret: String,
    pub mail_api_url: String,
    pub mail_api_key: String,
    pub mail_from: String,
    pub bind_addr: String,
    pub scheduling: SchedulingConfig,
}

/// Knobs for slot generation, availability and booking.
///
/// Every calendar computation (weekday, "today", the `D_M_YYYY` booking key) happens in the
/// fixed offset described by `utc_offset_minutes`, never in the server's local zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    pub utc_offset_minutes: i32,
    pub min_lead_minutes: i64,
    pub look_ahead_days: i64,
    pub appointment_id_prefix: String,
    pub max_reservation_retries: u32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 330,
            min_lead_minutes: 30,
            look_ahead_days: 7,
            appointment_id_prefix: "APT".to_string(),
            max_reservation_retries: 3,
        }
    }
}

impl SchedulingConfig {
    /// Same defaults, pinned to UTC.
    pub fn utc() -> Self {
        Self {
            utc_offset_minutes: 0,
            ..Self::default()
        }
    }

    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }

    pub fn min_lead(&self) -> Duration {
        Duration::minutes(self.min_lead_minutes)
    }

    pub fn look_ahead(&self) -> Duration {
        Duration::days(self.look_ahead_days)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(-720..=840).contains(&self.utc_offset_minutes) {
            return Err(ConfigError::InvalidValue {
                name: "SCHEDULING_UTC_OFFSET_MINUTES",
                reason: format!("{} is outside -720..=840", self.utc_offset_minutes),
            });
        }
        if self.min_lead_minutes < 0 {
            return Err(ConfigError::InvalidValue {
                name: "SLOT_MIN_LEAD_MINUTES",
                reason: "must not be negative".to_string(),
            });
        }
        if self.look_ahead_days <= 0 {
            return Err(ConfigError::InvalidValue {
                name: "SLOT_LOOK_AHEAD_DAYS",
                reason: "must be positive".to_string(),
            });
        }
        if self.appointment_id_prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "APPOINTMENT_ID_PREFIX",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = SchedulingConfig::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            mail_api_url: env::var("MAIL_API_URL").unwrap_or_default(),
            mail_api_key: env::var("MAIL_API_KEY").unwrap_or_default(),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@clinic.local".to_string()),
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            scheduling: SchedulingConfig {
                utc_offset_minutes: parse_env("SCHEDULING_UTC_OFFSET_MINUTES", defaults.utc_offset_minutes),
                min_lead_minutes: parse_env("SLOT_MIN_LEAD_MINUTES", defaults.min_lead_minutes),
                look_ahead_days: parse_env("SLOT_LOOK_AHEAD_DAYS", defaults.look_ahead_days),
                appointment_id_prefix: env::var("APPOINTMENT_ID_PREFIX")
                    .unwrap_or(defaults.appointment_id_prefix),
                max_reservation_retries: parse_env("MAX_RESERVATION_RETRIES", defaults.max_reservation_retries),
            },
        };

        if !config.is_configured() {
            warn!("Document store not configured - falling back to in-memory repositories");
        }
        if !config.is_mail_configured() {
            warn!("Mail API not configured - notifications will only be logged");
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "JWT_SECRET",
                reason: "must be set".to_string(),
            });
        }
        self.scheduling.validate()
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
    }

    pub fn is_mail_configured(&self) -> bool {
        !self.mail_api_url.is_empty() && !self.mail_api_key.is_empty()
    }
}

fn parse_env<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has unparseable value {:?}, using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
