use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

/// A patient account. The wallet holds refunds and prepaid credit, in whole
/// currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub wallet_balance: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("User not found")]
    NotFound,

    #[error("Insufficient wallet balance: {balance} available, {required} required")]
    InsufficientBalance { balance: i64, required: i64 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    #[error("Wallet is busy, try again")]
    Contention,

    #[error("Database error: {0}")]
    Database(String),
}

impl PatientError {
    pub fn database(e: impl std::fmt::Display) -> Self {
        PatientError::Database(e.to_string())
    }
}

impl From<PatientError> for AppError {
    fn from(e: PatientError) -> Self {
        match e {
            PatientError::NotFound => AppError::NotFound(e.to_string()),
            PatientError::InsufficientBalance { .. } | PatientError::InvalidAmount(_) => {
                AppError::BadRequest(e.to_string())
            }
            PatientError::Contention => AppError::Conflict(e.to_string()),
            PatientError::Database(msg) => AppError::Database(msg),
        }
    }
}
