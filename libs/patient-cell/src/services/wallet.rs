use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::PatientError;
use crate::services::repository::PatientRepository;

const MAX_WALLET_ATTEMPTS: u32 = 5;

/// Wallet arithmetic on top of the repository's balance compare-and-swap. Every
/// change re-reads the balance, so concurrent refunds and payments never
/// overwrite each other.
pub struct WalletService {
    patients: Arc<dyn PatientRepository>,
}

impl WalletService {
    pub fn new(patients: Arc<dyn PatientRepository>) -> Self {
        Self { patients }
    }

    pub async fn balance(&self, patient_id: Uuid) -> Result<i64, PatientError> {
        self.patients
            .find_by_id(patient_id)
            .await
            .map_err(PatientError::database)?
            .map(|p| p.wallet_balance)
            .ok_or(PatientError::NotFound)
    }

    /// Add `amount` and return the new balance.
    pub async fn credit(&self, patient_id: Uuid, amount: i64) -> Result<i64, PatientError> {
        if amount < 0 {
            return Err(PatientError::InvalidAmount(amount));
        }
        let balance = self.adjust(patient_id, amount).await?;
        info!("Credited {} to wallet of {}, balance now {}", amount, patient_id, balance);
        Ok(balance)
    }

    /// Take `amount` out and return the new balance. Never goes negative.
    pub async fn debit(&self, patient_id: Uuid, amount: i64) -> Result<i64, PatientError> {
        if amount < 0 {
            return Err(PatientError::InvalidAmount(amount));
        }
        let balance = self.adjust(patient_id, -amount).await?;
        info!("Debited {} from wallet of {}, balance now {}", amount, patient_id, balance);
        Ok(balance)
    }

    async fn adjust(&self, patient_id: Uuid, delta: i64) -> Result<i64, PatientError> {
        for attempt in 1..=MAX_WALLET_ATTEMPTS {
            let current = self.balance(patient_id).await?;
            if delta == 0 {
                return Ok(current);
            }

            let next = current + delta;
            if next < 0 {
                return Err(PatientError::InsufficientBalance {
                    balance: current,
                    required: -delta,
                });
            }

            let swapped = self
                .patients
                .swap_wallet_balance(patient_id, current, next)
                .await
                .map_err(PatientError::database)?;
            if swapped {
                return Ok(next);
            }
            debug!("Wallet of {} changed during update, attempt {}", patient_id, attempt);
        }

        warn!("Giving up on wallet update for {} after {} attempts", patient_id, MAX_WALLET_ATTEMPTS);
        Err(PatientError::Contention)
    }
}
