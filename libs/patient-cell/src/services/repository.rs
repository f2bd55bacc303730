use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::Patient;

#[async_trait]
pub trait PatientRepository: Send + Sync {
    async fn find_by_id(&self, patient_id: Uuid) -> Result<Option<Patient>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Patient>>;

    /// Set the balance to `new_balance` only if it still equals `expected`.
    /// `Ok(false)` means the balance moved underneath the caller.
    async fn swap_wallet_balance(&self, patient_id: Uuid, expected: i64, new_balance: i64) -> Result<bool>;
}
