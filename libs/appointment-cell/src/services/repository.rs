use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentGuard, AppointmentPatch};

#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    /// Fails if `appointment_id` is already taken.
    async fn create(&self, appointment: &Appointment) -> Result<Appointment>;

    async fn find_by_id(&self, appointment_id: &str) -> Result<Option<Appointment>>;

    /// Newest first.
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Appointment>>;

    /// Newest first.
    async fn find_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>>;

    /// Apply `patch` only while `guard` still holds. `Ok(None)` means the
    /// appointment is gone or its flags no longer match.
    async fn update(
        &self,
        appointment_id: &str,
        guard: &AppointmentGuard,
        patch: &AppointmentPatch,
    ) -> Result<Option<Appointment>>;
}
