use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentGuard, AppointmentPatch};
use crate::services::repository::AppointmentRepository;

/// `appointments` table access, keyed by the human-readable `appointment_id`.
pub struct SupabaseAppointmentRepository {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn by_id(appointment_id: &str) -> String {
        format!("appointments?appointment_id=eq.{}", urlencoding::encode(appointment_id))
    }
}

fn guard_filters(guard: &AppointmentGuard) -> String {
    let mut filters = String::new();
    for (column, value) in [
        ("cancelled", guard.cancelled),
        ("payment", guard.payment),
        ("is_completed", guard.is_completed),
        ("refund_issued", guard.refund_issued),
        ("slot_released", guard.slot_released),
    ] {
        if let Some(value) = value {
            filters.push_str(&format!("&{}=eq.{}", column, value));
        }
    }
    filters
}

#[async_trait]
impl AppointmentRepository for SupabaseAppointmentRepository {
    async fn create(&self, appointment: &Appointment) -> Result<Appointment> {
        let rows: Vec<Appointment> = self
            .supabase
            .insert("appointments", serde_json::to_value(appointment)?)
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("Appointment insert {} returned no rows", appointment.appointment_id))
    }

    async fn find_by_id(&self, appointment_id: &str) -> Result<Option<Appointment>> {
        let rows: Vec<Appointment> = self.supabase.select(&Self::by_id(appointment_id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Appointment>> {
        self.supabase
            .select(&format!("appointments?user_id=eq.{}&order=created_at.desc", user_id))
            .await
    }

    async fn find_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>> {
        self.supabase
            .select(&format!("appointments?doc_id=eq.{}&order=created_at.desc", doctor_id))
            .await
    }

    async fn update(
        &self,
        appointment_id: &str,
        guard: &AppointmentGuard,
        patch: &AppointmentPatch,
    ) -> Result<Option<Appointment>> {
        let query = format!("{}{}", Self::by_id(appointment_id), guard_filters(guard));
        let rows: Vec<Appointment> = self.supabase.update(&query, serde_json::to_value(patch)?).await?;
        Ok(rows.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_becomes_postgrest_filters() {
        let guard = AppointmentGuard::active().with_payment(true);
        assert_eq!(
            guard_filters(&guard),
            "&cancelled=eq.false&payment=eq.true&is_completed=eq.false"
        );
        assert_eq!(guard_filters(&AppointmentGuard::default()), "");
        assert_eq!(
            guard_filters(&AppointmentGuard::cancelled().with_refund_issued(false)),
            "&cancelled=eq.true&refund_issued=eq.false"
        );
    }
}
