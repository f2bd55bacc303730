use std::collections::HashMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentGuard, AppointmentPatch};
use crate::services::repository::AppointmentRepository;

#[derive(Default)]
pub struct InMemoryAppointmentRepository {
    appointments: RwLock<HashMap<String, Appointment>>,
}

impl InMemoryAppointmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.appointments.read().await.len()
    }

    fn newest_first(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
        appointments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        appointments
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn create(&self, appointment: &Appointment) -> Result<Appointment> {
        let mut appointments = self.appointments.write().await;
        if appointments.contains_key(&appointment.appointment_id) {
            bail!("Appointment {} already exists", appointment.appointment_id);
        }
        appointments.insert(appointment.appointment_id.clone(), appointment.clone());
        Ok(appointment.clone())
    }

    async fn find_by_id(&self, appointment_id: &str) -> Result<Option<Appointment>> {
        Ok(self.appointments.read().await.get(appointment_id).cloned())
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Appointment>> {
        let appointments = self.appointments.read().await;
        Ok(Self::newest_first(
            appointments.values().filter(|a| a.user_id == user_id).cloned().collect(),
        ))
    }

    async fn find_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>> {
        let appointments = self.appointments.read().await;
        Ok(Self::newest_first(
            appointments.values().filter(|a| a.doc_id == doctor_id).cloned().collect(),
        ))
    }

    async fn update(
        &self,
        appointment_id: &str,
        guard: &AppointmentGuard,
        patch: &AppointmentPatch,
    ) -> Result<Option<Appointment>> {
        let mut appointments = self.appointments.write().await;
        match appointments.get_mut(appointment_id) {
            Some(appointment) if guard.matches(appointment) => {
                patch.apply(appointment);
                Ok(Some(appointment.clone()))
            }
            _ => Ok(None),
        }
    }
}
