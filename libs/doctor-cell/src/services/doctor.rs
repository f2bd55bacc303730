use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Doctor, DoctorProfile, SlotError};
use crate::services::repository::DoctorRepository;
use crate::DoctorCellState;

pub struct DoctorService {
    doctors: Arc<dyn DoctorRepository>,
}

impl DoctorService {
    pub fn new(state: &DoctorCellState) -> Self {
        Self {
            doctors: state.doctors.clone(),
        }
    }

    pub async fn get_profile(&self, doctor_id: Uuid) -> Result<DoctorProfile, SlotError> {
        debug!("Fetching doctor profile: {}", doctor_id);
        let doctor = self
            .doctors
            .find_by_id(doctor_id)
            .await
            .map_err(SlotError::database)?
            .ok_or(SlotError::DoctorNotFound)?;
        Ok(DoctorProfile::from(&doctor))
    }

    /// Full record, booking index included. Admin only.
    pub async fn find_by_email(&self, email: &str) -> Result<Doctor, SlotError> {
        debug!("Looking up doctor by email: {}", email);
        self.doctors
            .find_by_email(email)
            .await
            .map_err(SlotError::database)?
            .ok_or(SlotError::DoctorNotFound)
    }

    /// Toggle whether the doctor accepts new bookings.
    pub async fn update_availability(&self, doctor_id: Uuid, available: bool) -> Result<DoctorProfile, SlotError> {
        let doctor = self
            .doctors
            .update_availability(doctor_id, available)
            .await
            .map_err(SlotError::database)?
            .ok_or(SlotError::DoctorNotFound)?;

        info!("Doctor {} availability set to {}", doctor_id, available);
        Ok(DoctorProfile::from(&doctor))
    }
}
