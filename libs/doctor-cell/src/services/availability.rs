use std::sync::Arc;

use chrono::{Duration, FixedOffset};
use tracing::debug;
use uuid::Uuid;

use shared_utils::clock::Clock;

use crate::models::{booking_key, BookedEntry, Slot, SlotError};
use crate::services::repository::{DoctorRepository, SlotRepository};
use crate::DoctorCellState;

/// Patient-facing slot queries.
pub struct AvailabilityService {
    doctors: Arc<dyn DoctorRepository>,
    slots: Arc<dyn SlotRepository>,
    clock: Arc<dyn Clock>,
    timezone: FixedOffset,
    min_lead: Duration,
    look_ahead: Duration,
}

impl AvailabilityService {
    pub fn new(state: &DoctorCellState) -> Self {
        Self {
            doctors: state.doctors.clone(),
            slots: state.slots.clone(),
            clock: state.clock.clone(),
            timezone: state.timezone(),
            min_lead: state.config.scheduling.min_lead(),
            look_ahead: state.config.scheduling.look_ahead(),
        }
    }

    /// Unbooked slots starting no sooner than the minimum lead time, earliest first.
    pub async fn list_available(&self, doctor_id: Uuid) -> Result<Vec<Slot>, SlotError> {
        let not_before = self.clock.now() + self.min_lead;
        let slots = self
            .slots
            .find_available(doctor_id, not_before)
            .await
            .map_err(SlotError::database)?;

        debug!("Doctor {} has {} open slots after {}", doctor_id, slots.len(), not_before);
        Ok(slots.into_iter().map(|s| s.normalized(&self.timezone)).collect())
    }

    /// [`list_available`](Self::list_available) cut to the look-ahead window, minus
    /// anything the doctor's booking index already holds. An unavailable doctor
    /// has nothing bookable.
    pub async fn list_bookable(&self, doctor_id: Uuid) -> Result<Vec<Slot>, SlotError> {
        let doctor = self
            .doctors
            .find_by_id(doctor_id)
            .await
            .map_err(SlotError::database)?
            .ok_or(SlotError::DoctorNotFound)?;

        if !doctor.available {
            debug!("Doctor {} is not taking bookings", doctor_id);
            return Ok(Vec::new());
        }

        let horizon = self.clock.now() + self.look_ahead;
        let bookable = self
            .list_available(doctor_id)
            .await?
            .into_iter()
            .filter(|slot| slot.start_time <= horizon)
            .filter(|slot| {
                let entry = BookedEntry::from_instant(&slot.start_time, &self.timezone);
                let key = booking_key(slot.start_time.with_timezone(&self.timezone).date_naive());
                !doctor.slots_booked.contains(&key, &entry)
            })
            .collect();

        Ok(bookable)
    }
}
