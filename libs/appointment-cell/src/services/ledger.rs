use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use doctor_cell::models::{BookedEntry, Doctor};
use doctor_cell::services::{DoctorRepository, SlotRepository};

use crate::models::{Appointment, AppointmentError};

/// One held booking: the index entry on the doctor and, when the doctor
/// published a slot at that instant, the slot itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub doctor_id: Uuid,
    pub slot_key: String,
    pub entry: BookedEntry,
    pub slot_time: DateTime<FixedOffset>,
    pub slot_id: Option<Uuid>,
}

impl Reservation {
    /// The reservation an existing appointment holds. The slot is looked up
    /// again on release.
    pub fn of(appointment: &Appointment, timezone: &FixedOffset) -> Self {
        Self {
            doctor_id: appointment.doc_id,
            slot_key: appointment.slot_date.clone(),
            entry: BookedEntry::from_instant(&appointment.slot_time, timezone),
            slot_time: appointment.slot_time,
            slot_id: None,
        }
    }
}

/// The only writer of the two booking records: slot `is_booked` flags and the
/// doctor's `slots_booked` index. Slots flip through a conditional update; the
/// index is written against the doctor's `version` and retried on a lost race.
pub struct BookingLedger {
    doctors: Arc<dyn DoctorRepository>,
    slots: Arc<dyn SlotRepository>,
    timezone: FixedOffset,
    max_retries: u32,
}

impl BookingLedger {
    pub fn new(
        doctors: Arc<dyn DoctorRepository>,
        slots: Arc<dyn SlotRepository>,
        timezone: FixedOffset,
        max_retries: u32,
    ) -> Self {
        Self {
            doctors,
            slots,
            timezone,
            max_retries,
        }
    }

    async fn load_doctor(&self, doctor_id: Uuid) -> Result<Doctor, AppointmentError> {
        self.doctors
            .find_by_id(doctor_id)
            .await
            .map_err(AppointmentError::database)?
            .ok_or(AppointmentError::DoctorNotFound)
    }

    /// Hold `slot_time` for `doctor`. Either both records are written or neither.
    pub async fn reserve(
        &self,
        doctor: Doctor,
        slot_key: &str,
        slot_time: DateTime<FixedOffset>,
    ) -> Result<Reservation, AppointmentError> {
        let slot_id = match self
            .slots
            .find_by_start(doctor.id, slot_time)
            .await
            .map_err(AppointmentError::database)?
        {
            Some(slot) => {
                if !self.slots.reserve(slot.id).await.map_err(AppointmentError::database)? {
                    warn!("Slot {} of doctor {} was taken by another booking", slot.id, doctor.id);
                    return Err(AppointmentError::SlotUnavailable);
                }
                Some(slot.id)
            }
            None => {
                debug!("No published slot at {} for doctor {}", slot_time, doctor.id);
                None
            }
        };

        let reservation = Reservation {
            doctor_id: doctor.id,
            slot_key: slot_key.to_string(),
            entry: BookedEntry::from_instant(&slot_time, &self.timezone),
            slot_time,
            slot_id,
        };

        if let Err(e) = self.append_entry(doctor, &reservation).await {
            if let Err(undo) = self.release_slot(&reservation).await {
                error!("Could not release slot after failed reservation: {}", undo);
            }
            return Err(e);
        }

        info!(
            "Reserved {} {} for doctor {}",
            reservation.entry.date, reservation.entry.time, reservation.doctor_id
        );
        Ok(reservation)
    }

    async fn append_entry(&self, mut doctor: Doctor, reservation: &Reservation) -> Result<(), AppointmentError> {
        for attempt in 1..=self.max_retries + 1 {
            if doctor.slots_booked.contains(&reservation.slot_key, &reservation.entry) {
                return Err(AppointmentError::SlotUnavailable);
            }

            let mut booked = doctor.slots_booked.clone();
            booked.insert(&reservation.slot_key, reservation.entry.clone());

            if self
                .doctors
                .update_doctor_slots(doctor.id, doctor.version, &booked)
                .await
                .map_err(AppointmentError::database)?
            {
                return Ok(());
            }

            debug!("Booking index of doctor {} changed underneath us (attempt {})", doctor.id, attempt);
            doctor = self.load_doctor(doctor.id).await?;
        }

        warn!("Gave up writing booking index of doctor {}", doctor.id);
        Err(AppointmentError::SlotUnavailable)
    }

    /// Drop the index entry and free the slot. Missing pieces are not an error.
    pub async fn release(&self, reservation: &Reservation) -> Result<(), AppointmentError> {
        self.remove_entry(reservation).await?;
        self.release_slot(reservation).await?;
        info!(
            "Released {} {} for doctor {}",
            reservation.entry.date, reservation.entry.time, reservation.doctor_id
        );
        Ok(())
    }

    async fn remove_entry(&self, reservation: &Reservation) -> Result<(), AppointmentError> {
        for attempt in 1..=self.max_retries + 1 {
            let doctor = self.load_doctor(reservation.doctor_id).await?;
            let mut booked = doctor.slots_booked.clone();
            if !booked.remove(&reservation.slot_key, &reservation.entry) {
                debug!("Booking index of doctor {} holds no matching entry", doctor.id);
                return Ok(());
            }

            if self
                .doctors
                .update_doctor_slots(doctor.id, doctor.version, &booked)
                .await
                .map_err(AppointmentError::database)?
            {
                return Ok(());
            }
            debug!("Booking index of doctor {} changed underneath us (attempt {})", doctor.id, attempt);
        }

        Err(AppointmentError::Database(format!(
            "Could not update booking index of doctor {} after {} attempts",
            reservation.doctor_id,
            self.max_retries + 1
        )))
    }

    async fn release_slot(&self, reservation: &Reservation) -> Result<(), AppointmentError> {
        let slot_id = match reservation.slot_id {
            Some(id) => Some(id),
            None => self
                .slots
                .find_by_start(reservation.doctor_id, reservation.slot_time)
                .await
                .map_err(AppointmentError::database)?
                .map(|slot| slot.id),
        };

        if let Some(slot_id) = slot_id {
            self.slots.release(slot_id).await.map_err(AppointmentError::database)?;
        }
        Ok(())
    }
}
