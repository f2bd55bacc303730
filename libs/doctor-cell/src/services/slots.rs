use std::sync::Arc;

use chrono::FixedOffset;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_utils::clock::Clock;

use crate::models::{
    CreateRecurringSlotsRequest, NewSlot, RecurrenceSpec, RecurringSlotsResult, Slot, SlotError, SlotPatch,
    UpdateSlotRequest,
};
use crate::services::generator::SlotGenerator;
use crate::services::repository::{DoctorRepository, SlotRepository};
use crate::DoctorCellState;

/// Doctor-side slot management: recurring generation plus single-slot edits.
pub struct SlotService {
    doctors: Arc<dyn DoctorRepository>,
    slots: Arc<dyn SlotRepository>,
    clock: Arc<dyn Clock>,
    timezone: FixedOffset,
}

impl SlotService {
    pub fn new(state: &DoctorCellState) -> Self {
        Self {
            doctors: state.doctors.clone(),
            slots: state.slots.clone(),
            clock: state.clock.clone(),
            timezone: state.timezone(),
        }
    }

    async fn ensure_doctor(&self, doctor_id: Uuid) -> Result<(), SlotError> {
        self.doctors
            .find_by_id(doctor_id)
            .await
            .map_err(SlotError::database)?
            .map(|_| ())
            .ok_or(SlotError::DoctorNotFound)
    }

    async fn owned_slot(&self, doctor_id: Uuid, slot_id: Uuid) -> Result<Slot, SlotError> {
        match self.slots.find_by_id(slot_id).await.map_err(SlotError::database)? {
            Some(slot) if slot.doctor_id == doctor_id => Ok(slot),
            _ => Err(SlotError::SlotNotFound),
        }
    }

    /// Expand a weekly rule and persist whatever does not already exist.
    ///
    /// `skipped_count` covers both occurrences that lay in the past and ones that
    /// collided with an existing slot. If nothing at all was inserted the call fails
    /// with [`SlotError::AllSlotsSkipped`].
    pub async fn create_recurring_slots(
        &self,
        doctor_id: Uuid,
        request: &CreateRecurringSlotsRequest,
    ) -> Result<RecurringSlotsResult, SlotError> {
        let spec = RecurrenceSpec::parse(doctor_id, request)?;
        self.ensure_doctor(doctor_id).await?;

        let generated = SlotGenerator::new(self.timezone).generate(&spec, self.clock.now())?;
        let attempted = generated.slots.len() + generated.skipped;

        let batch = generated
            .slots
            .into_iter()
            .map(|candidate| NewSlot {
                doctor_id,
                date: candidate.date,
                start_time: candidate.start_time,
                end_time: candidate.end_time,
            })
            .collect();

        let outcome = self.slots.insert_batch(batch).await.map_err(SlotError::database)?;
        let skipped = generated.skipped + outcome.skipped;

        if outcome.inserted.is_empty() {
            warn!("Recurring slots for doctor {}: all {} candidates skipped", doctor_id, attempted);
            return Err(SlotError::AllSlotsSkipped { attempted, skipped });
        }

        info!(
            "Created {} recurring slots for doctor {} ({} skipped)",
            outcome.inserted.len(),
            doctor_id,
            skipped
        );

        let slots: Vec<Slot> = outcome
            .inserted
            .into_iter()
            .map(|slot| slot.normalized(&self.timezone))
            .collect();

        Ok(RecurringSlotsResult {
            created: slots.len(),
            skipped_count: skipped,
            slots,
        })
    }

    pub async fn list_slots(&self, doctor_id: Uuid) -> Result<Vec<Slot>, SlotError> {
        self.ensure_doctor(doctor_id).await?;
        let slots = self.slots.find_by_doctor(doctor_id).await.map_err(SlotError::database)?;
        debug!("Doctor {} has {} slots", doctor_id, slots.len());
        Ok(slots.into_iter().map(|s| s.normalized(&self.timezone)).collect())
    }

    /// Move or resize an unbooked slot. The date follows the new start.
    pub async fn update_slot(
        &self,
        doctor_id: Uuid,
        slot_id: Uuid,
        request: UpdateSlotRequest,
    ) -> Result<Slot, SlotError> {
        if request.start_time.is_none() && request.end_time.is_none() {
            return Err(SlotError::Validation("Nothing to update: provide start_time or end_time".to_string()));
        }

        let slot = self.owned_slot(doctor_id, slot_id).await?;
        if slot.is_booked {
            return Err(SlotError::Conflict("A booked slot cannot be rescheduled".to_string()));
        }

        let start = request.start_time.unwrap_or(slot.start_time).with_timezone(&self.timezone);
        let end = request.end_time.unwrap_or(slot.end_time).with_timezone(&self.timezone);
        if start >= end {
            return Err(SlotError::Validation("start_time must be before end_time".to_string()));
        }
        if start < self.clock.now() {
            return Err(SlotError::PastTimeRejected(start.to_rfc3339()));
        }

        if start != slot.start_time {
            if let Some(existing) = self.slots.find_by_start(doctor_id, start).await.map_err(SlotError::database)? {
                if existing.id != slot_id {
                    return Err(SlotError::Conflict(format!("A slot already starts at {}", start.to_rfc3339())));
                }
            }
        }

        let patch = SlotPatch {
            date: Some(start.date_naive()),
            start_time: Some(start),
            end_time: Some(end),
            is_booked: None,
        };

        let updated = self
            .slots
            .update_by_id(slot_id, &patch)
            .await
            .map_err(SlotError::database)?
            .ok_or(SlotError::SlotNotFound)?;

        info!("Slot {} of doctor {} moved to {}", slot_id, doctor_id, start.to_rfc3339());
        Ok(updated.normalized(&self.timezone))
    }

    pub async fn delete_slot(&self, doctor_id: Uuid, slot_id: Uuid) -> Result<Slot, SlotError> {
        let slot = self.owned_slot(doctor_id, slot_id).await?;
        if slot.is_booked {
            return Err(SlotError::Conflict("A booked slot cannot be deleted".to_string()));
        }

        let deleted = self
            .slots
            .delete_by_id(slot_id)
            .await
            .map_err(SlotError::database)?
            .ok_or(SlotError::SlotNotFound)?;

        info!("Deleted slot {} of doctor {}", slot_id, doctor_id);
        Ok(deleted.normalized(&self.timezone))
    }
}
