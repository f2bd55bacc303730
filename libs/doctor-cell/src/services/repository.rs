use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use uuid::Uuid;

use crate::models::{Doctor, InsertOutcome, NewSlot, Slot, SlotPatch, SlotsBooked};

#[async_trait]
pub trait DoctorRepository: Send + Sync {
    async fn find_by_id(&self, doctor_id: Uuid) -> Result<Option<Doctor>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Doctor>>;

    /// Replace `slots_booked` if the stored version still equals `expected_version`,
    /// bumping it. `Ok(false)` means another writer got there first.
    async fn update_doctor_slots(
        &self,
        doctor_id: Uuid,
        expected_version: i64,
        slots_booked: &SlotsBooked,
    ) -> Result<bool>;

    async fn update_availability(&self, doctor_id: Uuid, available: bool) -> Result<Option<Doctor>>;
}

/// Persistence for [`Slot`]s. `(doctor_id, start_time)` is unique by convention:
/// inserts check for an existing slot first.
#[async_trait]
pub trait SlotRepository: Send + Sync {
    async fn insert(&self, slot: NewSlot) -> Result<Slot>;

    async fn find_by_id(&self, slot_id: Uuid) -> Result<Option<Slot>>;

    async fn find_by_start(&self, doctor_id: Uuid, start_time: DateTime<FixedOffset>) -> Result<Option<Slot>>;

    /// Unbooked slots starting at or after `not_before`, earliest first.
    async fn find_available(&self, doctor_id: Uuid, not_before: DateTime<Utc>) -> Result<Vec<Slot>>;

    /// Every slot of the doctor, earliest first.
    async fn find_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Slot>>;

    /// `Ok(None)` when no such slot exists.
    async fn update_by_id(&self, slot_id: Uuid, patch: &SlotPatch) -> Result<Option<Slot>>;

    /// `Ok(None)` when no such slot exists.
    async fn delete_by_id(&self, slot_id: Uuid) -> Result<Option<Slot>>;

    /// Flip `is_booked` to true only if it is currently false. Returns whether
    /// this call made the flip.
    async fn reserve(&self, slot_id: Uuid) -> Result<bool>;

    /// Flip `is_booked` back to false. Returns whether the slot was booked.
    async fn release(&self, slot_id: Uuid) -> Result<bool>;

    /// Insert what does not collide with an existing `(doctor_id, start_time)`;
    /// collisions are counted, never fatal.
    async fn insert_batch(&self, slots: Vec<NewSlot>) -> Result<InsertOutcome> {
        let mut outcome = InsertOutcome::default();
        for slot in slots {
            if self.find_by_start(slot.doctor_id, slot.start_time).await?.is_some() {
                outcome.skipped += 1;
                continue;
            }
            outcome.inserted.push(self.insert(slot).await?);
        }
        Ok(outcome)
    }
}
