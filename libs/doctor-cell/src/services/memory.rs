//! Process-local repositories. Used by the test suites and by the API when no
//! document store is configured.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_utils::clock::{Clock, SystemClock};

use crate::models::{Doctor, InsertOutcome, NewSlot, Slot, SlotPatch, SlotsBooked};
use crate::services::repository::{DoctorRepository, SlotRepository};

#[derive(Default)]
pub struct InMemoryDoctorRepository {
    doctors: RwLock<HashMap<Uuid, Doctor>>,
}

impl InMemoryDoctorRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doctors(doctors: impl IntoIterator<Item = Doctor>) -> Self {
        Self {
            doctors: RwLock::new(doctors.into_iter().map(|d| (d.id, d)).collect()),
        }
    }

    pub async fn upsert(&self, doctor: Doctor) {
        self.doctors.write().await.insert(doctor.id, doctor);
    }
}

#[async_trait]
impl DoctorRepository for InMemoryDoctorRepository {
    async fn find_by_id(&self, doctor_id: Uuid) -> Result<Option<Doctor>> {
        Ok(self.doctors.read().await.get(&doctor_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Doctor>> {
        Ok(self
            .doctors
            .read()
            .await
            .values()
            .find(|d| d.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn update_doctor_slots(
        &self,
        doctor_id: Uuid,
        expected_version: i64,
        slots_booked: &SlotsBooked,
    ) -> Result<bool> {
        let mut doctors = self.doctors.write().await;
        match doctors.get_mut(&doctor_id) {
            Some(doctor) if doctor.version == expected_version => {
                doctor.slots_booked = slots_booked.clone();
                doctor.version += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_availability(&self, doctor_id: Uuid, available: bool) -> Result<Option<Doctor>> {
        let mut doctors = self.doctors.write().await;
        Ok(doctors.get_mut(&doctor_id).map(|doctor| {
            doctor.available = available;
            doctor.clone()
        }))
    }
}

pub struct InMemorySlotRepository {
    slots: RwLock<HashMap<Uuid, Slot>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemorySlotRepository {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl InMemorySlotRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// `created_at` of stored slots comes from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    fn store(&self, slots: &mut HashMap<Uuid, Slot>, slot: NewSlot) -> Slot {
        let stored = Slot {
            id: Uuid::new_v4(),
            doctor_id: slot.doctor_id,
            date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            is_booked: false,
            created_at: Some(self.clock.now()),
        };
        slots.insert(stored.id, stored.clone());
        stored
    }

    fn sorted(mut slots: Vec<Slot>) -> Vec<Slot> {
        slots.sort_by_key(|s| s.start_time);
        slots
    }
}

#[async_trait]
impl SlotRepository for InMemorySlotRepository {
    async fn insert(&self, slot: NewSlot) -> Result<Slot> {
        Ok(self.store(&mut *self.slots.write().await, slot))
    }

    async fn find_by_id(&self, slot_id: Uuid) -> Result<Option<Slot>> {
        Ok(self.slots.read().await.get(&slot_id).cloned())
    }

    async fn find_by_start(&self, doctor_id: Uuid, start_time: DateTime<FixedOffset>) -> Result<Option<Slot>> {
        Ok(self
            .slots
            .read()
            .await
            .values()
            .find(|s| s.doctor_id == doctor_id && s.start_time == start_time)
            .cloned())
    }

    async fn find_available(&self, doctor_id: Uuid, not_before: DateTime<Utc>) -> Result<Vec<Slot>> {
        let slots = self.slots.read().await;
        Ok(Self::sorted(
            slots
                .values()
                .filter(|s| s.doctor_id == doctor_id && !s.is_booked && s.start_time >= not_before)
                .cloned()
                .collect(),
        ))
    }

    async fn find_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Slot>> {
        let slots = self.slots.read().await;
        Ok(Self::sorted(
            slots.values().filter(|s| s.doctor_id == doctor_id).cloned().collect(),
        ))
    }

    async fn update_by_id(&self, slot_id: Uuid, patch: &SlotPatch) -> Result<Option<Slot>> {
        let mut slots = self.slots.write().await;
        Ok(slots.get_mut(&slot_id).map(|slot| {
            patch.apply(slot);
            slot.clone()
        }))
    }

    async fn delete_by_id(&self, slot_id: Uuid) -> Result<Option<Slot>> {
        Ok(self.slots.write().await.remove(&slot_id))
    }

    async fn reserve(&self, slot_id: Uuid) -> Result<bool> {
        let mut slots = self.slots.write().await;
        match slots.get_mut(&slot_id) {
            Some(slot) if !slot.is_booked => {
                slot.is_booked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, slot_id: Uuid) -> Result<bool> {
        let mut slots = self.slots.write().await;
        match slots.get_mut(&slot_id) {
            Some(slot) if slot.is_booked => {
                slot.is_booked = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Check and insert under one lock, so concurrent batches cannot both insert
    /// the same start.
    async fn insert_batch(&self, batch: Vec<NewSlot>) -> Result<InsertOutcome> {
        let mut slots = self.slots.write().await;
        let mut outcome = InsertOutcome::default();
        for slot in batch {
            let exists = slots
                .values()
                .any(|s| s.doctor_id == slot.doctor_id && s.start_time == slot.start_time);
            if exists {
                outcome.skipped += 1;
                continue;
            }
            outcome.inserted.push(self.store(&mut slots, slot));
        }
        Ok(outcome)
    }
}
