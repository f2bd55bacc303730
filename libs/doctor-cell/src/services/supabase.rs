use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Doctor, NewSlot, Slot, SlotPatch, SlotsBooked};
use crate::services::repository::{DoctorRepository, SlotRepository};

fn encode_instant<Tz: TimeZone>(instant: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    urlencoding::encode(&instant.to_rfc3339()).into_owned()
}

/// `doctors` table access.
pub struct SupabaseDoctorRepository {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseDoctorRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl DoctorRepository for SupabaseDoctorRepository {
    async fn find_by_id(&self, doctor_id: Uuid) -> Result<Option<Doctor>> {
        let rows: Vec<Doctor> = self.supabase.select(&format!("doctors?id=eq.{}", doctor_id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Doctor>> {
        let query = format!("doctors?email=eq.{}", urlencoding::encode(email));
        let rows: Vec<Doctor> = self.supabase.select(&query).await?;
        Ok(rows.into_iter().next())
    }

    async fn update_doctor_slots(
        &self,
        doctor_id: Uuid,
        expected_version: i64,
        slots_booked: &SlotsBooked,
    ) -> Result<bool> {
        let query = format!("doctors?id=eq.{}&version=eq.{}", doctor_id, expected_version);
        let rows: Vec<Doctor> = self
            .supabase
            .update(
                &query,
                json!({
                    "slots_booked": slots_booked,
                    "version": expected_version + 1
                }),
            )
            .await?;

        if rows.is_empty() {
            debug!("slots_booked write for doctor {} lost the version race at {}", doctor_id, expected_version);
        }
        Ok(!rows.is_empty())
    }

    async fn update_availability(&self, doctor_id: Uuid, available: bool) -> Result<Option<Doctor>> {
        let rows: Vec<Doctor> = self
            .supabase
            .update(&format!("doctors?id=eq.{}", doctor_id), json!({ "available": available }))
            .await?;
        Ok(rows.into_iter().next())
    }
}

/// `slots` table access.
pub struct SupabaseSlotRepository {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseSlotRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl SlotRepository for SupabaseSlotRepository {
    async fn insert(&self, slot: NewSlot) -> Result<Slot> {
        let rows: Vec<Slot> = self
            .supabase
            .insert(
                "slots",
                json!({
                    "doctor_id": slot.doctor_id,
                    "date": slot.date,
                    "start_time": slot.start_time.to_rfc3339(),
                    "end_time": slot.end_time.to_rfc3339(),
                    "is_booked": false
                }),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("Slot insert for doctor {} returned no rows", slot.doctor_id))
    }

    async fn find_by_id(&self, slot_id: Uuid) -> Result<Option<Slot>> {
        let rows: Vec<Slot> = self.supabase.select(&format!("slots?id=eq.{}", slot_id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_by_start(&self, doctor_id: Uuid, start_time: DateTime<FixedOffset>) -> Result<Option<Slot>> {
        let query = format!(
            "slots?doctor_id=eq.{}&start_time=eq.{}",
            doctor_id,
            encode_instant(&start_time)
        );
        let rows: Vec<Slot> = self.supabase.select(&query).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_available(&self, doctor_id: Uuid, not_before: DateTime<Utc>) -> Result<Vec<Slot>> {
        let query = format!(
            "slots?doctor_id=eq.{}&is_booked=eq.false&start_time=gte.{}&order=start_time.asc",
            doctor_id,
            encode_instant(&not_before)
        );
        self.supabase.select(&query).await
    }

    async fn find_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Slot>> {
        self.supabase
            .select(&format!("slots?doctor_id=eq.{}&order=start_time.asc", doctor_id))
            .await
    }

    async fn update_by_id(&self, slot_id: Uuid, patch: &SlotPatch) -> Result<Option<Slot>> {
        let rows: Vec<Slot> = self
            .supabase
            .update(&format!("slots?id=eq.{}", slot_id), serde_json::to_value(patch)?)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_by_id(&self, slot_id: Uuid) -> Result<Option<Slot>> {
        let rows: Vec<Slot> = self.supabase.delete(&format!("slots?id=eq.{}", slot_id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn reserve(&self, slot_id: Uuid) -> Result<bool> {
        let rows: Vec<Slot> = self
            .supabase
            .update(
                &format!("slots?id=eq.{}&is_booked=eq.false", slot_id),
                json!({ "is_booked": true }),
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn release(&self, slot_id: Uuid) -> Result<bool> {
        let rows: Vec<Slot> = self
            .supabase
            .update(
                &format!("slots?id=eq.{}&is_booked=eq.true", slot_id),
                json!({ "is_booked": false }),
            )
            .await?;
        Ok(!rows.is_empty())
    }
}
