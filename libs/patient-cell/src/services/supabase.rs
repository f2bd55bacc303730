use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::Patient;
use crate::services::repository::PatientRepository;

/// `users` table access.
pub struct SupabasePatientRepository {
    supabase: Arc<SupabaseClient>,
}

impl SupabasePatientRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl PatientRepository for SupabasePatientRepository {
    async fn find_by_id(&self, patient_id: Uuid) -> Result<Option<Patient>> {
        let rows: Vec<Patient> = self.supabase.select(&format!("users?id=eq.{}", patient_id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Patient>> {
        let query = format!("users?email=eq.{}", urlencoding::encode(email));
        let rows: Vec<Patient> = self.supabase.select(&query).await?;
        Ok(rows.into_iter().next())
    }

    async fn swap_wallet_balance(&self, patient_id: Uuid, expected: i64, new_balance: i64) -> Result<bool> {
        let query = format!("users?id=eq.{}&wallet_balance=eq.{}", patient_id, expected);
        let rows: Vec<Patient> = self
            .supabase
            .update(&query, json!({ "wallet_balance": new_balance }))
            .await?;

        if rows.is_empty() {
            debug!("Wallet swap for {} lost: balance is no longer {}", patient_id, expected);
        }
        Ok(!rows.is_empty())
    }
}
