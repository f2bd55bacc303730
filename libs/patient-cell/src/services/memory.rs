use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::Patient;
use crate::services::repository::PatientRepository;

#[derive(Default)]
pub struct InMemoryPatientRepository {
    patients: RwLock<HashMap<Uuid, Patient>>,
}

impl InMemoryPatientRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patients(patients: impl IntoIterator<Item = Patient>) -> Self {
        Self {
            patients: RwLock::new(patients.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    pub async fn upsert(&self, patient: Patient) {
        self.patients.write().await.insert(patient.id, patient);
    }
}

#[async_trait]
impl PatientRepository for InMemoryPatientRepository {
    async fn find_by_id(&self, patient_id: Uuid) -> Result<Option<Patient>> {
        Ok(self.patients.read().await.get(&patient_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Patient>> {
        Ok(self
            .patients
            .read()
            .await
            .values()
            .find(|p| p.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn swap_wallet_balance(&self, patient_id: Uuid, expected: i64, new_balance: i64) -> Result<bool> {
        let mut patients = self.patients.write().await;
        match patients.get_mut(&patient_id) {
            Some(patient) if patient.wallet_balance == expected => {
                patient.wallet_balance = new_balance;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
