use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use doctor_cell::models::{Doctor, DoctorAddress};
use patient_cell::models::{Patient, PatientError};
use shared_models::error::AppError;

// ==============================================================================
// APPOINTMENT
// ==============================================================================

/// A booked consultation. `user_data` and `doc_data` are captured once at
/// booking time and never resynchronized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub appointment_id: String,
    pub user_id: Uuid,
    pub doc_id: Uuid,
    /// `D_M_YYYY` day key into the doctor's booking index.
    pub slot_date: String,
    pub slot_time: DateTime<FixedOffset>,
    pub user_data: PatientSnapshot,
    pub doc_data: DoctorSnapshot,
    pub amount: i64,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub payment: bool,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub wallet_used: i64,
    /// Set once the cancellation refund has been claimed.
    #[serde(default)]
    pub refund_issued: bool,
    /// Set once the cancellation has freed the booking records.
    #[serde(default)]
    pub slot_released: bool,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn status(&self) -> AppointmentStatus {
        if self.cancelled {
            AppointmentStatus::Cancelled
        } else if self.is_completed {
            AppointmentStatus::Completed
        } else if self.payment {
            AppointmentStatus::BookedPaid
        } else {
            AppointmentStatus::BookedUnpaid
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientSnapshot {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl From<&Patient> for PatientSnapshot {
    fn from(patient: &Patient) -> Self {
        Self {
            id: patient.id,
            name: patient.name.clone(),
            email: patient.email.clone(),
            phone: patient.phone.clone(),
            image: patient.image.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorSnapshot {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub speciality: String,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub fees: i64,
    #[serde(default)]
    pub address: Option<DoctorAddress>,
}

impl DoctorSnapshot {
    pub fn capture(doctor: &Doctor, fees: i64) -> Self {
        Self {
            id: doctor.id,
            name: doctor.name.clone(),
            email: doctor.email.clone(),
            speciality: doctor.speciality.clone(),
            degree: doctor.degree.clone(),
            image: doctor.image.clone(),
            fees,
            address: doctor.address.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    BookedUnpaid,
    BookedPaid,
    Completed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::BookedUnpaid => write!(f, "booked_unpaid"),
            AppointmentStatus::BookedPaid => write!(f, "booked_paid"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Flags a conditional update requires to still hold. `None` means "don't care".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentGuard {
    pub cancelled: Option<bool>,
    pub payment: Option<bool>,
    pub is_completed: Option<bool>,
    pub refund_issued: Option<bool>,
    pub slot_released: Option<bool>,
}

impl AppointmentGuard {
    /// Neither cancelled nor completed.
    pub fn active() -> Self {
        Self {
            cancelled: Some(false),
            is_completed: Some(false),
            ..Default::default()
        }
    }

    pub fn cancelled() -> Self {
        Self {
            cancelled: Some(true),
            ..Default::default()
        }
    }

    pub fn with_payment(mut self, payment: bool) -> Self {
        self.payment = Some(payment);
        self
    }

    pub fn with_refund_issued(mut self, refund_issued: bool) -> Self {
        self.refund_issued = Some(refund_issued);
        self
    }

    pub fn with_slot_released(mut self, slot_released: bool) -> Self {
        self.slot_released = Some(slot_released);
        self
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.cancelled.map_or(true, |v| appointment.cancelled == v)
            && self.payment.map_or(true, |v| appointment.payment == v)
            && self.is_completed.map_or(true, |v| appointment.is_completed == v)
            && self.refund_issued.map_or(true, |v| appointment.refund_issued == v)
            && self.slot_released.map_or(true, |v| appointment.slot_released == v)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppointmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_used: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_issued: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_released: Option<bool>,
}

impl AppointmentPatch {
    pub fn apply(&self, appointment: &mut Appointment) {
        if let Some(cancelled) = self.cancelled {
            appointment.cancelled = cancelled;
        }
        if let Some(payment) = self.payment {
            appointment.payment = payment;
        }
        if let Some(is_completed) = self.is_completed {
            appointment.is_completed = is_completed;
        }
        if let Some(wallet_used) = self.wallet_used {
            appointment.wallet_used = wallet_used;
        }
        if let Some(refund_issued) = self.refund_issued {
            appointment.refund_issued = refund_issued;
        }
        if let Some(slot_released) = self.slot_released {
            appointment.slot_released = slot_released;
        }
    }
}

// ==============================================================================
// REQUESTS AND RESPONSES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doc_id: String,
    /// `D_M_YYYY`
    pub slot_date: String,
    /// RFC 3339 instant.
    pub slot_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub appointment_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationConfirmation {
    pub appointment_id: String,
    pub message: String,
    pub already_cancelled: bool,
    /// Amount returned to the wallet, if any.
    pub refunded: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub appointment_id: String,
    pub message: String,
    pub wallet_used: i64,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Doctor is not available")]
    DoctorUnavailable,

    #[error("Doctor has no consultation fee set")]
    FeesMissing,

    #[error("Slot not available")]
    SlotUnavailable,

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Insufficient wallet balance: {balance} available, {required} required")]
    InsufficientBalance { balance: i64, required: i64 },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppointmentError {
    pub fn database(e: impl fmt::Display) -> Self {
        AppointmentError::Database(e.to_string())
    }
}

impl From<PatientError> for AppointmentError {
    fn from(e: PatientError) -> Self {
        match e {
            PatientError::NotFound => AppointmentError::UserNotFound,
            PatientError::InsufficientBalance { balance, required } => {
                AppointmentError::InsufficientBalance { balance, required }
            }
            PatientError::InvalidAmount(_) => AppointmentError::Internal(e.to_string()),
            PatientError::Contention | PatientError::Database(_) => AppointmentError::Database(e.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DoctorNotFound
            | AppointmentError::UserNotFound
            | AppointmentError::AppointmentNotFound => AppError::NotFound(e.to_string()),
            AppointmentError::FeesMissing | AppointmentError::InsufficientBalance { .. } => {
                AppError::BadRequest(e.to_string())
            }
            AppointmentError::DoctorUnavailable
            | AppointmentError::SlotUnavailable
            | AppointmentError::InvalidStatusTransition(_) => AppError::Conflict(e.to_string()),
            AppointmentError::Unauthorized => AppError::Forbidden(e.to_string()),
            AppointmentError::Database(msg) => AppError::Database(msg),
            AppointmentError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn appointment() -> Appointment {
        serde_json::from_value(json!({
            "appointment_id": "APT1234567",
            "user_id": Uuid::new_v4(),
            "doc_id": Uuid::new_v4(),
            "slot_date": "6_1_2025",
            "slot_time": "2025-01-06T09:00:00+00:00",
            "user_data": { "id": Uuid::new_v4(), "name": "Anika", "email": "anika@mail.test" },
            "doc_data": {
                "id": Uuid::new_v4(),
                "name": "Dr. Rao",
                "email": "rao@clinic.test",
                "speciality": "General physician",
                "fees": 500
            },
            "amount": 500,
            "created_at": "2025-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn status_follows_flags() {
        let mut appt = appointment();
        assert_eq!(appt.status(), AppointmentStatus::BookedUnpaid);
        appt.payment = true;
        assert_eq!(appt.status(), AppointmentStatus::BookedPaid);
        appt.is_completed = true;
        assert_eq!(appt.status(), AppointmentStatus::Completed);
        appt.cancelled = true;
        assert_eq!(appt.status(), AppointmentStatus::Cancelled);
    }

    #[test]
    fn guard_ignores_unset_flags() {
        let mut appt = appointment();
        assert!(AppointmentGuard::active().matches(&appt));
        assert!(!AppointmentGuard::active().with_payment(true).matches(&appt));

        appt.cancelled = true;
        assert!(!AppointmentGuard::active().matches(&appt));
        assert!(AppointmentGuard::default().matches(&appt));
    }

    #[test]
    fn cancelled_guard_tracks_settlement_claims() {
        let mut appt = appointment();
        let unrefunded = AppointmentGuard::cancelled().with_refund_issued(false);
        assert!(!unrefunded.matches(&appt));

        appt.cancelled = true;
        assert!(unrefunded.matches(&appt));
        assert!(AppointmentGuard::cancelled().with_slot_released(false).matches(&appt));

        AppointmentPatch {
            refund_issued: Some(true),
            ..Default::default()
        }
        .apply(&mut appt);
        assert!(!unrefunded.matches(&appt));
    }

    #[test]
    fn patch_serializes_only_set_fields() {
        let patch = AppointmentPatch {
            payment: Some(true),
            wallet_used: Some(500),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({ "payment": true, "wallet_used": 500 }));
    }

    #[test]
    fn wallet_errors_keep_their_meaning() {
        let e: AppointmentError = PatientError::InsufficientBalance { balance: 10, required: 500 }.into();
        assert!(matches!(e, AppointmentError::InsufficientBalance { balance: 10, required: 500 }));
        let e: AppointmentError = PatientError::NotFound.into();
        assert!(matches!(e, AppointmentError::UserNotFound));
    }
}
