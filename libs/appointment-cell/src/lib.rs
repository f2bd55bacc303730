pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

use std::sync::Arc;

use chrono::FixedOffset;

use doctor_cell::services::{DoctorRepository, SlotRepository};
use patient_cell::services::PatientRepository;
use shared_config::AppConfig;
use shared_utils::clock::Clock;

pub use models::*;
pub use router::*;
pub use services::*;

/// Everything the booking engine touches. Doctors and slots are the same
/// repositories the doctor cell serves from.
pub struct AppointmentCellState {
    pub config: Arc<AppConfig>,
    pub doctors: Arc<dyn DoctorRepository>,
    pub slots: Arc<dyn SlotRepository>,
    pub appointments: Arc<dyn AppointmentRepository>,
    pub patients: Arc<dyn PatientRepository>,
    pub notifier: Arc<dyn NotificationSender>,
    pub clock: Arc<dyn Clock>,
}

impl AppointmentCellState {
    pub fn new(
        config: Arc<AppConfig>,
        doctors: Arc<dyn DoctorRepository>,
        slots: Arc<dyn SlotRepository>,
        appointments: Arc<dyn AppointmentRepository>,
        patients: Arc<dyn PatientRepository>,
        notifier: Arc<dyn NotificationSender>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            doctors,
            slots,
            appointments,
            patients,
            notifier,
            clock,
        }
    }

    pub fn timezone(&self) -> FixedOffset {
        self.config.scheduling.timezone()
    }
}
