use std::sync::Arc;

use axum::{routing::get, Router};
use tracing::info;

use appointment_cell::router::appointment_routes;
use appointment_cell::services::{
    AppointmentRepository, EmailNotificationSender, InMemoryAppointmentRepository, LogNotificationSender,
    NotificationSender, SupabaseAppointmentRepository,
};
use appointment_cell::AppointmentCellState;
use doctor_cell::router::doctor_routes;
use doctor_cell::services::{
    DoctorRepository, InMemoryDoctorRepository, InMemorySlotRepository, SlotRepository, SupabaseDoctorRepository,
    SupabaseSlotRepository,
};
use doctor_cell::DoctorCellState;
use patient_cell::router::create_patient_router;
use patient_cell::services::{InMemoryPatientRepository, PatientRepository, SupabasePatientRepository};
use patient_cell::PatientCellState;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::clock::{Clock, SystemClock};

/// Storage and outbound collaborators shared by every cell.
pub struct Backends {
    pub doctors: Arc<dyn DoctorRepository>,
    pub slots: Arc<dyn SlotRepository>,
    pub patients: Arc<dyn PatientRepository>,
    pub appointments: Arc<dyn AppointmentRepository>,
    pub notifier: Arc<dyn NotificationSender>,
    pub clock: Arc<dyn Clock>,
}

impl Backends {
    /// Document store when configured, in-memory otherwise. Same for mail.
    pub fn from_config(config: &AppConfig) -> Self {
        let notifier: Arc<dyn NotificationSender> = if config.is_mail_configured() {
            Arc::new(EmailNotificationSender::new(config))
        } else {
            Arc::new(LogNotificationSender)
        };

        if config.is_configured() {
            info!("Using document store at {}", config.supabase_url);
            let supabase = Arc::new(SupabaseClient::new(config));
            Self {
                doctors: Arc::new(SupabaseDoctorRepository::new(supabase.clone())),
                slots: Arc::new(SupabaseSlotRepository::new(supabase.clone())),
                patients: Arc::new(SupabasePatientRepository::new(supabase.clone())),
                appointments: Arc::new(SupabaseAppointmentRepository::new(supabase)),
                notifier,
                clock: Arc::new(SystemClock),
            }
        } else {
            let clock: Arc<dyn Clock> = Arc::new(SystemClock);
            Self {
                doctors: Arc::new(InMemoryDoctorRepository::new()),
                slots: Arc::new(InMemorySlotRepository::with_clock(clock.clone())),
                patients: Arc::new(InMemoryPatientRepository::new()),
                appointments: Arc::new(InMemoryAppointmentRepository::new()),
                notifier,
                clock,
            }
        }
    }
}

pub fn create_router(config: Arc<AppConfig>, backends: Backends) -> Router {
    let doctor_state = Arc::new(DoctorCellState::new(
        config.clone(),
        backends.doctors.clone(),
        backends.slots.clone(),
        backends.clock.clone(),
    ));
    let patient_state = Arc::new(PatientCellState::new(config.clone(), backends.patients.clone()));
    let appointment_state = Arc::new(AppointmentCellState::new(
        config,
        backends.doctors,
        backends.slots,
        backends.appointments,
        backends.patients,
        backends.notifier,
        backends.clock,
    ));

    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .nest("/doctors", doctor_routes(doctor_state))
        .nest("/patients", create_patient_router(patient_state))
        .nest("/appointments", appointment_routes(appointment_state))
}
