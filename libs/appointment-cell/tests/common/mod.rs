#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use uuid::Uuid;

use appointment_cell::models::{Appointment, AppointmentError, BookingConfirmation};
use appointment_cell::services::{
    BookingEngine, InMemoryAppointmentRepository, LogNotificationSender, NotificationSender,
};
use appointment_cell::AppointmentCellState;
use doctor_cell::models::{Doctor, NewSlot, Slot, SlotsBooked};
use doctor_cell::services::{DoctorRepository, InMemoryDoctorRepository, InMemorySlotRepository, SlotRepository};
use patient_cell::models::Patient;
use patient_cell::services::{InMemoryPatientRepository, PatientRepository};
use shared_config::SchedulingConfig;
use shared_models::auth::{Role, User};
use shared_utils::clock::FixedClock;
use shared_utils::test_utils::{TestConfig, TestUser};

pub const SLOT_DATE: &str = "6_1_2025";
pub const SLOT_TIME: &str = "2025-01-06T09:00:00Z";

pub fn instant(raw: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(raw).unwrap()
}

pub fn now() -> DateTime<Utc> {
    instant("2025-01-01T00:00:00Z").with_timezone(&Utc)
}

pub fn doctor(id: Uuid) -> Doctor {
    Doctor {
        id,
        name: "Dr. Arjun Mehta".to_string(),
        email: "arjun@clinic.test".to_string(),
        image: None,
        speciality: "General physician".to_string(),
        degree: Some("MBBS".to_string()),
        experience: Some("4 Years".to_string()),
        about: None,
        available: true,
        fees: Some(500),
        address: None,
        slots_booked: SlotsBooked::new(),
        version: 0,
        created_at: None,
    }
}

pub fn patient(id: Uuid, wallet_balance: i64) -> Patient {
    Patient {
        id,
        name: "Meera Nair".to_string(),
        email: "meera@mail.test".to_string(),
        phone: Some("+91 98450 00000".to_string()),
        image: None,
        wallet_balance,
        created_at: None,
    }
}

pub struct Harness {
    pub state: Arc<AppointmentCellState>,
    pub config: TestConfig,
    pub doctors: Arc<InMemoryDoctorRepository>,
    pub slots: Arc<InMemorySlotRepository>,
    pub appointments: Arc<InMemoryAppointmentRepository>,
    pub patients: Arc<InMemoryPatientRepository>,
    pub clock: Arc<FixedClock>,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_notifier(Arc::new(LogNotificationSender))
    }

    pub fn with_notifier(notifier: Arc<dyn NotificationSender>) -> Self {
        Self::build(notifier, TestConfig::default(), |patients| patients as Arc<dyn PatientRepository>)
    }

    /// Route the engine's patient reads and wallet writes through `wrap`.
    pub fn with_patient_store<F>(wrap: F) -> Self
    where
        F: FnOnce(Arc<InMemoryPatientRepository>) -> Arc<dyn PatientRepository>,
    {
        Self::build(Arc::new(LogNotificationSender), TestConfig::default(), wrap)
    }

    pub fn in_timezone(scheduling: SchedulingConfig) -> Self {
        let config = TestConfig {
            scheduling,
            ..TestConfig::default()
        };
        Self::build(Arc::new(LogNotificationSender), config, |patients| patients as Arc<dyn PatientRepository>)
    }

    fn build<F>(notifier: Arc<dyn NotificationSender>, config: TestConfig, wrap: F) -> Self
    where
        F: FnOnce(Arc<InMemoryPatientRepository>) -> Arc<dyn PatientRepository>,
    {
        let doctor_id = Uuid::new_v4();
        let patient_id = Uuid::new_v4();

        let doctors = Arc::new(InMemoryDoctorRepository::with_doctors([doctor(doctor_id)]));
        let slots = Arc::new(InMemorySlotRepository::new());
        let appointments = Arc::new(InMemoryAppointmentRepository::new());
        let patients = Arc::new(InMemoryPatientRepository::with_patients([patient(patient_id, 1_000)]));
        let clock = Arc::new(FixedClock::new(now()));

        let state = AppointmentCellState::new(
            config.to_arc(),
            doctors.clone(),
            slots.clone(),
            appointments.clone(),
            wrap(patients.clone()),
            notifier,
            clock.clone(),
        );

        Self {
            state: Arc::new(state),
            config,
            doctors,
            slots,
            appointments,
            patients,
            clock,
            doctor_id,
            patient_id,
        }
    }

    pub fn engine(&self) -> BookingEngine {
        BookingEngine::new(&self.state)
    }

    pub fn patient_user(&self) -> User {
        TestUser::with_id(self.patient_id, Role::Patient).to_user()
    }

    pub fn doctor_user(&self) -> User {
        TestUser::with_id(self.doctor_id, Role::Doctor).to_user()
    }

    pub fn stranger(&self) -> User {
        TestUser::patient("stranger@mail.test").to_user()
    }

    pub fn admin(&self) -> User {
        TestUser::admin("admin@clinic.test").to_user()
    }

    /// Publish a 30 minute slot starting at `start`.
    pub async fn publish_slot(&self, start: &str) -> Slot {
        let start = instant(start);
        self.slots
            .insert(NewSlot {
                doctor_id: self.doctor_id,
                date: start.date_naive(),
                start_time: start,
                end_time: start + Duration::minutes(30),
            })
            .await
            .unwrap()
    }

    pub async fn book(&self, slot_date: &str, slot_time: &str) -> Result<BookingConfirmation, AppointmentError> {
        self.engine()
            .book(&self.doctor_id.to_string(), slot_date, slot_time, self.patient_id)
            .await
    }

    pub async fn book_default(&self) -> String {
        self.book(SLOT_DATE, SLOT_TIME).await.unwrap().appointment_id
    }

    pub async fn stored_doctor(&self) -> Doctor {
        self.doctors.find_by_id(self.doctor_id).await.unwrap().unwrap()
    }

    pub async fn stored_slot(&self, slot_id: Uuid) -> Slot {
        self.slots.find_by_id(slot_id).await.unwrap().unwrap()
    }

    pub async fn stored_appointment(&self, appointment_id: &str) -> Appointment {
        use appointment_cell::services::AppointmentRepository;
        self.appointments.find_by_id(appointment_id).await.unwrap().unwrap()
    }

    pub async fn balance(&self) -> i64 {
        self.patients
            .find_by_id(self.patient_id)
            .await
            .unwrap()
            .unwrap()
            .wallet_balance
    }
}
