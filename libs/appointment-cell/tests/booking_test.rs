mod common;

use assert_matches::assert_matches;
use chrono::Duration;
use futures::future::join_all;
use uuid::Uuid;

use appointment_cell::models::{AppointmentError, AppointmentStatus};
use doctor_cell::models::{BookedEntry, SlotsBooked};
use doctor_cell::services::AvailabilityService;
use doctor_cell::DoctorCellState;
use shared_config::SchedulingConfig;

use common::{doctor, instant, Harness, SLOT_DATE, SLOT_TIME};

fn entry(date: &str, time: &str) -> BookedEntry {
    BookedEntry {
        date: date.to_string(),
        time: time.to_string(),
    }
}

#[tokio::test]
async fn booking_records_appointment_and_index_entry() {
    let h = Harness::new();

    let confirmation = h.book(SLOT_DATE, SLOT_TIME).await.unwrap();
    let appointment = h.stored_appointment(&confirmation.appointment_id).await;

    assert_eq!(appointment.amount, 500);
    assert!(!appointment.payment);
    assert!(!appointment.cancelled);
    assert!(!appointment.is_completed);
    assert_eq!(appointment.status(), AppointmentStatus::BookedUnpaid);
    assert_eq!(appointment.slot_date, "6_1_2025");
    assert_eq!(appointment.slot_time, instant(SLOT_TIME));
    assert_eq!(appointment.user_data.email, "meera@mail.test");
    assert_eq!(appointment.doc_data.fees, 500);

    let doctor = h.stored_doctor().await;
    assert_eq!(doctor.slots_booked.entries_for("6_1_2025"), &[entry("2025-01-06", "09:00")]);
    assert_eq!(doctor.slots_booked.len(), 1);
}

#[tokio::test]
async fn appointment_id_is_prefix_millis_and_digit() {
    let h = Harness::new();

    let id = h.book_default().await;

    // 2025-01-01T00:00:00Z is 1735689600000 ms
    assert_eq!(id.len(), 10);
    assert!(id.starts_with("APT600000"));
    assert!(id[3..].chars().all(|c| c.is_ascii_digit()));
}

#[tokio::test]
async fn same_instant_cannot_be_booked_twice() {
    let h = Harness::new();
    h.book_default().await;

    let second = h.book(SLOT_DATE, SLOT_TIME).await;

    assert_matches!(second, Err(AppointmentError::SlotUnavailable));
    assert_eq!(h.appointments.len().await, 1);
    assert_eq!(h.stored_doctor().await.slots_booked.len(), 1);
}

#[tokio::test]
async fn concurrent_bookings_have_one_winner() {
    let h = Harness::new();
    let slot = h.publish_slot(SLOT_TIME).await;

    let engines: Vec<_> = (0..5).map(|_| h.engine()).collect();
    let doctor_id = h.doctor_id.to_string();
    let results = join_all(
        engines
            .iter()
            .map(|engine| engine.book(&doctor_id, SLOT_DATE, SLOT_TIME, h.patient_id)),
    )
    .await;

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert_matches!(result, Err(AppointmentError::SlotUnavailable));
    }
    assert_eq!(h.appointments.len().await, 1);
    assert_eq!(h.stored_doctor().await.slots_booked.len(), 1);
    assert!(h.stored_slot(slot.id).await.is_booked);
}

#[tokio::test]
async fn concurrent_bookings_without_published_slot_have_one_winner() {
    let h = Harness::new();

    let engines: Vec<_> = (0..4).map(|_| h.engine()).collect();
    let doctor_id = h.doctor_id.to_string();
    let results = join_all(
        engines
            .iter()
            .map(|engine| engine.book(&doctor_id, SLOT_DATE, SLOT_TIME, h.patient_id)),
    )
    .await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(h.stored_doctor().await.slots_booked.len(), 1);
}

#[tokio::test]
async fn booked_slot_leaves_available_listing() {
    let h = Harness::new();
    let booked = h.publish_slot(SLOT_TIME).await;
    let other = h.publish_slot("2025-01-06T10:00:00Z").await;

    let doctor_state = DoctorCellState::new(
        h.config.to_arc(),
        h.doctors.clone(),
        h.slots.clone(),
        h.clock.clone(),
    );
    let before = AvailabilityService::new(&doctor_state).list_available(h.doctor_id).await.unwrap();
    assert_eq!(before.len(), 2);

    h.book_default().await;

    assert!(h.stored_slot(booked.id).await.is_booked);
    let after = AvailabilityService::new(&doctor_state).list_available(h.doctor_id).await.unwrap();
    assert_eq!(after.iter().map(|s| s.id).collect::<Vec<_>>(), vec![other.id]);
}

#[tokio::test]
async fn two_slots_on_one_day_share_the_key() {
    let h = Harness::new();

    h.book(SLOT_DATE, SLOT_TIME).await.unwrap();
    h.book(SLOT_DATE, "2025-01-06T11:30:00Z").await.unwrap();

    let doctor = h.stored_doctor().await;
    assert_eq!(
        doctor.slots_booked.entries_for("6_1_2025"),
        &[entry("2025-01-06", "09:00"), entry("2025-01-06", "11:30")]
    );
}

#[tokio::test]
async fn padded_day_key_is_stored_canonically() {
    let h = Harness::new();

    let id = h.book("06_01_2025", SLOT_TIME).await.unwrap().appointment_id;

    assert_eq!(h.stored_appointment(&id).await.slot_date, "6_1_2025");
    assert_eq!(h.stored_doctor().await.slots_booked.entries_for("6_1_2025").len(), 1);
}

#[tokio::test]
async fn calendar_day_follows_configured_offset() {
    let h = Harness::in_timezone(SchedulingConfig::default());

    // 20:00 UTC on the 6th is 01:30 on the 7th at +05:30
    let result = h.book("6_1_2025", "2025-01-06T20:00:00Z").await;
    assert_matches!(result, Err(AppointmentError::ValidationError(_)));

    let id = h.book("7_1_2025", "2025-01-06T20:00:00Z").await.unwrap().appointment_id;
    let appointment = h.stored_appointment(&id).await;
    assert_eq!(appointment.slot_time.to_rfc3339(), "2025-01-07T01:30:00+05:30");
    assert_eq!(
        h.stored_doctor().await.slots_booked.entries_for("7_1_2025"),
        &[entry("2025-01-07", "01:30")]
    );
}

#[tokio::test]
async fn malformed_requests_are_rejected() {
    let h = Harness::new();

    assert_matches!(
        h.book("7_1_2025", SLOT_TIME).await,
        Err(AppointmentError::ValidationError(_))
    );
    assert_matches!(
        h.book("2025-01-06", SLOT_TIME).await,
        Err(AppointmentError::ValidationError(_))
    );
    assert_matches!(
        h.book(SLOT_DATE, "6 Jan 2025 9am").await,
        Err(AppointmentError::ValidationError(_))
    );
    assert_matches!(
        h.engine().book("not-a-uuid", SLOT_DATE, SLOT_TIME, h.patient_id).await,
        Err(AppointmentError::ValidationError(_))
    );
    assert!(h.stored_doctor().await.slots_booked.is_empty());
}

#[tokio::test]
async fn past_slot_time_is_rejected() {
    let h = Harness::new();
    h.clock.advance(Duration::days(6) + Duration::hours(10));

    let result = h.book(SLOT_DATE, SLOT_TIME).await;

    assert_matches!(result, Err(AppointmentError::ValidationError(msg)) if msg.contains("past"));
}

#[tokio::test]
async fn doctor_must_exist_be_available_and_have_fees() {
    let h = Harness::new();

    assert_matches!(
        h.engine().book(&Uuid::new_v4().to_string(), SLOT_DATE, SLOT_TIME, h.patient_id).await,
        Err(AppointmentError::DoctorNotFound)
    );

    let mut off_duty = doctor(h.doctor_id);
    off_duty.available = false;
    h.doctors.upsert(off_duty).await;
    assert_matches!(h.book(SLOT_DATE, SLOT_TIME).await, Err(AppointmentError::DoctorUnavailable));

    let mut no_fees = doctor(h.doctor_id);
    no_fees.fees = None;
    h.doctors.upsert(no_fees).await;
    assert_matches!(h.book(SLOT_DATE, SLOT_TIME).await, Err(AppointmentError::FeesMissing));
}

#[tokio::test]
async fn unknown_user_leaves_no_reservation() {
    let h = Harness::new();
    let slot = h.publish_slot(SLOT_TIME).await;

    let result = h
        .engine()
        .book(&h.doctor_id.to_string(), SLOT_DATE, SLOT_TIME, Uuid::new_v4())
        .await;

    assert_matches!(result, Err(AppointmentError::UserNotFound));
    assert!(h.stored_doctor().await.slots_booked.is_empty());
    assert!(!h.stored_slot(slot.id).await.is_booked);
    assert_eq!(h.appointments.len().await, 0);
}

#[tokio::test]
async fn legacy_index_entry_blocks_booking() {
    let h = Harness::new();
    let mut legacy = doctor(h.doctor_id);
    let mut booked = SlotsBooked::new();
    booked.insert(SLOT_DATE, entry("2025-01-06", "09:00"));
    legacy.slots_booked = booked;
    h.doctors.upsert(legacy).await;

    assert_matches!(h.book(SLOT_DATE, SLOT_TIME).await, Err(AppointmentError::SlotUnavailable));
}

#[tokio::test]
async fn bookings_are_listed_newest_first() {
    let h = Harness::new();
    let first = h.book_default().await;
    h.clock.advance(Duration::minutes(1));
    let second = h.book(SLOT_DATE, "2025-01-06T10:00:00Z").await.unwrap().appointment_id;

    let engine = h.engine();
    let mine = engine.appointments_for_user(h.patient_id).await.unwrap();
    let theirs = engine.appointments_for_doctor(h.doctor_id).await.unwrap();

    let ids: Vec<_> = mine.iter().map(|a| a.appointment_id.clone()).collect();
    assert_eq!(ids, vec![second.clone(), first.clone()]);
    assert_eq!(theirs.len(), 2);
    assert!(engine.appointments_for_user(Uuid::new_v4()).await.unwrap().is_empty());
}

#[tokio::test]
async fn snapshot_is_not_resynchronized() {
    let h = Harness::new();
    let id = h.book_default().await;

    let mut renamed = h.stored_doctor().await;
    renamed.name = "Dr. A. Mehta".to_string();
    renamed.fees = Some(800);
    h.doctors.upsert(renamed).await;

    let appointment = h.stored_appointment(&id).await;
    assert_eq!(appointment.doc_data.name, "Dr. Arjun Mehta");
    assert_eq!(appointment.amount, 500);
}
