use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::models::*;
use doctor_cell::services::{DoctorRepository, SlotRepository, SupabaseDoctorRepository, SupabaseSlotRepository};
use shared_database::supabase::SupabaseClient;

fn client(server: &MockServer) -> Arc<SupabaseClient> {
    Arc::new(SupabaseClient::with_base_url(&server.uri(), "service-key"))
}

fn doctor_row(id: Uuid, version: i64, slots_booked: Value) -> Value {
    json!({
        "id": id,
        "name": "Dr. Meera Rao",
        "email": "meera@clinic.test",
        "speciality": "General physician",
        "available": true,
        "fees": 500,
        "slots_booked": slots_booked,
        "version": version
    })
}

fn slot_row(id: Uuid, doctor_id: Uuid, start: &str, end: &str, is_booked: bool) -> Value {
    json!({
        "id": id,
        "doctor_id": doctor_id,
        "date": start[..10].to_string(),
        "start_time": start,
        "end_time": end,
        "is_booked": is_booked
    })
}

#[tokio::test]
async fn find_doctor_tolerates_legacy_index() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([doctor_row(doctor_id, 3, Value::Null)])))
        .mount(&mock_server)
        .await;

    let repo = SupabaseDoctorRepository::new(client(&mock_server));
    let doctor = repo.find_by_id(doctor_id).await.unwrap().unwrap();

    assert_eq!(doctor.version, 3);
    assert!(doctor.slots_booked.is_empty());
}

#[tokio::test]
async fn missing_doctor_is_none() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let repo = SupabaseDoctorRepository::new(client(&mock_server));
    assert!(repo.find_by_email("nobody@clinic.test").await.unwrap().is_none());
}

#[tokio::test]
async fn versioned_index_write_filters_on_version() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    let mut booked = SlotsBooked::new();
    booked.insert(
        "6_1_2025",
        BookedEntry {
            date: "2025-01-06".to_string(),
            time: "09:00".to_string(),
        },
    );
    let expected_body = json!({
        "slots_booked": { "6_1_2025": [{ "date": "2025-01-06", "time": "09:00" }] },
        "version": 5
    });

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .and(query_param("version", "eq.4"))
        .and(body_json(&expected_body))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([doctor_row(
            doctor_id,
            5,
            expected_body["slots_booked"].clone()
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("version", "eq.3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let repo = SupabaseDoctorRepository::new(client(&mock_server));
    assert!(repo.update_doctor_slots(doctor_id, 4, &booked).await.unwrap());
    assert!(!repo.update_doctor_slots(doctor_id, 3, &booked).await.unwrap());
}

#[tokio::test]
async fn find_by_start_encodes_offset() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let slot_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/slots"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("start_time", "eq.2025-01-06T09:00:00+05:30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([slot_row(
            slot_id,
            doctor_id,
            "2025-01-06T03:30:00+00:00",
            "2025-01-06T04:00:00+00:00",
            false
        )])))
        .mount(&mock_server)
        .await;

    let repo = SupabaseSlotRepository::new(client(&mock_server));
    let start = DateTime::parse_from_rfc3339("2025-01-06T09:00:00+05:30").unwrap();
    let slot = repo.find_by_start(doctor_id, start).await.unwrap().unwrap();

    assert_eq!(slot.id, slot_id);
    assert_eq!(slot.start_time, start);
}

#[tokio::test]
async fn find_available_asks_for_unbooked_future_slots() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/slots"))
        .and(query_param("is_booked", "eq.false"))
        .and(query_param("start_time", "gte.2025-01-06T08:30:00+00:00"))
        .and(query_param("order", "start_time.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            slot_row(Uuid::new_v4(), doctor_id, "2025-01-06T09:00:00+00:00", "2025-01-06T09:30:00+00:00", false),
            slot_row(Uuid::new_v4(), doctor_id, "2025-01-08T09:00:00+00:00", "2025-01-08T09:30:00+00:00", false)
        ])))
        .mount(&mock_server)
        .await;

    let repo = SupabaseSlotRepository::new(client(&mock_server));
    let not_before = DateTime::parse_from_rfc3339("2025-01-06T08:30:00Z").unwrap().with_timezone(&Utc);
    let slots = repo.find_available(doctor_id, not_before).await.unwrap();

    assert_eq!(slots.len(), 2);
    assert!(slots[0].start_time < slots[1].start_time);
}

#[tokio::test]
async fn reserve_reports_whether_the_flip_happened() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let won = Uuid::new_v4();
    let lost = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/slots"))
        .and(query_param("id", format!("eq.{}", won)))
        .and(query_param("is_booked", "eq.false"))
        .and(body_json(json!({ "is_booked": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([slot_row(
            won,
            doctor_id,
            "2025-01-06T09:00:00+00:00",
            "2025-01-06T09:30:00+00:00",
            true
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/slots"))
        .and(query_param("id", format!("eq.{}", lost)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let repo = SupabaseSlotRepository::new(client(&mock_server));
    assert!(repo.reserve(won).await.unwrap());
    assert!(!repo.reserve(lost).await.unwrap());
}

#[tokio::test]
async fn insert_batch_skips_existing_starts() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    // Monday already exists, Wednesday does not.
    Mock::given(method("GET"))
        .and(path("/rest/v1/slots"))
        .and(query_param("start_time", "eq.2025-01-06T09:00:00+00:00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([slot_row(
            Uuid::new_v4(),
            doctor_id,
            "2025-01-06T09:00:00+00:00",
            "2025-01-06T09:30:00+00:00",
            false
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/slots"))
        .and(query_param("start_time", "eq.2025-01-08T09:00:00+00:00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/slots"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([slot_row(
            Uuid::new_v4(),
            doctor_id,
            "2025-01-08T09:00:00+00:00",
            "2025-01-08T09:30:00+00:00",
            false
        )])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let new_slot = |start: &str, end: &str| {
        let start = DateTime::parse_from_rfc3339(start).unwrap();
        NewSlot {
            doctor_id,
            date: start.date_naive(),
            start_time: start,
            end_time: DateTime::parse_from_rfc3339(end).unwrap(),
        }
    };

    let repo = SupabaseSlotRepository::new(client(&mock_server));
    let outcome = repo
        .insert_batch(vec![
            new_slot("2025-01-06T09:00:00+00:00", "2025-01-06T09:30:00+00:00"),
            new_slot("2025-01-08T09:00:00+00:00", "2025-01-08T09:30:00+00:00"),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.inserted.len(), 1);
}

#[tokio::test]
async fn storage_failures_surface_as_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/slots"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let repo = SupabaseSlotRepository::new(client(&mock_server));
    assert!(repo.find_by_doctor(Uuid::new_v4()).await.is_err());
}
