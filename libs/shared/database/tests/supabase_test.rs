use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_database::supabase::SupabaseClient;

#[derive(Debug, Deserialize, PartialEq)]
struct Row {
    id: i32,
    name: String,
}

#[tokio::test]
async fn select_sends_service_key_and_decodes_rows() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", "eq.1"))
        .and(header("apikey", "service-key"))
        .and(header("authorization", "Bearer service-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1, "name": "Dr. Rao" }])))
        .mount(&mock_server)
        .await;

    let client = SupabaseClient::with_base_url(&mock_server.uri(), "service-key");
    let rows: Vec<Row> = client.select("doctors?id=eq.1").await.unwrap();

    assert_eq!(rows, vec![Row { id: 1, name: "Dr. Rao".to_string() }]);
}

#[tokio::test]
async fn update_requests_representation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/slots"))
        .and(header("prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let client = SupabaseClient::with_base_url(&mock_server.uri(), "service-key");
    let rows: Vec<Row> = client
        .update("slots?id=eq.1&is_booked=eq.false", json!({ "is_booked": true }))
        .await
        .unwrap();

    assert!(rows.is_empty());
}

#[tokio::test]
async fn empty_no_content_body_decodes_as_no_rows() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/slots"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let client = SupabaseClient::with_base_url(&mock_server.uri(), "service-key");
    let rows: Vec<Row> = client.delete("slots?id=eq.1").await.unwrap();

    assert!(rows.is_empty());
}

#[tokio::test]
async fn maps_error_statuses() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&mock_server)
        .await;

    let client = SupabaseClient::with_base_url(&mock_server.uri(), "wrong");
    let err = client.select::<Row>("doctors").await.unwrap_err();

    assert!(err.to_string().starts_with("Authentication error"));
}
