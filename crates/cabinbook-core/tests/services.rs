use std::net::TcpListener;
use std::sync::Arc;

use anyhow::Result;
use cabinbook_core::models::{ProfileUpdate, SlotInput, TherapistRegistration, User};
use cabinbook_core::{ApiClient, ErrorKind, SessionStore};
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn alice() -> User {
    User {
        id: 7,
        username: "alice".to_string(),
        email: String::new(),
        first_name: String::new(),
        last_name: String::new(),
        phone_number: String::new(),
        is_therapist: true,
        is_admin: false,
    }
}

#[tokio::test]
async fn profile_update_merges_into_identity() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/therapist/profile/"))
        .and(header("Authorization", "Bearer A1"))
        .and(body_json(json!({"first_name": "Alice", "phone_number": "555-0100"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7,
            "username": "alice",
            "email": "alice@example.com",
            "first_name": "Alice",
            "last_name": "Moreau",
            "phone_number": "555-0100",
            "is_therapist": true,
            "is_admin": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = Arc::new(SessionStore::in_memory());
    session.login(alice(), "A1".to_string(), Some("R1".to_string()))?;
    let api = ApiClient::new(format!("{}/api", server.uri()), Arc::clone(&session))?;

    let update = ProfileUpdate {
        first_name: Some("Alice".to_string()),
        phone_number: Some("555-0100".to_string()),
        ..Default::default()
    };
    api.update_therapist_profile(&update).await?;

    let user = session.user().expect("identity kept");
    assert_eq!(user.display_name(), "Alice Moreau");
    assert_eq!(user.email, "alice@example.com");
    assert!(user.is_therapist);
    assert!(session.is_authenticated());
    Ok(())
}

#[tokio::test]
async fn inverted_slot_is_rejected_locally() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/admin/slots/create/"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let session = Arc::new(SessionStore::in_memory());
    let api = ApiClient::new(format!("{}/api/", server.uri()), session)?;

    let start = Utc.with_ymd_and_hms(2026, 11, 2, 10, 0, 0).unwrap();
    let slot = SlotInput {
        cabin: 3,
        start_time: start,
        end_time: start - Duration::hours(1),
        price: "45.00".to_string(),
    };
    let err = api
        .create_available_slot(&slot)
        .await
        .expect_err("slot should be rejected");
    assert_eq!(err.kind(), ErrorKind::Validation);
    let fields = err.field_errors().expect("field errors");
    assert_eq!(fields.get("end_time"), Some("End time must be after start time."));
    assert_eq!(fields.len(), 1);
    server.verify().await;
    Ok(())
}

#[tokio::test]
async fn registration_errors_are_per_field() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/register/therapist/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "password": "Password fields didn't match."
        })))
        .mount(&server)
        .await;

    let api = ApiClient::new(
        format!("{}/api/", server.uri()),
        Arc::new(SessionStore::in_memory()),
    )?;
    let registration = TherapistRegistration {
        username: "bob".to_string(),
        password: "one".to_string(),
        password2: "two".to_string(),
        ..Default::default()
    };
    let err = api
        .register_therapist(&registration)
        .await
        .expect_err("registration should fail");

    let fields = err.field_errors().expect("validation error");
    assert_eq!(fields.get("password"), Some("Password fields didn't match."));
    Ok(())
}

#[tokio::test]
async fn refreshed_token_survives_restart() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    let dir = TempDir::new()?;

    Mock::given(method("GET"))
        .and(path("/api/admin/cabins/"))
        .and(header("Authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/cabins/"))
        .and(header("Authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "name": "Cedar", "description": "", "capacity": 2}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "A2"})))
        .mount(&server)
        .await;

    {
        let session = Arc::new(SessionStore::open(dir.path()));
        session.login(alice(), "A1".to_string(), Some("R1".to_string()))?;
        let api = ApiClient::new(format!("{}/api/", server.uri()), session)?;
        let cabins = api.cabins().await?;
        assert_eq!(cabins.len(), 1);
        assert_eq!(cabins[0].display_capacity(), "2 people");
    }

    let reopened = SessionStore::open(dir.path());
    assert_eq!(reopened.access_token().as_deref(), Some("A2"));
    assert_eq!(reopened.refresh_token().as_deref(), Some("R1"));
    assert_eq!(reopened.user(), Some(alice()));
    Ok(())
}
