use assert_matches::assert_matches;
use chrono::{FixedOffset, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{
    AppointmentError, AppointmentStatus, CreateAppointmentRequest, UpdateAppointmentRequest,
};
use appointment_cell::services::booking::AppointmentBookingService;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_utils::test_utils::{MockStoreResponses, TestConfig, TestUser};

fn clinic_offset() -> FixedOffset {
    FixedOffset::east_opt(330 * 60).unwrap()
}

fn service_for(mock_server: &MockServer) -> AppointmentBookingService {
    let config = TestConfig::with_store_url(&mock_server.uri()).to_app_config();
    AppointmentBookingService::with_client(Arc::new(SupabaseClient::new(&config)), clinic_offset())
}

fn patient_user() -> User {
    TestUser::patient("booker@example.com").to_user()
}

/// 2030-01-07 is a Monday; 04:30 UTC is 10:00 in the clinic timezone, inside
/// the mock doctor's Monday 09:00-17:00 window.
fn monday_morning() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 7, 4, 30, 0).unwrap()
}

async fn mount_doctor(mock_server: &MockServer, doctor_id: &Uuid, doctor_user_id: &Uuid) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::doctor_row(&doctor_id.to_string(), &doctor_user_id.to_string())
        ])))
        .mount(mock_server)
        .await;
}

async fn mount_patient(mock_server: &MockServer, patient_id: &Uuid, user_id: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::patient_row(&patient_id.to_string(), user_id)
        ])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn create_books_pending_appointment() {
    let mock_server = MockServer::start().await;
    let user = patient_user();
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();
    let date = monday_morning();

    mount_doctor(&mock_server, &doctor_id, &Uuid::new_v4()).await;
    mount_patient(&mock_server, &patient_id, &user.id).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "doctor_id": doctor_id,
            "patient_id": patient_id,
            "status": "pending"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockStoreResponses::appointment_row(
                &appointment_id.to_string(),
                &patient_id.to_string(),
                &doctor_id.to_string(),
                &date.to_rfc3339(),
                "pending",
            )
        ])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let request = CreateAppointmentRequest {
        doctor_id,
        date,
        reason: "Persistent headaches".to_string(),
    };

    let details = service
        .create_appointment(&user, request, "test-token")
        .await
        .unwrap();

    assert_eq!(details.appointment.status, AppointmentStatus::Pending);
    assert_eq!(details.appointment.doctor_id, doctor_id);
    assert_eq!(details.patient.id, patient_id);
    assert_eq!(details.doctor.id, doctor_id);
}

#[tokio::test]
async fn create_rejects_past_date() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);

    let request = CreateAppointmentRequest {
        doctor_id: Uuid::new_v4(),
        date: Utc.with_ymd_and_hms(2020, 1, 6, 4, 30, 0).unwrap(),
        reason: "Checkup".to_string(),
    };

    let err = service
        .create_appointment(&patient_user(), request, "test-token")
        .await
        .unwrap_err();

    assert_matches!(err, AppointmentError::Validation(msg) if msg.contains("past"));
}

#[tokio::test]
async fn create_rejects_blank_reason() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server);

    let request = CreateAppointmentRequest {
        doctor_id: Uuid::new_v4(),
        date: monday_morning(),
        reason: "   ".to_string(),
    };

    let err = service
        .create_appointment(&patient_user(), request, "test-token")
        .await
        .unwrap_err();

    assert_matches!(err, AppointmentError::Validation(msg) if msg.contains("reason"));
}

#[tokio::test]
async fn create_rejects_unknown_doctor() {
    let mock_server = MockServer::start().await;
    let user = patient_user();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let request = CreateAppointmentRequest {
        doctor_id: Uuid::new_v4(),
        date: monday_morning(),
        reason: "Checkup".to_string(),
    };

    let err = service
        .create_appointment(&user, request, "test-token")
        .await
        .unwrap_err();

    assert_matches!(err, AppointmentError::NotFound(msg) if msg.contains("Doctor"));
}

#[tokio::test]
async fn create_rejects_time_outside_availability() {
    let mock_server = MockServer::start().await;
    let user = patient_user();
    let doctor_id = Uuid::new_v4();

    mount_doctor(&mock_server, &doctor_id, &Uuid::new_v4()).await;
    mount_patient(&mock_server, &Uuid::new_v4(), &user.id).await;

    let service = service_for(&mock_server);
    // 02:00 UTC Monday is 07:30 clinic time, before the 09:00 opening.
    let request = CreateAppointmentRequest {
        doctor_id,
        date: Utc.with_ymd_and_hms(2030, 1, 7, 2, 0, 0).unwrap(),
        reason: "Checkup".to_string(),
    };

    let err = service
        .create_appointment(&user, request, "test-token")
        .await
        .unwrap_err();

    assert_matches!(err, AppointmentError::SchedulingConflict(msg) if msg.contains("09:00"));
}

#[tokio::test]
async fn update_rejects_date_outside_availability() {
    let mock_server = MockServer::start().await;
    let user = patient_user();
    let appointment_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    mount_appointment(&mock_server, &appointment_id, &patient_id, &doctor_id, "pending").await;
    mount_patient(&mock_server, &patient_id, &user.id).await;
    mount_doctor(&mock_server, &doctor_id, &Uuid::new_v4()).await;

    let service = service_for(&mock_server);
    // 02:00 UTC Monday is 07:30 clinic time, before the 09:00 opening.
    let request = UpdateAppointmentRequest {
        date: Some(Utc.with_ymd_and_hms(2030, 1, 7, 2, 0, 0).unwrap()),
        ..Default::default()
    };

    let err = service
        .update_appointment(&user, appointment_id, request, "test-token")
        .await
        .unwrap_err();

    assert_matches!(err, AppointmentError::SchedulingConflict(msg) if msg.contains("09:00"));
}

#[tokio::test]
async fn create_rejects_conflicting_slot() {
    let mock_server = MockServer::start().await;
    let user = patient_user();
    let doctor_id = Uuid::new_v4();
    let date = monday_morning();

    mount_doctor(&mock_server, &doctor_id, &Uuid::new_v4()).await;
    mount_patient(&mock_server, &Uuid::new_v4(), &user.id).await;

    let existing = date + chrono::Duration::minutes(10);
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::appointment_row(
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                &doctor_id.to_string(),
                &existing.to_rfc3339(),
                "confirmed",
            )
        ])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let request = CreateAppointmentRequest {
        doctor_id,
        date,
        reason: "Checkup".to_string(),
    };

    let err = service
        .create_appointment(&user, request, "test-token")
        .await
        .unwrap_err();

    assert_matches!(err, AppointmentError::SchedulingConflict(_));
}

#[tokio::test]
async fn create_lazily_provisions_incomplete_patient_profile() {
    let mock_server = MockServer::start().await;
    let user = patient_user();
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let date = monday_morning();

    mount_doctor(&mock_server, &doctor_id, &Uuid::new_v4()).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .and(body_partial_json(json!({ "profile_complete": false })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockStoreResponses::incomplete_patient_row(&patient_id.to_string(), &user.id)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockStoreResponses::appointment_row(
                &Uuid::new_v4().to_string(),
                &patient_id.to_string(),
                &doctor_id.to_string(),
                &date.to_rfc3339(),
                "pending",
            )
        ])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let request = CreateAppointmentRequest {
        doctor_id,
        date,
        reason: "First visit".to_string(),
    };

    let details = service
        .create_appointment(&user, request, "test-token")
        .await
        .unwrap();

    assert!(!details.patient.profile_complete);
    assert!(details.patient.date_of_birth.is_none());
}

async fn mount_appointment(
    mock_server: &MockServer,
    appointment_id: &Uuid,
    patient_id: &Uuid,
    doctor_id: &Uuid,
    status: &str,
) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::appointment_row(
                &appointment_id.to_string(),
                &patient_id.to_string(),
                &doctor_id.to_string(),
                "2030-01-07T04:30:00+00:00",
                status,
            )
        ])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn get_denies_unrelated_patient() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    mount_appointment(&mock_server, &appointment_id, &patient_id, &doctor_id, "pending").await;
    // Joined records belong to other users, not the caller.
    mount_patient(&mock_server, &patient_id, &Uuid::new_v4().to_string()).await;
    mount_doctor(&mock_server, &doctor_id, &Uuid::new_v4()).await;

    let service = service_for(&mock_server);
    let err = service
        .get_appointment(&patient_user(), appointment_id, "test-token")
        .await
        .unwrap_err();

    assert_matches!(err, AppointmentError::Forbidden(_));
}

#[tokio::test]
async fn owner_patient_can_fetch_joined_details() {
    let mock_server = MockServer::start().await;
    let user = patient_user();
    let appointment_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    mount_appointment(&mock_server, &appointment_id, &patient_id, &doctor_id, "confirmed").await;
    mount_patient(&mock_server, &patient_id, &user.id).await;
    mount_doctor(&mock_server, &doctor_id, &Uuid::new_v4()).await;

    let service = service_for(&mock_server);
    let details = service
        .get_appointment(&user, appointment_id, "test-token")
        .await
        .unwrap();

    assert_eq!(details.appointment.id, appointment_id);
    assert_eq!(details.patient.id, patient_id);
    assert_eq!(details.doctor.id, doctor_id);
    assert_eq!(details.appointment.status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn patient_cannot_confirm_appointment() {
    let mock_server = MockServer::start().await;
    let user = patient_user();
    let appointment_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    mount_appointment(&mock_server, &appointment_id, &patient_id, &doctor_id, "pending").await;
    mount_patient(&mock_server, &patient_id, &user.id).await;
    mount_doctor(&mock_server, &doctor_id, &Uuid::new_v4()).await;

    let service = service_for(&mock_server);
    let request = UpdateAppointmentRequest {
        status: Some(AppointmentStatus::Confirmed),
        ..Default::default()
    };

    let err = service
        .update_appointment(&user, appointment_id, request, "test-token")
        .await
        .unwrap_err();

    assert_matches!(err, AppointmentError::Forbidden(msg) if msg.contains("cancel"));
}

#[tokio::test]
async fn cancel_is_idempotent_for_cancelled_appointment() {
    let mock_server = MockServer::start().await;
    let user = patient_user();
    let appointment_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    // No PATCH mock mounted: a repeated cancel must not touch the store.
    mount_appointment(&mock_server, &appointment_id, &patient_id, &doctor_id, "cancelled").await;
    mount_patient(&mock_server, &patient_id, &user.id).await;
    mount_doctor(&mock_server, &doctor_id, &Uuid::new_v4()).await;

    let service = service_for(&mock_server);
    let details = service
        .cancel_appointment(&user, appointment_id, "test-token")
        .await
        .unwrap();

    assert_eq!(details.appointment.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn admin_lists_all_appointments_joined() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com").to_user();
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::appointment_row(
                &first.to_string(),
                &patient_id.to_string(),
                &doctor_id.to_string(),
                "2030-01-14T04:30:00+00:00",
                "pending",
            ),
            MockStoreResponses::appointment_row(
                &second.to_string(),
                &patient_id.to_string(),
                &doctor_id.to_string(),
                "2030-01-07T04:30:00+00:00",
                "confirmed",
            )
        ])))
        .mount(&mock_server)
        .await;

    mount_patient(&mock_server, &patient_id, &Uuid::new_v4().to_string()).await;
    mount_doctor(&mock_server, &doctor_id, &Uuid::new_v4()).await;

    let service = service_for(&mock_server);
    let listing = service.list_appointments(&admin, "test-token").await.unwrap();

    assert_eq!(listing.len(), 2);
    assert_eq!(listing[0].appointment.id, first);
    assert_eq!(listing[0].patient.id, patient_id);
    assert_eq!(listing[1].doctor.id, doctor_id);
}

#[tokio::test]
async fn patient_listing_is_scoped_to_own_profile() {
    let mock_server = MockServer::start().await;
    let user = patient_user();
    let patient_id = Uuid::new_v4();

    mount_patient(&mock_server, &patient_id, &user.id).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("patient_id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let listing = service.list_appointments(&user, "test-token").await.unwrap();

    assert!(listing.is_empty());
}

#[tokio::test]
async fn doctor_listing_is_scoped_to_own_profile() {
    let mock_server = MockServer::start().await;
    let user = TestUser::doctor("doc@example.com").to_user();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::doctor_row(&doctor_id.to_string(), &user.id)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let listing = service.list_appointments(&user, "test-token").await.unwrap();

    assert!(listing.is_empty());
}

#[tokio::test]
async fn listing_without_profile_is_not_found() {
    let mock_server = MockServer::start().await;
    let user = patient_user();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let err = service
        .list_appointments(&user, "test-token")
        .await
        .unwrap_err();

    assert_matches!(err, AppointmentError::NotFound(msg) if msg.contains("Patient profile"));
}

#[tokio::test]
async fn listing_skips_rows_with_dangling_references() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com").to_user();
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();
    let intact = Uuid::new_v4();
    let dangling = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::appointment_row(
                &intact.to_string(),
                &patient_id.to_string(),
                &doctor_id.to_string(),
                "2030-01-14T04:30:00+00:00",
                "pending",
            ),
            // References a patient record that no longer resolves.
            MockStoreResponses::appointment_row(
                &dangling.to_string(),
                &Uuid::new_v4().to_string(),
                &doctor_id.to_string(),
                "2030-01-07T04:30:00+00:00",
                "pending",
            )
        ])))
        .mount(&mock_server)
        .await;

    mount_patient(&mock_server, &patient_id, &Uuid::new_v4().to_string()).await;
    mount_doctor(&mock_server, &doctor_id, &Uuid::new_v4()).await;

    let service = service_for(&mock_server);
    let listing = service.list_appointments(&admin, "test-token").await.unwrap();

    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].appointment.id, intact);
}

#[tokio::test]
async fn cancel_rejects_completed_appointment() {
    let mock_server = MockServer::start().await;
    let user = patient_user();
    let appointment_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    mount_appointment(&mock_server, &appointment_id, &patient_id, &doctor_id, "completed").await;
    mount_patient(&mock_server, &patient_id, &user.id).await;
    mount_doctor(&mock_server, &doctor_id, &Uuid::new_v4()).await;

    let service = service_for(&mock_server);
    let err = service
        .cancel_appointment(&user, appointment_id, "test-token")
        .await
        .unwrap_err();

    assert_matches!(err, AppointmentError::Validation(_));
}

#[tokio::test]
async fn cancel_patches_active_appointment() {
    let mock_server = MockServer::start().await;
    let user = patient_user();
    let appointment_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    mount_appointment(&mock_server, &appointment_id, &patient_id, &doctor_id, "confirmed").await;
    mount_patient(&mock_server, &patient_id, &user.id).await;
    mount_doctor(&mock_server, &doctor_id, &Uuid::new_v4()).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "status": "cancelled" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::appointment_row(
                &appointment_id.to_string(),
                &patient_id.to_string(),
                &doctor_id.to_string(),
                "2030-01-07T04:30:00+00:00",
                "cancelled",
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let details = service
        .cancel_appointment(&user, appointment_id, "test-token")
        .await
        .unwrap();

    assert_eq!(details.appointment.status, AppointmentStatus::Cancelled);
}
