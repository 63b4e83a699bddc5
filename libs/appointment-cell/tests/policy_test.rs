use uuid::Uuid;

use appointment_cell::models::{AppointmentError, AppointmentStatus};
use appointment_cell::services::policy;
use shared_models::auth::Role;

#[test]
fn any_role_may_create() {
    assert!(policy::can_create(Role::Patient));
    assert!(policy::can_create(Role::Doctor));
    assert!(policy::can_create(Role::Admin));
}

#[test]
fn admin_accesses_any_appointment() {
    let actor = Uuid::new_v4();
    assert!(policy::can_access(
        Role::Admin,
        actor,
        Uuid::new_v4(),
        Uuid::new_v4()
    ));
}

#[test]
fn patient_accesses_only_own_appointment() {
    let patient_user = Uuid::new_v4();
    let doctor_user = Uuid::new_v4();

    assert!(policy::can_access(
        Role::Patient,
        patient_user,
        patient_user,
        doctor_user
    ));
    assert!(!policy::can_access(
        Role::Patient,
        Uuid::new_v4(),
        patient_user,
        doctor_user
    ));
}

#[test]
fn doctor_accesses_only_own_appointment() {
    let patient_user = Uuid::new_v4();
    let doctor_user = Uuid::new_v4();

    assert!(policy::can_access(
        Role::Doctor,
        doctor_user,
        patient_user,
        doctor_user
    ));
    assert!(!policy::can_access(
        Role::Doctor,
        Uuid::new_v4(),
        patient_user,
        doctor_user
    ));
}

#[test]
fn doctor_is_not_granted_access_via_patient_side() {
    // A doctor whose user id happens to match the patient side only counts
    // when it matches the doctor side.
    let shared = Uuid::new_v4();
    assert!(!policy::can_access(
        Role::Doctor,
        shared,
        shared,
        Uuid::new_v4()
    ));
}

#[test]
fn patients_may_only_set_cancelled() {
    assert!(policy::can_set_status(
        Role::Patient,
        AppointmentStatus::Cancelled
    ));
    assert!(!policy::can_set_status(
        Role::Patient,
        AppointmentStatus::Confirmed
    ));
    assert!(!policy::can_set_status(
        Role::Patient,
        AppointmentStatus::Completed
    ));
    assert!(!policy::can_set_status(
        Role::Patient,
        AppointmentStatus::Pending
    ));
}

#[test]
fn doctors_may_set_clinical_statuses_but_not_pending() {
    assert!(policy::can_set_status(
        Role::Doctor,
        AppointmentStatus::Confirmed
    ));
    assert!(policy::can_set_status(
        Role::Doctor,
        AppointmentStatus::Completed
    ));
    assert!(policy::can_set_status(
        Role::Doctor,
        AppointmentStatus::Cancelled
    ));
    assert!(!policy::can_set_status(
        Role::Doctor,
        AppointmentStatus::Pending
    ));
}

#[test]
fn admins_may_set_any_status() {
    for status in [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ] {
        assert!(policy::can_set_status(Role::Admin, status));
    }
}

#[test]
fn pending_transitions() {
    assert!(
        policy::validate_transition(AppointmentStatus::Pending, AppointmentStatus::Confirmed)
            .is_ok()
    );
    assert!(
        policy::validate_transition(AppointmentStatus::Pending, AppointmentStatus::Cancelled)
            .is_ok()
    );
    assert!(
        policy::validate_transition(AppointmentStatus::Pending, AppointmentStatus::Completed)
            .is_err()
    );
}

#[test]
fn confirmed_transitions() {
    assert!(
        policy::validate_transition(AppointmentStatus::Confirmed, AppointmentStatus::Completed)
            .is_ok()
    );
    assert!(
        policy::validate_transition(AppointmentStatus::Confirmed, AppointmentStatus::Cancelled)
            .is_ok()
    );
    assert!(
        policy::validate_transition(AppointmentStatus::Confirmed, AppointmentStatus::Pending)
            .is_err()
    );
}

#[test]
fn terminal_statuses_reject_transitions() {
    assert!(
        policy::validate_transition(AppointmentStatus::Completed, AppointmentStatus::Cancelled)
            .is_err()
    );
    assert!(
        policy::validate_transition(AppointmentStatus::Cancelled, AppointmentStatus::Confirmed)
            .is_err()
    );
    assert!(
        policy::validate_transition(AppointmentStatus::Cancelled, AppointmentStatus::Pending)
            .is_err()
    );
}

#[test]
fn same_status_is_an_allowed_noop() {
    for status in [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ] {
        assert!(policy::validate_transition(status, status).is_ok());
    }
}

#[test]
fn invalid_transition_error_names_both_statuses() {
    let err =
        policy::validate_transition(AppointmentStatus::Completed, AppointmentStatus::Confirmed)
            .unwrap_err();

    match err {
        AppointmentError::Validation(msg) => {
            assert!(msg.contains("completed"));
            assert!(msg.contains("confirmed"));
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}
