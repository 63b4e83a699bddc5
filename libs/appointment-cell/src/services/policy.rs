use uuid::Uuid;

use shared_models::auth::Role;

use crate::models::{AppointmentError, AppointmentStatus};

/// Any authenticated user may book; patients book for themselves and a
/// missing patient profile is created on the fly.
pub fn can_create(_role: Role) -> bool {
    true
}

/// Whether the actor may read or modify an appointment. Admins see
/// everything; patients and doctors only their own side of the booking.
/// Ownership is keyed on the identity-store user id, not the profile id.
pub fn can_access(
    role: Role,
    actor_user_id: Uuid,
    patient_user_id: Uuid,
    doctor_user_id: Uuid,
) -> bool {
    match role {
        Role::Admin => true,
        Role::Patient => actor_user_id == patient_user_id,
        Role::Doctor => actor_user_id == doctor_user_id,
    }
}

/// Patients may only move an appointment to cancelled; confirmation and
/// completion are clinical actions reserved for doctors and admins. Only
/// admins may force a booking back to pending.
pub fn can_set_status(role: Role, target: AppointmentStatus) -> bool {
    match role {
        Role::Admin => true,
        Role::Doctor => matches!(
            target,
            AppointmentStatus::Confirmed
                | AppointmentStatus::Completed
                | AppointmentStatus::Cancelled
        ),
        Role::Patient => target == AppointmentStatus::Cancelled,
    }
}

/// Status transition table. Setting the current status again is an allowed
/// no-op, which keeps repeated cancellations idempotent. Completed and
/// cancelled are terminal.
pub fn validate_transition(
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<(), AppointmentError> {
    if from == to {
        return Ok(());
    }

    let allowed = match from {
        AppointmentStatus::Pending => matches!(
            to,
            AppointmentStatus::Confirmed | AppointmentStatus::Cancelled
        ),
        AppointmentStatus::Confirmed => matches!(
            to,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled
        ),
        AppointmentStatus::Completed | AppointmentStatus::Cancelled => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(AppointmentError::Validation(format!(
            "Cannot change appointment status from {} to {}",
            from, to
        )))
    }
}
