// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};

use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::BookAppointmentRequest;
use crate::services::BookingEngine;
use crate::AppointmentCellState;

// ==============================================================================
// BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    if user.role != Role::Patient {
        return Err(AppError::Forbidden("Only patients can book appointments".to_string()));
    }

    let confirmation = BookingEngine::new(&state)
        .book(&request.doc_id, &request.slot_date, &request.slot_time, user.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": confirmation.message,
        "appointment_id": confirmation.appointment_id
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let confirmation = BookingEngine::new(&state).cancel(&appointment_id, &user).await?;

    Ok(Json(json!({
        "success": true,
        "message": confirmation.message,
        "appointment_id": confirmation.appointment_id,
        "already_cancelled": confirmation.already_cancelled,
        "refunded": confirmation.refunded
    })))
}

// ==============================================================================
// PAYMENT AND COMPLETION
// ==============================================================================

#[axum::debug_handler]
pub async fn pay_with_wallet(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let payment = BookingEngine::new(&state).pay_with_wallet(&appointment_id, &user).await?;

    Ok(Json(json!({
        "success": true,
        "message": payment.message,
        "appointment_id": payment.appointment_id,
        "wallet_used": payment.wallet_used
    })))
}

#[axum::debug_handler]
pub async fn confirm_payment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let payment = BookingEngine::new(&state)
        .confirm_gateway_payment(&appointment_id, &user)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": payment.message,
        "appointment_id": payment.appointment_id
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = BookingEngine::new(&state).complete(&appointment_id, &user).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment completed",
        "appointment": appointment
    })))
}

// ==============================================================================
// READS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = BookingEngine::new(&state).get(&appointment_id, &user).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "status": appointment.status()
    })))
}

#[axum::debug_handler]
pub async fn get_my_appointments(
    State(state): State<Arc<AppointmentCellState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointments = BookingEngine::new(&state).appointments_for_user(user.id).await?;

    Ok(Json(json!({
        "success": true,
        "total": appointments.len(),
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppointmentCellState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if user.role != Role::Doctor {
        return Err(AppError::Forbidden("Only doctors have a consultation list".to_string()));
    }

    let appointments = BookingEngine::new(&state).appointments_for_doctor(user.id).await?;

    Ok(Json(json!({
        "success": true,
        "total": appointments.len(),
        "appointments": appointments
    })))
}
