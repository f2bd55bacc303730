use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{CreateRecurringSlotsRequest, DoctorLookupQuery, UpdateAvailabilityRequest, UpdateSlotRequest};
use crate::services::{AvailabilityService, DoctorService, SlotService};
use crate::DoctorCellState;

fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid {} id: {}", what, raw)))
}

fn require_doctor_or_admin(user: &User, doctor_id: Uuid) -> Result<(), AppError> {
    if user.acts_as(doctor_id, Role::Doctor) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Only the doctor or an administrator can manage these slots".to_string()))
    }
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_doctor_public(
    State(state): State<Arc<DoctorCellState>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = parse_id(&doctor_id, "doctor")?;
    let profile = DoctorService::new(&state).get_profile(doctor_id).await?;

    Ok(Json(json!({
        "success": true,
        "doctor": profile
    })))
}

#[axum::debug_handler]
pub async fn get_available_slots_public(
    State(state): State<Arc<DoctorCellState>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = parse_id(&doctor_id, "doctor")?;
    let slots = AvailabilityService::new(&state).list_available(doctor_id).await?;

    Ok(Json(json!({
        "success": true,
        "doctor_id": doctor_id,
        "total_slots": slots.len(),
        "slots": slots
    })))
}

#[axum::debug_handler]
pub async fn get_bookable_slots_public(
    State(state): State<Arc<DoctorCellState>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = parse_id(&doctor_id, "doctor")?;
    let slots = AvailabilityService::new(&state).list_bookable(doctor_id).await?;

    Ok(Json(json!({
        "success": true,
        "doctor_id": doctor_id,
        "total_slots": slots.len(),
        "slots": slots
    })))
}

// ==============================================================================
// PROTECTED SLOT MANAGEMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_recurring_slots(
    State(state): State<Arc<DoctorCellState>>,
    Path(doctor_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateRecurringSlotsRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = parse_id(&doctor_id, "doctor")?;
    require_doctor_or_admin(&user, doctor_id)?;

    let result = SlotService::new(&state).create_recurring_slots(doctor_id, &request).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("{} slots created", result.created),
        "created": result.created,
        "skipped_count": result.skipped_count,
        "slots": result.slots
    })))
}

#[axum::debug_handler]
pub async fn list_doctor_slots(
    State(state): State<Arc<DoctorCellState>>,
    Path(doctor_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = parse_id(&doctor_id, "doctor")?;
    require_doctor_or_admin(&user, doctor_id)?;

    let slots = SlotService::new(&state).list_slots(doctor_id).await?;

    Ok(Json(json!({
        "success": true,
        "total_slots": slots.len(),
        "slots": slots
    })))
}

#[axum::debug_handler]
pub async fn update_slot(
    State(state): State<Arc<DoctorCellState>>,
    Path((doctor_id, slot_id)): Path<(String, String)>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = parse_id(&doctor_id, "doctor")?;
    let slot_id = parse_id(&slot_id, "slot")?;
    require_doctor_or_admin(&user, doctor_id)?;

    let slot = SlotService::new(&state).update_slot(doctor_id, slot_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "slot": slot
    })))
}

#[axum::debug_handler]
pub async fn delete_slot(
    State(state): State<Arc<DoctorCellState>>,
    Path((doctor_id, slot_id)): Path<(String, String)>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = parse_id(&doctor_id, "doctor")?;
    let slot_id = parse_id(&slot_id, "slot")?;
    require_doctor_or_admin(&user, doctor_id)?;

    let slot = SlotService::new(&state).delete_slot(doctor_id, slot_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Slot deleted",
        "slot_id": slot.id
    })))
}

#[axum::debug_handler]
pub async fn update_availability(
    State(state): State<Arc<DoctorCellState>>,
    Path(doctor_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = parse_id(&doctor_id, "doctor")?;
    require_doctor_or_admin(&user, doctor_id)?;

    let profile = DoctorService::new(&state)
        .update_availability(doctor_id, request.available)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Availability updated",
        "doctor": profile
    })))
}

#[axum::debug_handler]
pub async fn lookup_doctor_by_email(
    State(state): State<Arc<DoctorCellState>>,
    Query(query): Query<DoctorLookupQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if user.role != Role::Admin {
        return Err(AppError::Forbidden("Only administrators can look up doctors".to_string()));
    }

    let doctor = DoctorService::new(&state).find_by_email(&query.email).await?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor
    })))
}
