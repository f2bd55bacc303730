use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use serde_json::{json, Value};
use tracing::debug;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::PatientError;
use crate::services::PatientRepository;
use crate::PatientCellState;

#[axum::debug_handler]
pub async fn get_my_profile(
    State(state): State<Arc<PatientCellState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if user.role != Role::Patient {
        return Err(AppError::Forbidden("Only patients have a wallet profile".to_string()));
    }

    debug!("Loading profile for patient {}", user.id);
    let patient = state
        .patients
        .find_by_id(user.id)
        .await
        .map_err(PatientError::database)?
        .ok_or(PatientError::NotFound)?;

    Ok(Json(json!({
        "success": true,
        "user": patient
    })))
}
