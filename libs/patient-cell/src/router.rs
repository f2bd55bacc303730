use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_utils::extractor::auth_middleware;

use crate::handlers::*;
use crate::PatientCellState;

pub fn create_patient_router(state: Arc<PatientCellState>) -> Router {
    Router::new()
        .route("/me", get(get_my_profile))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
