use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::DoctorCellState;

pub fn doctor_routes(state: Arc<DoctorCellState>) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/{doctor_id}", get(handlers::get_doctor_public))
        .route("/{doctor_id}/available-slots", get(handlers::get_available_slots_public))
        .route("/{doctor_id}/bookable-slots", get(handlers::get_bookable_slots_public));

    // Protected routes (doctor self or admin; lookup is admin only)
    let protected_routes = Router::new()
        .route("/{doctor_id}/slots", get(handlers::list_doctor_slots))
        .route("/{doctor_id}/slots/recurring", post(handlers::create_recurring_slots))
        .route(
            "/{doctor_id}/slots/{slot_id}",
            put(handlers::update_slot).delete(handlers::delete_slot),
        )
        .route("/{doctor_id}/availability", patch(handlers::update_availability))
        .route("/lookup", get(handlers::lookup_doctor_by_email))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
