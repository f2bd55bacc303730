// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::AppointmentCellState;

pub fn appointment_routes(state: Arc<AppointmentCellState>) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/mine", get(handlers::get_my_appointments))
        .route("/doctor", get(handlers::get_doctor_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/pay/wallet", post(handlers::pay_with_wallet))
        .route("/{appointment_id}/pay/confirm", post(handlers::confirm_payment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
