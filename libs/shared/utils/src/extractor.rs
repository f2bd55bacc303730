use std::sync::Arc;

use axum::{body::Body, extract::State, middleware::Next, response::Response};
use headers::{authorization::Bearer, Authorization, HeaderMapExt};
use http::{header::AUTHORIZATION, Request};

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Validates the bearer token and stores the resulting `User` in the request
/// extensions, where handlers pick it up with `Extension<User>`.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if !request.headers().contains_key(AUTHORIZATION) {
        return Err(AppError::Auth("Missing authorization header".to_string()));
    }

    let bearer = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let user = validate_token(bearer.token(), &config.jwt_secret).map_err(|e| AppError::Auth(e.to_string()))?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
