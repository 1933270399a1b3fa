use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::{api::state::AppState, error::AppError};

/// Requires `Authorization: Bearer <auth.api_key>`. An empty configured key
/// locks the protected routes instead of opening them.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let expected = state.settings.auth.api_key.as_bytes();
    if expected.is_empty() {
        tracing::warn!("Rejecting request: auth.api_key is not configured");
        return Err(AppError::Unauthorized);
    }

    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    if !bool::from(token.trim().as_bytes().ct_eq(expected)) {
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}
