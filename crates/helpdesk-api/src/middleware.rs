use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;

/// Operator token every `/api` request must present when configured.
#[derive(Clone)]
pub struct ApiToken(pub Arc<str>);

/// Checks `Authorization: Bearer {token}`.
pub async fn require_token(
    State(token): State<ApiToken>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    if presented != &*token.0 {
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(req).await)
}
