use super::error::ApiError;
use super::handlers::AppState;
use crate::error::WalletError;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

/// Lets a request through only when it carries `Authorization: Bearer <token>`
/// matching the configured admin token.
pub(super) async fn require_admin(
    State(context): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    match presented {
        Some(token) if context.config.admin.token.matches(token) => Ok(next.run(req).await),
        _ => {
            tracing::warn!(
                method = %req.method(),
                path = %req.uri().path(),
                "admin request refused"
            );
            Err(ApiError(WalletError::Unauthorized))
        }
    }
}
