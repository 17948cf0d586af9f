//! services/companion/src/web/middleware.rs
//!
//! Identification middleware for protecting routes.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::warn;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Middleware that extracts the caller's user id from the `x-user-id` header.
///
/// The header is trusted as given. The companion must sit behind a proxy that
/// authenticates the caller, strips any client-supplied `x-user-id`, and sets its own;
/// exposed directly, anyone could pass another user's id and get past the ownership
/// checks in `rest::authorize_project`. If valid, the id is inserted into the request
/// extensions for handlers to use. If missing or malformed, returns 401 Unauthorized.
pub async fn require_auth(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let user_id = user_id_from(&req).ok_or(StatusCode::UNAUTHORIZED)?;
    req.extensions_mut().insert(user_id);
    Ok(next.run(req).await)
}

fn user_id_from(req: &Request) -> Option<Uuid> {
    let raw = req.headers().get(USER_ID_HEADER)?.to_str().ok()?;
    match Uuid::parse_str(raw.trim()) {
        Ok(id) => Some(id),
        Err(e) => {
            warn!("Rejecting malformed {} header: {}", USER_ID_HEADER, e);
            None
        }
    }
}
