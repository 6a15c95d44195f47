use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, info};

use super::AppState;
use crate::error::AppError;
use crate::security::{self, Verdict};

/// Log method, host and original URL of every request, then pass it on.
pub async fn log_request(req: Request, next: Next) -> Response {
    let host = request_host(&req);
    info!(target: "request", method = %req.method(), host = %host, uri = %req.uri(), "request");
    next.run(req).await
}

/// `Host` header, else the authority of an absolute-form URI, else `-`.
fn request_host(req: &Request) -> String {
    req.headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| req.uri().host())
        .unwrap_or("-")
        .to_string()
}

/// Session gate: runs the wrapped handler only for `Verdict::Allow`, with the
/// identity available as an `Extension<Identity>`. Any deny answers 401 immediately.
pub async fn require_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    match security::verify_request(req.headers(), &state.keys) {
        Verdict::Allow(identity) => {
            debug!(email = ?identity.email(), "session allowed");
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Verdict::Deny(reason) => {
            debug!(reason = reason.as_str(), uri = %req.uri(), "session denied");
            AppError::auth(reason.as_str(), "Unauthorized user").into_response()
        }
    }
}
