use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::AppState;

pub mod handlers;

/// Build the full application router. IFTTT routes are nested under
/// `/ifttt/v1` and gated by the shared-secret header; the banner and
/// health endpoints are open.
pub fn router(state: Arc<AppState>) -> Router {
    let ifttt = Router::new()
        .route("/status", get(handlers::status))
        .route("/test/setup", post(handlers::test_setup))
        .route("/queries/list_all_devices", post(handlers::list_all_devices))
        .route(
            "/actions/turn_device_on/fields/device_name/options",
            post(handlers::device_options),
        )
        .route(
            "/actions/turn_device_off/fields/device_name/options",
            post(handlers::device_options),
        )
        .route("/actions/turn_device_on", post(handlers::turn_device_on))
        .route("/actions/turn_device_off", post(handlers::turn_device_off))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            service_key_check,
        ));

    Router::new()
        .route("/", get(handlers::banner))
        .route("/healthz", get(|| async { "ok" }))
        .nest("/ifttt/v1", ifttt)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Middleware: compares the `IFTTT-Service-Key` header against the
/// configured shared secret. Mismatch or absence yields the IFTTT 401 body.
async fn service_key_check(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get("ifttt-service-key")
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(k) if k == state.config.service_key => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!(path = %req.uri().path(), "service key mismatch");
            Err(AppError::ServiceKeyInvalid)
        }
        None => {
            tracing::warn!(path = %req.uri().path(), "missing IFTTT-Service-Key header");
            Err(AppError::ServiceKeyInvalid)
        }
    }
}
