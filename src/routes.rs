// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{handlers::session, state::AppState};

/// Assembles the main application router.
///
/// * Mounts the session routes under `/api/sessions`.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (config, backend client, session registry).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:5173"),
        HeaderValue::from_static("http://127.0.0.1:5173"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let session_routes = Router::new()
        .route("/", post(session::create_session))
        .route(
            "/{id}",
            get(session::get_session).delete(session::delete_session),
        )
        .route("/{id}/events", get(session::next_event))
        .route("/{id}/start", post(session::start_session))
        .route("/{id}/answers", post(session::record_answer))
        .route("/{id}/submit", post(session::request_submit))
        .route("/{id}/submit/confirm", post(session::confirm_submit))
        .route("/{id}/submit/cancel", post(session::cancel_submit))
        .route("/{id}/signals", post(session::send_signal))
        .route("/{id}/return", post(session::return_to_test))
        .route("/{id}/leave", post(session::leave))
        .route("/{id}/stay", post(session::stay))
        .route("/{id}/review", get(session::get_review));

    Router::new()
        .nest("/api/sessions", session_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
