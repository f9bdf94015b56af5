pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{delete, get, post, put};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and by the integration tests.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Protocols
        .route("/api/protocols", get(routes::protocols::list_protocols))
        .route("/api/protocols", post(routes::protocols::create_protocol))
        .route(
            "/api/protocols/import",
            post(routes::protocols::import_protocol),
        )
        .route("/api/protocols/{id}", get(routes::protocols::get_protocol))
        .route("/api/protocols/{id}", put(routes::protocols::update_protocol))
        .route(
            "/api/protocols/{id}",
            delete(routes::protocols::delete_protocol),
        )
        .route(
            "/api/protocols/{id}/export",
            get(routes::protocols::export_protocol),
        )
        .route(
            "/api/protocols/{id}/audience",
            get(routes::protocols::get_audience),
        )
        .route(
            "/api/protocols/{id}/conflicts",
            post(routes::protocols::check_conflicts),
        )
        // Assignments
        .route(
            "/api/protocols/{id}/assignments",
            get(routes::assignments::list_assigned),
        )
        .route(
            "/api/protocols/{id}/assignments",
            post(routes::assignments::assign),
        )
        .route(
            "/api/assignments/{id}/abandon",
            post(routes::assignments::abandon),
        )
        .route(
            "/api/assignments/{id}/status",
            put(routes::assignments::set_status),
        )
        .route(
            "/api/assignments/{id}/progress",
            put(routes::assignments::update_progress),
        )
        // Users
        .route("/api/users", get(routes::users::list_users))
        .route("/api/users", post(routes::users::upsert_user))
        .route(
            "/api/users/{id}/assignments",
            get(routes::users::user_assignments),
        )
        // Groups
        .route("/api/groups", get(routes::groups::list_groups))
        .route("/api/groups", post(routes::groups::create_group))
        .route(
            "/api/groups/{id}/members",
            get(routes::groups::list_members),
        )
        .route(
            "/api/groups/{id}/members",
            post(routes::groups::add_member),
        )
        .route(
            "/api/groups/{id}/members/{user_id}",
            delete(routes::groups::remove_member),
        )
        // Lessons
        .route("/api/lessons", get(routes::lessons::list_lessons))
        .route("/api/lessons", post(routes::lessons::create_lesson))
        .route(
            "/api/lessons/{id}/tactics",
            get(routes::lessons::list_tactics),
        )
        .route(
            "/api/lessons/{id}/tactics",
            post(routes::lessons::add_tactic),
        )
        .route(
            "/api/lessons/{id}/tactics/order",
            put(routes::lessons::set_tactic_order),
        )
        .route(
            "/api/lessons/{id}/tactics/move",
            post(routes::lessons::move_tactic),
        )
        // Progress, chat, health
        .route("/api/progress", get(routes::progress::get_progress))
        .route("/api/chat", post(routes::chat::send_message))
        .route("/api/health", get(routes::health::health))
        .route("/api/config", get(routes::health::get_config))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the coach API server for the workspace at `root`.
pub async fn serve(root: PathBuf, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(AppState::load(root)?, listener).await
}

/// Start the coach API server on a pre-bound listener.
///
/// Callers that bind port 0 can read the chosen port from the listener
/// before handing it over.
pub async fn serve_on(app_state: AppState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    for warning in app_state.config.validate() {
        tracing::warn!("config: {}", warning.message);
    }
    let app = build_router(app_state);

    tracing::info!("coach API listening on http://localhost:{actual_port}");

    axum::serve(listener, app).await?;
    Ok(())
}
