//! Router construction for the tally server.

use std::sync::Arc;

use axum::{
    middleware as axum_mw,
    routing::{delete, get, post},
    Extension, Router,
};
use tally_core::LedgerService;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::MaintenanceSource;
use crate::handlers;
use crate::session::{session_auth, SessionStore};

/// Build the full axum router with all routes and middleware.
pub fn build_router(
    service: Arc<dyn LedgerService>,
    sessions: Arc<SessionStore>,
    maintenance: MaintenanceSource,
) -> Router {
    // Routes that require a live session
    let protected = Router::new()
        .route("/api/session", get(handlers::auth::session))
        // Records, in the session's effective scope
        .route(
            "/api/records",
            get(handlers::records::list_records).post(handlers::records::create_record),
        )
        .route(
            "/api/records/inline_edit",
            post(handlers::records::inline_edit),
        )
        .route("/api/records/:id", delete(handlers::records::delete_record))
        .route(
            "/api/records/reset_scores",
            post(handlers::records::reset_scores),
        )
        .route("/api/records/reset_all", post(handlers::records::reset_all))
        .route("/api/admin/reset_data", post(handlers::records::reset_data))
        // Audit log
        .route("/api/logs", get(handlers::logs::list_logs))
        // Statistics
        .route("/api/stats/monthly", get(handlers::stats::monthly))
        .route("/api/stats/top", get(handlers::stats::top))
        // Accounts
        .route(
            "/api/users",
            get(handlers::users::list_users).post(handlers::users::create_account),
        )
        .route("/api/addaccount", post(handlers::users::create_account))
        .route("/api/users/:id/role", post(handlers::users::update_role))
        .route("/api/users/:id/scope", post(handlers::users::update_scope))
        .route("/api/users/:id", delete(handlers::users::delete_user))
        // Display labels
        .route(
            "/api/settings/monthly_title",
            post(handlers::settings::update_monthly_title),
        )
        .route(
            "/api/settings/stats",
            post(handlers::settings::update_stats_labels),
        )
        .layer(axum_mw::from_fn(session_auth));

    // Public routes (no session)
    let public = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/maintenance", get(handlers::auth::maintenance))
        .route("/api/login", post(handlers::auth::login))
        .route("/api/logout", post(handlers::auth::logout));

    // Combine and add shared state
    public
        .merge(protected)
        .layer(Extension(service))
        .layer(Extension(sessions))
        .layer(Extension(maintenance))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}
