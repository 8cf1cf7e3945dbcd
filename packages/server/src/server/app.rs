//! Application setup and router wiring.

use std::sync::Arc;

use axum::{
    http::header::{AUTHORIZATION, CONTENT_TYPE},
    http::Method,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::kernel::ServerDeps;
use crate::server::middleware::{jwt_auth_middleware, metrics_middleware, SessionJwt};
use crate::server::routes::{applications, dashboard, health, interviews, jobs};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: Arc<ServerDeps>,
    pub jwt: Arc<SessionJwt>,
}

/// Build the Axum application router.
///
/// Middleware order (outermost first): trace, CORS, metrics, auth. The
/// metrics layer sees every request including auth rejections.
pub fn build_app(deps: Arc<ServerDeps>, jwt: Arc<SessionJwt>) -> Router {
    let state = AppState {
        deps: deps.clone(),
        jwt: jwt.clone(),
    };

    let api = Router::new()
        // Jobs
        .route("/job", get(jobs::list_jobs).post(jobs::create_job))
        .route(
            "/job/:id",
            get(jobs::get_job)
                .put(jobs::update_job)
                .delete(jobs::delete_job),
        )
        // Applications
        .route("/application", post(applications::submit_application))
        // Interview lifecycle
        .route(
            "/interview/invite/:application_id",
            post(interviews::invite),
        )
        .route(
            "/interview/accept/:interview_id/:token",
            get(interviews::accept),
        )
        .route(
            "/interview/reject/:interview_id/:token",
            get(interviews::reject),
        )
        .route(
            "/interview/available-slots/:interview_id",
            get(interviews::available_slots),
        )
        .route(
            "/interview/select-slot/:interview_id",
            post(interviews::select_slot),
        )
        .route("/interview/confirm/:interview_id", post(interviews::confirm))
        .route("/interview/cancel/:interview_id", post(interviews::cancel))
        .route(
            "/interview/negotiate/:interview_id",
            post(interviews::negotiate),
        )
        .route(
            "/interview/attendance/:interview_id",
            post(interviews::attendance),
        )
        // Dashboard
        .route(
            "/dashboard/candidates/:job_id",
            get(dashboard::candidates),
        )
        .route(
            "/dashboard/activity-log/:job_id",
            get(dashboard::activity_log),
        )
        .route(
            "/dashboard/analytics/:job_id",
            get(dashboard::analytics),
        );

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    let jwt_for_middleware = jwt.clone();
    let metrics = deps.metrics.clone();

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(health::health_handler))
        .layer(middleware::from_fn(move |request, next| {
            jwt_auth_middleware(jwt_for_middleware.clone(), request, next)
        }))
        .layer(middleware::from_fn(move |request, next| {
            metrics_middleware(metrics.clone(), request, next)
        }))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
