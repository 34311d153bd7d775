use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use domain::services::Services;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{events, health, notifications, registrations};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub services: Services,
    /// `None` when the service runs on in-memory repositories.
    pub pool: Option<PgPool>,
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.server.cors_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<_> = config
        .server
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn create_app(config: Config, services: Services, pool: Option<PgPool>) -> Router {
    let config = Arc::new(config);
    let cors = cors_layer(&config);

    let state = AppState {
        config: config.clone(),
        services,
        pool,
    };

    let event_routes = Router::new()
        .route(
            "/api/v1/events",
            post(events::create_event).get(events::list_events),
        )
        .route("/api/v1/events/occupied-dates", get(events::occupied_dates))
        .route(
            "/api/v1/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .patch(events::apply_window_action)
                .delete(events::delete_event),
        );

    let registration_routes = Router::new()
        .route(
            "/api/v1/registrations",
            post(registrations::create_registration).get(registrations::list_registrations),
        )
        .route(
            "/api/v1/registrations/summary",
            get(registrations::status_summary),
        )
        .route(
            "/api/v1/registrations/:id",
            get(registrations::get_registration).delete(registrations::cancel_registration),
        )
        .route(
            "/api/v1/registrations/:id/status",
            patch(registrations::update_status),
        )
        .route(
            "/api/v1/registrations/:id/payment",
            patch(registrations::update_payment),
        )
        .route(
            "/api/v1/registrations/:id/history",
            get(registrations::history),
        );

    let notification_routes = Router::new()
        .route(
            "/api/v1/users/:id/notifications",
            get(notifications::list_for_user),
        )
        .route(
            "/api/v1/users/:id/notification-preferences",
            get(notifications::get_preferences).put(notifications::update_preferences),
        )
        .route("/api/v1/notifications/:id", patch(notifications::mark_read));

    // Public routes
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(event_routes)
        .merge(registration_routes)
        .merge(notification_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
