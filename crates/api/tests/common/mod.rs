//! Common test utilities for integration tests.
//!
//! The router runs over in-memory repositories and a pinned clock, so these
//! tests need no database.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use conference_api::{app::create_app, config::Config};
use domain::models::User;
use domain::repositories::InMemoryStore;
use domain::services::{RecordingMailer, Repositories, SchedulerSettings, Services};
use serde_json::{json, Value};
use shared::FixedClock;
use std::sync::Arc;
use tower::ServiceExt;

/// Default instant tests start at: 2026-02-01 10:00 UTC.
pub fn start_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap()
}

/// Test configuration; never validated, so the database URL stays empty.
pub fn test_config() -> Config {
    Config {
        server: conference_api::config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            request_timeout_secs: 5,
            cors_origins: vec![],
        },
        database: conference_api::config::DatabaseConfig {
            url: String::new(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 10,
            idle_timeout_secs: 600,
        },
        logging: conference_api::config::LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        scheduler: conference_api::config::SchedulerConfig::default(),
        email: conference_api::config::EmailConfig::default(),
    }
}

/// Router plus handles on everything behind it.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<FixedClock>,
    pub mailer: Arc<RecordingMailer>,
    pub services: Services,
}

impl TestApp {
    pub fn new() -> Self {
        Self::at(start_instant())
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(now));
        let mailer = Arc::new(RecordingMailer::new());
        let services = Services::new(
            Repositories::in_memory(store.clone()),
            mailer.clone(),
            clock.clone(),
            SchedulerSettings::default(),
        );
        let router = create_app(test_config(), services.clone(), None);
        Self {
            router,
            store,
            clock,
            mailer,
            services,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn add_user(&self, name: &str, email: &str) -> User {
        self.store.add_user(name, email).await
    }

    /// Creates an event through the API and returns its id.
    pub async fn create_event(&self, name: &str, start: &str, end: &str, close: &str) -> i64 {
        let response = self
            .send(json_request(
                Method::POST,
                "/api/v1/events",
                event_body(name, start, end, close),
            ))
            .await;
        assert_eq!(response.status(), 201, "event creation failed");
        parse_response_body(response).await["id_evento"]
            .as_i64()
            .unwrap()
    }

    /// Registers `user` for `event_id` through the API and returns the response body.
    pub async fn register(&self, event_id: i64, user: &User) -> (u16, Value) {
        let response = self
            .send(json_request(
                Method::POST,
                "/api/v1/registrations",
                json!({
                    "id_evento": event_id,
                    "id_usuario": user.id,
                    "nombre_participante": user.name,
                    "email": user.email,
                    "afiliacion": "Universidad Nacional",
                }),
            ))
            .await;
        let status = response.status().as_u16();
        (status, parse_response_body(response).await)
    }
}

pub fn event_body(name: &str, start: &str, end: &str, close: &str) -> Value {
    json!({
        "nombre": name,
        "fecha_inicio": start,
        "fecha_fin": end,
        "fecha_cierre_inscripcion": close,
        "ubicacion": "Lima, Perú",
    })
}

/// Build a JSON request.
pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Build a bodiless request.
pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    empty_request(Method::GET, uri)
}

/// Parse response body as JSON.
pub async fn parse_response_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}
