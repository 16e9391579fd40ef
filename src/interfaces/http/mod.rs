//! HTTP surface: one route set per event, mounted at the event's path.

pub mod handlers;
pub mod page;
pub mod response;

use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::application::service::RegistrationService;

/// Routes of a single event, relative to its mount path.
pub fn event_routes(service: Arc<RegistrationService>) -> Router {
    Router::new()
        .route("/check-registration", post(handlers::check_registration))
        .route("/register", post(handlers::register))
        .route("/payment-callback", post(handlers::payment_callback))
        .route("/check-payment-status", post(handlers::check_payment_status))
        .route("/verify", get(handlers::verify_page).post(handlers::verify_page))
        .with_state(service)
}

/// Full application router for the given event services.
pub fn router(services: Vec<Arc<RegistrationService>>) -> Router {
    let mut app = Router::new().route("/", get(handlers::welcome));
    for service in services {
        let mount = service.event().mount_path.clone();
        app = app.nest(&mount, event_routes(service));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
