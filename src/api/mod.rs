pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    service::PaymentService,
};
use state::AppState;

pub fn create_app(payment_service: Arc<PaymentService>, settings: Arc<Settings>) -> Router {
    let app_state = AppState::new(payment_service, settings);

    Router::new()
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))
        .nest("/api/payments", payment_routes(app_state.clone()))
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn payment_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Gateway notifications carry their own signature, no API key
        .route("/webhook", post(handlers::payments::webhook))
        .merge(
            Router::new()
                .route("/", get(handlers::payments::list).post(handlers::payments::create))
                .route("/:uuid", get(handlers::payments::get))
                .route("/:uuid/histories", get(handlers::payments::histories))
                .route_layer(axum::middleware::from_fn_with_state(
                    state,
                    middleware::auth::require_api_key,
                )),
        )
}
