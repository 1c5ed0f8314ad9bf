pub mod auth;
pub mod config;
pub mod dates;
pub mod error;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod store;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Extension, Router,
};

use crate::{config::MetricsConfig, store::ReleaseStore};

#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn ReleaseStore>,
    pub metrics: MetricsConfig,
}

impl AppContext {
    pub fn new(store: Arc<dyn ReleaseStore>, metrics: MetricsConfig) -> Self {
        Self { store, metrics }
    }
}

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/metrics", get(routes::get_metrics))
        .route("/api/metrics/deployment-volume", get(routes::deployment_volume))
        .route("/api/releases", get(routes::list_releases).post(routes::add_release))
        .route(
            "/api/releases/:id",
            put(routes::update_release).delete(routes::delete_release),
        )
        .route("/api/releases/:id/incidents", get(routes::release_incidents))
        .route("/api/incidents", post(routes::add_incident))
        .route("/api/incidents/:id", delete(routes::delete_incident))
        .layer(Extension(ctx))
}
