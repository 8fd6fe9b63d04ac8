//! storage-service: directory/file storage with group-based, tree-inherited
//! authorization.

pub mod authz;
pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

use crate::services::{BlobStore, EventPublisher, ResourceService, ResourceStore};
use axum::{
    extract::{DefaultBodyLimit, Request},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::{make_request_span, request_id_middleware};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub service: ResourceService,
    pub resources: Arc<dyn ResourceStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub events: Arc<dyn EventPublisher>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/v1/dirs", post(handlers::create_directory))
        .route(
            "/v1/dirs/:dir_id",
            get(handlers::get_directory)
                .put(handlers::rename_directory)
                .delete(handlers::delete_directory),
        )
        .route("/v1/dirs/:dir_id/children", get(handlers::list_children))
        .route("/v1/dirs/:dir_id/files", post(handlers::upload_file))
        .route(
            "/v1/files/:file_id",
            get(handlers::get_file)
                .put(handlers::rename_file)
                .delete(handlers::delete_file),
        )
        .route("/v1/files/:file_id/content", get(handlers::download_file))
        .route("/v1/files/:file_id/url", get(handlers::presign_file_url))
        .route(
            "/v1/resources/:resource_id/permissions",
            post(handlers::grant_permission).delete(handlers::revoke_permission),
        )
        .route(
            "/v1/resources/:resource_id/authgroups",
            get(handlers::list_authorized_groups),
        )
        .route(
            "/v1/resources/:resource_id/access",
            get(handlers::check_access),
        )
        .route("/v1/blobs/*key", get(handlers::get_blob))
        // Multipart framing on top of the largest accepted file
        .layer(DefaultBodyLimit::max(handlers::files::MAX_UPLOAD_BYTES + 64 * 1024))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request| make_request_span(req)))
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
