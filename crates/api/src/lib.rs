//! HTTP API for the order management backend.
//!
//! Exposes REST endpoints for the catalog, accounts and orders, wrapping
//! every body in the [`response::ApiResponse`] envelope, with structured
//! logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod response;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{AccountService, CatalogService, OrderPolicy, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for all handlers.
pub struct AppState<S: Store> {
    pub orders: OrderService<S>,
    pub catalog: CatalogService<S>,
    pub accounts: AccountService<S>,
    /// Name of the storage backend, reported by `/health`.
    pub backend: &'static str,
}

impl<S: Store + Clone> AppState<S> {
    pub fn new(store: S, policy: OrderPolicy, backend: &'static str) -> Self {
        Self {
            orders: OrderService::with_policy(store.clone(), policy),
            catalog: CatalogService::new(store.clone()),
            accounts: AccountService::new(store),
            backend,
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health::<S>))
        // Orders
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list_all::<S>),
        )
        .route("/orders/status", get(routes::orders::list_by_status::<S>))
        .route("/orders/my-orders", get(routes::orders::my_orders::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/status", put(routes::orders::update_status::<S>))
        .route("/orders/{id}/cancel", put(routes::orders::cancel::<S>))
        // Catalog
        .route(
            "/products",
            post(routes::products::create::<S>).get(routes::products::list::<S>),
        )
        .route("/products/active", get(routes::products::list_active::<S>))
        .route("/products/search", get(routes::products::search::<S>))
        .route(
            "/products/{id}",
            get(routes::products::get::<S>)
                .put(routes::products::update::<S>)
                .delete(routes::products::delete::<S>),
        )
        .route(
            "/products/{id}/deactivate",
            put(routes::products::deactivate::<S>),
        )
        // Accounts
        .route(
            "/users",
            post(routes::users::register::<S>).get(routes::users::list::<S>),
        )
        .route("/users/me", get(routes::users::me::<S>))
        .route("/users/{id}", get(routes::users::get::<S>))
        .route("/users/{id}/promote", put(routes::users::promote::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
