//! Catalog endpoints. Reads are public, writes need an admin caller.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Money, Product, ProductId};
use domain::{NewProduct, ProductPatch};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::AppState;
use crate::auth::CurrentCaller;
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::routes::parse_id;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub stock: u32,
}

#[derive(Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub stock: Option<u32>,
    pub active: Option<bool>,
}

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub stock: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name,
            description: product.description,
            price_cents: product.price.cents(),
            stock: product.stock,
            active: product.active,
            created_at: product.created_at,
        }
    }
}

fn many(products: Vec<Product>) -> Vec<ProductResponse> {
    products.into_iter().map(ProductResponse::from).collect()
}

// -- Handlers --

/// POST /products (admin).
#[tracing::instrument(skip(state, caller, payload))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCaller(caller): CurrentCaller,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<ProductResponse>>), ApiError> {
    let Json(req) = payload?;
    let input = NewProduct {
        name: req.name,
        description: req.description,
        price: Money::from_cents(req.price_cents),
        stock: req.stock,
    };

    let product = state.catalog.create_product(&caller, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Product created successfully", product.into())),
    ))
}

/// GET /products?include_inactive=bool
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<ProductResponse>>>, ApiError> {
    let Query(params) = query?;
    let products = state.catalog.list_products(params.include_inactive).await?;
    Ok(Json(ApiResponse::ok(
        "Products retrieved successfully",
        many(products),
    )))
}

/// GET /products/active
pub async fn list_active<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<ApiResponse<Vec<ProductResponse>>>, ApiError> {
    let products = state.catalog.list_active_products().await?;
    Ok(Json(ApiResponse::ok(
        "Active products retrieved successfully",
        many(products),
    )))
}

/// GET /products/search?q=term
pub async fn search<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    query: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<ProductResponse>>>, ApiError> {
    let Query(params) = query?;
    let products = state.catalog.search_products(&params.q).await?;
    Ok(Json(ApiResponse::ok(
        "Search results retrieved successfully",
        many(products),
    )))
}

/// GET /products/{id}
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ProductResponse>>, ApiError> {
    let product_id: ProductId = parse_id("product", &id)?;
    let product = state.catalog.get_product(product_id).await?;
    Ok(Json(ApiResponse::ok(
        "Product retrieved successfully",
        product.into(),
    )))
}

/// PUT /products/{id} (admin): partial update.
#[tracing::instrument(skip(state, caller, payload))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<String>,
    payload: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ProductResponse>>, ApiError> {
    let product_id: ProductId = parse_id("product", &id)?;
    let Json(req) = payload?;
    let patch = ProductPatch {
        name: req.name,
        description: req.description,
        price: req.price_cents.map(Money::from_cents),
        stock: req.stock,
        active: req.active,
    };

    let product = state
        .catalog
        .update_product(&caller, product_id, patch)
        .await?;
    Ok(Json(ApiResponse::ok(
        "Product updated successfully",
        product.into(),
    )))
}

/// PUT /products/{id}/deactivate (admin).
#[tracing::instrument(skip(state, caller))]
pub async fn deactivate<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ProductResponse>>, ApiError> {
    let product_id: ProductId = parse_id("product", &id)?;
    let product = state
        .catalog
        .deactivate_product(&caller, product_id)
        .await?;
    Ok(Json(ApiResponse::ok(
        "Product deactivated successfully",
        product.into(),
    )))
}

/// DELETE /products/{id} (admin).
#[tracing::instrument(skip(state, caller))]
pub async fn delete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let product_id: ProductId = parse_id("product", &id)?;
    state.catalog.delete_product(&caller, product_id).await?;
    Ok(Json(ApiResponse::empty("Product deleted successfully")))
}
