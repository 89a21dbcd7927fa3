//! Order placement, lifecycle and listing endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OrderId, OrderStatus, ProductId};
use domain::{LineRequest, OrderSummary};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::AppState;
use crate::auth::CurrentCaller;
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::routes::parse_id;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct StatusFilter {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

impl From<OrderSummary> for OrderResponse {
    fn from(order: OrderSummary) -> Self {
        Self {
            id: order.id.to_string(),
            user_id: order.user_id.to_string(),
            user_name: order.user_name,
            status: order.status,
            total_cents: order.total.cents(),
            created_at: order.created_at,
            items: order
                .lines
                .into_iter()
                .map(|line| OrderItemResponse {
                    id: line.id.to_string(),
                    product_id: line.product_id.to_string(),
                    product_name: line.product_name,
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price.cents(),
                    subtotal_cents: line.subtotal.cents(),
                })
                .collect(),
        }
    }
}

fn parse_status(raw: &str) -> Result<OrderStatus, ApiError> {
    raw.parse()
        .map_err(|e: common::ParseEnumError| ApiError::BadRequest(e.to_string()))
}

fn many(orders: Vec<OrderSummary>) -> Vec<OrderResponse> {
    orders.into_iter().map(OrderResponse::from).collect()
}

// -- Handlers --

/// POST /orders: place an order for the calling customer.
#[tracing::instrument(skip(state, caller, payload))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCaller(caller): CurrentCaller,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ApiError> {
    let Json(req) = payload?;
    let lines = req
        .items
        .iter()
        .map(|item| {
            let product_id: ProductId = parse_id("product", &item.product_id)?;
            Ok(LineRequest::new(product_id, item.quantity))
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let order = state.orders.place_order(&caller, lines).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Order created successfully", order.into())),
    ))
}

/// GET /orders: every order (admin).
#[tracing::instrument(skip(state, caller))]
pub async fn list_all<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCaller(caller): CurrentCaller,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, ApiError> {
    let orders = state.orders.list_all(&caller).await?;
    Ok(Json(ApiResponse::ok("Orders retrieved successfully", many(orders))))
}

/// GET /orders/status?status=X: orders in one status (admin).
#[tracing::instrument(skip(state, caller, query))]
pub async fn list_by_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCaller(caller): CurrentCaller,
    query: Result<Query<StatusFilter>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, ApiError> {
    let Query(filter) = query?;
    let status = parse_status(&filter.status)?;
    let orders = state.orders.list_by_status(&caller, status).await?;
    Ok(Json(ApiResponse::ok("Orders retrieved successfully", many(orders))))
}

/// GET /orders/my-orders: the caller's own orders.
#[tracing::instrument(skip(state, caller))]
pub async fn my_orders<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCaller(caller): CurrentCaller,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, ApiError> {
    let orders = state.orders.list_for_user(&caller).await?;
    Ok(Json(ApiResponse::ok("Orders retrieved successfully", many(orders))))
}

/// GET /orders/{id}: one order, for its owner or an admin.
#[tracing::instrument(skip(state, caller))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<OrderResponse>>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let order = state.orders.get(order_id, &caller).await?;
    Ok(Json(ApiResponse::ok("Order retrieved successfully", order.into())))
}

/// PUT /orders/{id}/status: overwrite the status (admin).
#[tracing::instrument(skip(state, caller, payload))]
pub async fn update_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<OrderResponse>>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let Json(req) = payload?;
    let status = parse_status(&req.status)?;

    let order = state
        .orders
        .update_status(order_id, status, &caller)
        .await?;
    Ok(Json(ApiResponse::ok(
        "Order status updated successfully",
        order.into(),
    )))
}

/// PUT /orders/{id}/cancel: cancel one of the caller's pending orders.
#[tracing::instrument(skip(state, caller))]
pub async fn cancel<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCaller(caller): CurrentCaller,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<OrderResponse>>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let order = state.orders.cancel(order_id, &caller).await?;
    Ok(Json(ApiResponse::ok(
        "Order cancelled successfully",
        order.into(),
    )))
}
