//! Order service providing the public API for order operations.

use std::time::Instant;

use common::{Order, OrderId, OrderStatus, UserId};
use store::{OrderQuery, Store};

use crate::auth::{Action, Caller, authorize};
use crate::error::DomainError;
use crate::unit::finish;

use super::lifecycle::{OrderPolicy, cancel_order, overwrite_status};
use super::placement::{LineRequest, reserve_order, validate_lines};
use super::summary::{OrderSummary, Summarizer};

/// Service for placing and managing orders.
///
/// Every write runs in its own unit of work: placement locks the product
/// rows it reserves from, status changes lock the order row.
#[derive(Clone)]
pub struct OrderService<S: Store> {
    store: S,
    policy: OrderPolicy,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service with the default policy.
    pub fn new(store: S) -> Self {
        Self::with_policy(store, OrderPolicy::default())
    }

    pub fn with_policy(store: S, policy: OrderPolicy) -> Self {
        Self { store, policy }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> OrderPolicy {
        self.policy
    }

    /// Places an order for the caller.
    ///
    /// Either every line is reserved and the order is stored, or nothing
    /// changes. Concurrent placements against the same products serialize on
    /// the product locks, so their combined quantities never exceed stock.
    #[tracing::instrument(skip(self, caller, lines), fields(user_id = %caller.user_id, lines = lines.len()))]
    pub async fn place_order(
        &self,
        caller: &Caller,
        lines: Vec<LineRequest>,
    ) -> Result<OrderSummary, DomainError> {
        let started = Instant::now();
        let result = self.try_place_order(caller, &lines).await;
        metrics::histogram!("order_placement_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(order) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(order_id = %order.id(), total = %order.total(), "order placed");
                Summarizer::new(&self.store).summarize(order).await
            }
            Err(err) => {
                metrics::counter!("orders_rejected_total", "reason" => err.reason()).increment(1);
                tracing::warn!(error = %err, "order rejected");
                Err(err)
            }
        }
    }

    async fn try_place_order(
        &self,
        caller: &Caller,
        lines: &[LineRequest],
    ) -> Result<Order, DomainError> {
        authorize(caller, Action::PlaceOrder, None)?;
        validate_lines(lines)?;
        self.store
            .get_user(caller.user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", caller.user_id))?;

        let mut uow = self.store.begin().await?;
        let result = reserve_order(&mut uow, caller.user_id, lines).await;
        finish(uow, result).await
    }

    /// Cancels one of the caller's own pending orders.
    #[tracing::instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn cancel(
        &self,
        order_id: OrderId,
        caller: &Caller,
    ) -> Result<OrderSummary, DomainError> {
        let mut uow = self.store.begin().await?;
        let result = cancel_order(&mut uow, order_id, caller, self.policy).await;
        let order = finish(uow, result).await?;

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(
            %order_id,
            restocked = self.policy.restore_stock_on_cancel,
            "order cancelled"
        );
        Summarizer::new(&self.store).summarize(order).await
    }

    /// Overwrites an order's status. Admin only, with no transition checks.
    #[tracing::instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        caller: &Caller,
    ) -> Result<OrderSummary, DomainError> {
        authorize(caller, Action::ManageOrders, None)?;

        let mut uow = self.store.begin().await?;
        let result = overwrite_status(&mut uow, order_id, status).await;
        let (order, previous) = finish(uow, result).await?;

        metrics::counter!("order_status_updates_total").increment(1);
        tracing::info!(%order_id, from = %previous, to = %status, "order status updated");
        Summarizer::new(&self.store).summarize(order).await
    }

    /// Reads an order. Users see only their own; admins see all.
    pub async fn get(&self, order_id: OrderId, caller: &Caller) -> Result<OrderSummary, DomainError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", order_id))?;

        authorize(caller, Action::ViewOrder, Some(order.user_id()))?;
        Summarizer::new(&self.store).summarize(order).await
    }

    /// Reads an order on behalf of a customer.
    pub async fn get_for_owner(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<OrderSummary, DomainError> {
        self.get(order_id, &Caller::user(user_id)).await
    }

    /// Lists every order, oldest first.
    pub async fn list_all(&self, caller: &Caller) -> Result<Vec<OrderSummary>, DomainError> {
        authorize(caller, Action::ManageOrders, None)?;
        self.list(OrderQuery::new()).await
    }

    pub async fn list_by_status(
        &self,
        caller: &Caller,
        status: OrderStatus,
    ) -> Result<Vec<OrderSummary>, DomainError> {
        authorize(caller, Action::ManageOrders, None)?;
        self.list(OrderQuery::with_status(status)).await
    }

    /// Lists the caller's own orders.
    pub async fn list_for_user(&self, caller: &Caller) -> Result<Vec<OrderSummary>, DomainError> {
        authorize(caller, Action::ListOwnOrders, None)?;
        self.list(OrderQuery::for_user(caller.user_id)).await
    }

    async fn list(&self, query: OrderQuery) -> Result<Vec<OrderSummary>, DomainError> {
        let orders = self.store.list_orders(query).await?;
        Summarizer::new(&self.store).summarize_all(orders).await
    }
}
