//! Order status transitions.
//!
//! `PENDING` is the only start state. A customer may move their own pending
//! order to `CANCELLED`. Administrators may overwrite the status with any
//! value, including moving an order out of `CANCELLED`; that overwrite is
//! intentionally unrestricted.

use common::{Order, OrderId, OrderStatus};
use store::UnitOfWork;

use crate::auth::{Action, Caller, authorize};
use crate::error::DomainError;

/// Tunables for the order lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderPolicy {
    /// Put the reserved units back on the shelf when a customer cancels.
    pub restore_stock_on_cancel: bool,
}

impl OrderPolicy {
    pub fn restore_stock_on_cancel(mut self, restore: bool) -> Self {
        self.restore_stock_on_cancel = restore;
        self
    }
}

/// Checks that `caller` may cancel `order` right now.
///
/// Ownership is checked before status.
pub(crate) fn check_cancel(order: &Order, caller: &Caller) -> Result<(), DomainError> {
    authorize(caller, Action::CancelOrder, Some(order.user_id()))?;
    if !order.status().can_cancel() {
        return Err(DomainError::InvalidTransition {
            from: order.status(),
            to: OrderStatus::Cancelled,
        });
    }
    Ok(())
}

/// Cancels an order inside `uow`, restocking its lines if `policy` says so.
pub(crate) async fn cancel_order<U: UnitOfWork>(
    uow: &mut U,
    order_id: OrderId,
    caller: &Caller,
    policy: OrderPolicy,
) -> Result<Order, DomainError> {
    let mut order = uow
        .get_order_for_update(order_id)
        .await?
        .ok_or_else(|| DomainError::not_found("Order", order_id))?;

    check_cancel(&order, caller)?;
    uow.update_order_status(order_id, OrderStatus::Cancelled)
        .await?;

    // A reopened order has already given its units back.
    if policy.restore_stock_on_cancel && !order.stock_released() {
        let ids: Vec<_> = order.lines().iter().map(|line| line.product_id).collect();
        uow.lock_products(&ids).await?;
        for line in order.lines() {
            uow.restock(line.product_id, line.quantity).await?;
        }
        uow.mark_stock_released(order_id).await?;
        order.mark_stock_released();
    }

    order.set_status(OrderStatus::Cancelled);
    Ok(order)
}

/// Overwrites an order's status inside `uow`. Inventory is never touched.
pub(crate) async fn overwrite_status<U: UnitOfWork>(
    uow: &mut U,
    order_id: OrderId,
    status: OrderStatus,
) -> Result<(Order, OrderStatus), DomainError> {
    let mut order = uow
        .get_order_for_update(order_id)
        .await?
        .ok_or_else(|| DomainError::not_found("Order", order_id))?;

    let previous = order.status();
    uow.update_order_status(order_id, status).await?;
    order.set_status(status);
    Ok((order, previous))
}

#[cfg(test)]
mod tests {
    use common::{Money, OrderLine, OrderLineId, ProductId, UserId};

    use super::*;

    fn order_in(status: OrderStatus, owner: UserId) -> Order {
        let id = OrderId::new();
        let line = OrderLine {
            id: OrderLineId::new(),
            order_id: id,
            product_id: ProductId::new(),
            quantity: 1,
            unit_price: Money::from_cents(100),
        };
        let mut order = Order::new(id, owner, vec![line]).unwrap();
        order.set_status(status);
        order
    }

    #[test]
    fn only_pending_orders_can_be_cancelled() {
        let owner = UserId::new();
        let caller = Caller::user(owner);

        assert!(check_cancel(&order_in(OrderStatus::Pending, owner), &caller).is_ok());

        for status in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            let result = check_cancel(&order_in(status, owner), &caller);
            assert!(
                matches!(result, Err(DomainError::InvalidTransition { from, .. }) if from == status),
                "{status}"
            );
        }
    }

    #[test]
    fn ownership_is_checked_before_status() {
        let order = order_in(OrderStatus::Shipped, UserId::new());
        let stranger = Caller::user(UserId::new());
        assert!(matches!(
            check_cancel(&order, &stranger),
            Err(DomainError::Unauthorized(_))
        ));
    }

    #[test]
    fn policy_defaults_to_keeping_stock() {
        assert!(!OrderPolicy::default().restore_stock_on_cancel);
        assert!(
            OrderPolicy::default()
                .restore_stock_on_cancel(true)
                .restore_stock_on_cancel
        );
    }
}
