//! The order aggregate: an order and the lines it exclusively owns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Money, OrderId, OrderLineId, OrderStatus, ProductId, UserId};

/// One product-quantity-price record within an order.
///
/// Lines are immutable once created. `unit_price` is the product price at the
/// moment of purchase and does not follow later catalog edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    /// Returns `unit_price * quantity`.
    ///
    /// Lines only exist inside an order whose total was computed with checked
    /// arithmetic, so this cannot overflow for a persisted line.
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Reasons a set of lines cannot form an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderLinesError {
    #[error("Order must contain at least one line")]
    Empty,

    #[error("Order total exceeds the representable amount")]
    TotalOverflow,
}

/// Order aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    status: OrderStatus,
    total: Money,
    lines: Vec<OrderLine>,
    /// Set once the reserved units have gone back to stock.
    stock_released: bool,
    created_at: DateTime<Utc>,
}

impl Order {
    /// Builds a new `Pending` order from its lines, computing the total.
    ///
    /// Each line's `order_id` is rewritten to `id`.
    pub fn new(
        id: OrderId,
        user_id: UserId,
        mut lines: Vec<OrderLine>,
    ) -> Result<Self, OrderLinesError> {
        if lines.is_empty() {
            return Err(OrderLinesError::Empty);
        }

        for line in &mut lines {
            line.order_id = id;
        }

        let total = Money::checked_total(lines.iter().map(|l| (l.unit_price, l.quantity)))
            .ok_or(OrderLinesError::TotalOverflow)?;

        Ok(Self {
            id,
            user_id,
            status: OrderStatus::default(),
            total,
            lines,
            stock_released: false,
            created_at: Utc::now(),
        })
    }

    /// Reassembles an order from persisted parts.
    pub fn restore(
        id: OrderId,
        user_id: UserId,
        status: OrderStatus,
        total: Money,
        lines: Vec<OrderLine>,
        stock_released: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            status,
            total,
            lines,
            stock_released,
            created_at,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    /// Returns the owning user.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns the total, always equal to the sum of line subtotals.
    pub fn total(&self) -> Money {
        self.total
    }

    /// Returns the lines in the order they were requested.
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns true once the order's units have been restocked.
    ///
    /// Reopening a cancelled order does not clear this, so a reservation is
    /// returned at most once.
    pub fn stock_released(&self) -> bool {
        self.stock_released
    }

    pub fn mark_stock_released(&mut self) {
        self.stock_released = true;
    }

    /// Overwrites the status. Lines and total are never touched.
    pub fn set_status(&mut self, status: OrderStatus) {
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: u32, cents: i64) -> OrderLine {
        OrderLine {
            id: OrderLineId::new(),
            order_id: OrderId::new(),
            product_id: ProductId::new(),
            quantity,
            unit_price: Money::from_cents(cents),
        }
    }

    #[test]
    fn new_order_is_pending_with_exact_total() {
        let order = Order::new(
            OrderId::new(),
            UserId::new(),
            vec![line(3, 1999), line(1, 501)],
        )
        .unwrap();

        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.total().cents(), 3 * 1999 + 501);
        let sum: i64 = order.lines().iter().map(|l| l.subtotal().cents()).sum();
        assert_eq!(order.total().cents(), sum);
    }

    #[test]
    fn new_order_claims_its_lines() {
        let id = OrderId::new();
        let order = Order::new(id, UserId::new(), vec![line(1, 100), line(2, 100)]).unwrap();
        assert!(order.lines().iter().all(|l| l.order_id == id));
    }

    #[test]
    fn empty_order_is_rejected() {
        let result = Order::new(OrderId::new(), UserId::new(), vec![]);
        assert_eq!(result, Err(OrderLinesError::Empty));
    }

    #[test]
    fn overflowing_total_is_rejected() {
        let result = Order::new(
            OrderId::new(),
            UserId::new(),
            vec![line(u32::MAX, i64::MAX / 2)],
        );
        assert_eq!(result, Err(OrderLinesError::TotalOverflow));
    }

    #[test]
    fn set_status_keeps_lines_and_total() {
        let mut order = Order::new(OrderId::new(), UserId::new(), vec![line(2, 250)]).unwrap();
        order.set_status(OrderStatus::Shipped);
        assert_eq!(order.status(), OrderStatus::Shipped);
        assert_eq!(order.total().cents(), 500);
        assert_eq!(order.lines().len(), 1);
    }

    #[test]
    fn stock_release_survives_status_changes() {
        let mut order = Order::new(OrderId::new(), UserId::new(), vec![line(1, 100)]).unwrap();
        assert!(!order.stock_released());

        order.mark_stock_released();
        order.set_status(OrderStatus::Pending);
        assert!(order.stock_released());
    }
}
