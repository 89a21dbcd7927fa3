//! Externally visible order summaries.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{Money, Order, OrderId, OrderLineId, OrderStatus, ProductId, UserId};
use store::Store;

use crate::error::DomainError;

/// An order with its owner's name and per-line product names and subtotals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    pub id: OrderId,
    pub user_id: UserId,
    pub user_name: String,
    pub status: OrderStatus,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLineSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineSummary {
    pub id: OrderLineId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
}

/// Resolves user and product names for summaries, caching each lookup.
pub(crate) struct Summarizer<'a, S: Store> {
    store: &'a S,
    users: HashMap<UserId, String>,
    products: HashMap<ProductId, String>,
}

impl<'a, S: Store> Summarizer<'a, S> {
    pub(crate) fn new(store: &'a S) -> Self {
        Self {
            store,
            users: HashMap::new(),
            products: HashMap::new(),
        }
    }

    pub(crate) async fn summarize(&mut self, order: Order) -> Result<OrderSummary, DomainError> {
        let user_name = self.user_name(order.user_id()).await?;

        let mut lines = Vec::with_capacity(order.lines().len());
        for line in order.lines() {
            lines.push(OrderLineSummary {
                id: line.id,
                product_id: line.product_id,
                product_name: self.product_name(line.product_id).await?,
                quantity: line.quantity,
                unit_price: line.unit_price,
                subtotal: line.subtotal(),
            });
        }

        Ok(OrderSummary {
            id: order.id(),
            user_id: order.user_id(),
            user_name,
            status: order.status(),
            total: order.total(),
            created_at: order.created_at(),
            lines,
        })
    }

    pub(crate) async fn summarize_all(
        &mut self,
        orders: Vec<Order>,
    ) -> Result<Vec<OrderSummary>, DomainError> {
        let mut summaries = Vec::with_capacity(orders.len());
        for order in orders {
            summaries.push(self.summarize(order).await?);
        }
        Ok(summaries)
    }

    async fn user_name(&mut self, id: UserId) -> Result<String, DomainError> {
        if let Some(name) = self.users.get(&id) {
            return Ok(name.clone());
        }
        let user = self
            .store
            .get_user(id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", id))?;
        self.users.insert(id, user.name.clone());
        Ok(user.name)
    }

    async fn product_name(&mut self, id: ProductId) -> Result<String, DomainError> {
        if let Some(name) = self.products.get(&id) {
            return Ok(name.clone());
        }
        let product = self
            .store
            .get_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", id))?;
        self.products.insert(id, product.name.clone());
        Ok(product.name)
    }
}
