//! Inventory reservation for new orders.

use common::{Order, OrderId, OrderLine, OrderLineId, OrderLinesError, ProductId, UserId};
use store::UnitOfWork;

use crate::error::DomainError;

/// One requested line of a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl LineRequest {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Rejects empty carts and zero quantities before any lock is taken.
pub(crate) fn validate_lines(lines: &[LineRequest]) -> Result<(), DomainError> {
    if lines.is_empty() {
        return Err(DomainError::Validation(
            "an order needs at least one line".to_string(),
        ));
    }
    if let Some(line) = lines.iter().find(|line| line.quantity == 0) {
        return Err(DomainError::Validation(format!(
            "quantity for product {} must be at least 1",
            line.product_id
        )));
    }
    Ok(())
}

/// Reserves stock for every line and stages the new order in `uow`.
///
/// All product rows are locked up front in ascending id order. Lines are
/// then checked in request order: missing product, inactive product, short
/// stock. The first failing line aborts the whole order; nothing is
/// visible outside `uow` until it commits.
pub(crate) async fn reserve_order<U: UnitOfWork>(
    uow: &mut U,
    user_id: UserId,
    lines: &[LineRequest],
) -> Result<Order, DomainError> {
    let ids: Vec<ProductId> = lines.iter().map(|line| line.product_id).collect();
    uow.lock_products(&ids).await?;

    let order_id = OrderId::new();
    let mut reserved = Vec::with_capacity(lines.len());

    for request in lines {
        let product = uow
            .get_product(request.product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", request.product_id))?;

        if !product.active {
            return Err(DomainError::Unavailable {
                product_id: product.id,
                name: product.name,
            });
        }
        if request.quantity > product.stock {
            return Err(DomainError::InsufficientStock {
                product_id: product.id,
                requested: request.quantity,
                available: product.stock,
            });
        }

        reserved.push(OrderLine {
            id: OrderLineId::new(),
            order_id,
            product_id: product.id,
            quantity: request.quantity,
            unit_price: product.price,
        });
        uow.decrement_stock(product.id, request.quantity).await?;
    }

    let order = Order::new(order_id, user_id, reserved)
        .map_err(|e: OrderLinesError| DomainError::Validation(e.to_string()))?;
    uow.insert_order(&order).await?;

    Ok(order)
}

#[cfg(test)]
mod tests {
    use common::{Money, Product};
    use store::{InMemoryStore, Store};

    use super::*;

    async fn store_with(products: &[(i64, u32, bool)]) -> (InMemoryStore, Vec<Product>) {
        let store = InMemoryStore::new();
        let mut created = Vec::new();
        for (i, (price, stock, active)) in products.iter().enumerate() {
            let mut product = Product::new(
                format!("Product {i}"),
                None,
                Money::from_cents(*price),
                *stock,
            );
            product.active = *active;
            store.insert_product(&product).await.unwrap();
            created.push(product);
        }
        (store, created)
    }

    #[test]
    fn empty_and_zero_quantity_are_rejected() {
        assert!(matches!(
            validate_lines(&[]),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            validate_lines(&[LineRequest::new(ProductId::new(), 0)]),
            Err(DomainError::Validation(_))
        ));
        assert!(validate_lines(&[LineRequest::new(ProductId::new(), 1)]).is_ok());
    }

    #[tokio::test]
    async fn total_is_sum_of_snapshotted_lines() {
        let (store, products) = store_with(&[(1250, 10, true), (399, 10, true)]).await;
        let mut uow = store.begin().await.unwrap();

        let order = reserve_order(
            &mut uow,
            UserId::new(),
            &[
                LineRequest::new(products[0].id, 2),
                LineRequest::new(products[1].id, 3),
            ],
        )
        .await
        .unwrap();

        assert_eq!(order.total(), Money::from_cents(2 * 1250 + 3 * 399));
        assert_eq!(order.lines()[0].unit_price, Money::from_cents(1250));
        assert_eq!(order.lines()[1].product_id, products[1].id);
    }

    #[tokio::test]
    async fn checks_run_in_line_order() {
        let (store, products) = store_with(&[(100, 0, false), (100, 0, true)]).await;
        let mut uow = store.begin().await.unwrap();

        let result = reserve_order(
            &mut uow,
            UserId::new(),
            &[
                LineRequest::new(products[1].id, 1),
                LineRequest::new(products[0].id, 1),
            ],
        )
        .await;

        assert!(matches!(result, Err(DomainError::InsufficientStock { .. })));
    }

    #[tokio::test]
    async fn repeated_product_draws_from_the_same_stock() {
        let (store, products) = store_with(&[(100, 5, true)]).await;
        let mut uow = store.begin().await.unwrap();

        let result = reserve_order(
            &mut uow,
            UserId::new(),
            &[
                LineRequest::new(products[0].id, 3),
                LineRequest::new(products[0].id, 3),
            ],
        )
        .await;

        assert!(matches!(
            result,
            Err(DomainError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn missing_product_is_not_found() {
        let (store, _) = store_with(&[]).await;
        let mut uow = store.begin().await.unwrap();

        let result = reserve_order(
            &mut uow,
            UserId::new(),
            &[LineRequest::new(ProductId::new(), 1)],
        )
        .await;

        assert!(matches!(
            result,
            Err(DomainError::NotFound {
                entity: "Product",
                ..
            })
        ));
    }
}
