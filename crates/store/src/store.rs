use async_trait::async_trait;

use common::{Order, OrderId, OrderStatus, Product, ProductId, Role, User, UserId};

use crate::{OrderQuery, ProductQuery, Result};

/// A scoped, all-or-nothing unit of work.
///
/// Reads and writes made through a unit of work are invisible to everyone
/// else until [`commit`](UnitOfWork::commit). Locks taken by
/// [`lock_products`](UnitOfWork::lock_products) and
/// [`get_order_for_update`](UnitOfWork::get_order_for_update) are held until
/// commit or rollback. Dropping a unit of work without committing it is a
/// rollback.
#[async_trait]
pub trait UnitOfWork: Send + Sized {
    /// Locks the given product rows for the rest of this unit of work.
    ///
    /// Ids are deduplicated and locked in ascending order so that two units
    /// locking overlapping sets cannot deadlock. Missing ids are skipped.
    /// Returns the locked products in ascending id order.
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Reads a product as seen by this unit of work.
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Decrements stock by `amount`, locking the product if needed.
    ///
    /// Fails with `InsufficientStock` rather than going below zero, and with
    /// `NotFound` if the product does not exist. Returns the updated product.
    async fn decrement_stock(&mut self, id: ProductId, amount: u32) -> Result<Product>;

    /// Adds `amount` units back to a product's stock.
    async fn restock(&mut self, id: ProductId, amount: u32) -> Result<Product>;

    /// Overwrites a product row. The product must already exist.
    async fn save_product(&mut self, product: &Product) -> Result<()>;

    /// Deletes a product row.
    ///
    /// Fails with `Conflict` if any order line references the product.
    async fn delete_product(&mut self, id: ProductId) -> Result<()>;

    /// Returns true if any order line references the product.
    async fn product_has_order_lines(&mut self, id: ProductId) -> Result<bool>;

    /// Persists an order together with all of its lines.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Reads an order and locks it for the rest of this unit of work.
    async fn get_order_for_update(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Overwrites an order's status.
    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()>;

    /// Records that the order's reserved units went back to stock.
    async fn mark_stock_released(&mut self, id: OrderId) -> Result<()>;

    /// Makes every staged write visible and releases all locks.
    async fn commit(self) -> Result<()>;

    /// Discards every staged write and releases all locks.
    async fn rollback(self) -> Result<()>;
}

/// Core trait for store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync {
    /// The unit of work type handed out by [`begin`](Store::begin).
    type Tx: UnitOfWork;

    /// Starts a new unit of work.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Inserts a new product.
    async fn insert_product(&self, product: &Product) -> Result<()>;

    /// Reads a committed product.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Lists products matching a query, ordered by name.
    async fn list_products(&self, query: ProductQuery) -> Result<Vec<Product>>;

    /// Inserts a new user.
    ///
    /// Fails with `Conflict` if the email (compared case-insensitively) is taken.
    async fn insert_user(&self, user: &User) -> Result<()>;

    /// Reads a user by id.
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    /// Reads a user by email, compared case-insensitively.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Lists every user, oldest first.
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Changes a user's role, returning the updated user.
    async fn set_user_role(&self, id: UserId, role: Role) -> Result<Option<User>>;

    /// Reads a committed order with its lines.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists orders matching a query, oldest first.
    async fn list_orders(&self, query: OrderQuery) -> Result<Vec<Order>>;
}

/// Returns `ids` sorted ascending with duplicates removed.
pub(crate) fn lock_order(ids: &[ProductId]) -> Vec<ProductId> {
    let mut sorted = ids.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted
}
