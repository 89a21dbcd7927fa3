use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    Money, Order, OrderId, OrderLine, OrderLineId, OrderStatus, Product, ProductId, Role, User,
    UserId,
};
use tokio::sync::{OwnedMutexGuard, RwLock};

use crate::{
    OrderQuery, ProductQuery, Result, StoreError,
    locks::{LockKey, LockTable},
    store::{Store, UnitOfWork, lock_order},
};

/// Order header row. Lines live in their own table and point back by id.
#[derive(Debug, Clone)]
struct OrderRow {
    user_id: UserId,
    status: OrderStatus,
    total: Money,
    stock_released: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    users: HashMap<UserId, User>,
    orders: HashMap<OrderId, OrderRow>,
    order_lines: HashMap<OrderLineId, OrderLine>,
    lines_by_order: HashMap<OrderId, Vec<OrderLineId>>,
}

impl Tables {
    fn order(&self, id: OrderId) -> Option<Order> {
        let row = self.orders.get(&id)?;
        let lines = self
            .lines_by_order
            .get(&id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|line_id| self.order_lines.get(line_id).cloned())
                    .collect()
            })
            .unwrap_or_default();

        Some(Order::restore(
            id,
            row.user_id,
            row.status,
            row.total,
            lines,
            row.stock_released,
            row.created_at,
        ))
    }

    fn insert_order(&mut self, order: &Order) {
        self.orders.insert(
            order.id(),
            OrderRow {
                user_id: order.user_id(),
                status: order.status(),
                total: order.total(),
                stock_released: order.stock_released(),
                created_at: order.created_at(),
            },
        );
        let line_ids = order.lines().iter().map(|line| line.id).collect();
        for line in order.lines() {
            self.order_lines.insert(line.id, line.clone());
        }
        self.lines_by_order.insert(order.id(), line_ids);
    }

    fn product_is_referenced(&self, id: ProductId) -> bool {
        self.order_lines.values().any(|line| line.product_id == id)
    }
}

/// In-memory store implementation.
///
/// Tables are arena maps keyed by id. Contended rows are serialized through a
/// [`LockTable`]; a unit of work stages its writes and applies them in one
/// step on commit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    locks: LockTable,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns the total number of order lines stored.
    pub async fn order_line_count(&self) -> usize {
        self.tables.read().await.order_lines.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryUnitOfWork;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(InMemoryUnitOfWork {
            tables: self.tables.clone(),
            locks: self.locks.clone(),
            guards: HashMap::new(),
            staged_products: HashMap::new(),
            staged_orders: Vec::new(),
            staged_statuses: HashMap::new(),
            staged_releases: HashSet::new(),
        })
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.products.contains_key(&product.id) {
            return Err(StoreError::Conflict(format!(
                "product {} already exists",
                product.id
            )));
        }
        tables.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn list_products(&self, query: ProductQuery) -> Result<Vec<Product>> {
        let tables = self.tables.read().await;
        let mut products: Vec<_> = tables
            .products
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::Conflict(format!(
                "Email already exists: {}",
                user.email
            )));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<_> = tables.users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn set_user_role(&self, id: UserId, role: Role) -> Result<Option<User>> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.get_mut(&id).map(|user| {
            user.role = role;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables.read().await.order(id))
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<_> = tables
            .orders
            .keys()
            .filter_map(|id| tables.order(*id))
            .filter(|order| query.matches(order))
            .collect();
        orders.sort_by(|a, b| a.created_at().cmp(&b.created_at()).then(a.id().cmp(&b.id())));
        Ok(orders)
    }
}

/// Unit of work over an [`InMemoryStore`].
///
/// Writes are staged locally; readers of the store never observe them until
/// [`commit`](UnitOfWork::commit). Held row guards are released when the unit
/// is committed, rolled back or dropped.
pub struct InMemoryUnitOfWork {
    tables: Arc<RwLock<Tables>>,
    locks: LockTable,
    guards: HashMap<LockKey, OwnedMutexGuard<()>>,
    /// `None` marks a staged delete.
    staged_products: HashMap<ProductId, Option<Product>>,
    staged_orders: Vec<Order>,
    staged_statuses: HashMap<OrderId, OrderStatus>,
    staged_releases: HashSet<OrderId>,
}

impl InMemoryUnitOfWork {
    async fn lock(&mut self, key: LockKey) {
        if !self.guards.contains_key(&key) {
            let guard = self.locks.acquire(key).await;
            self.guards.insert(key, guard);
        }
    }

    async fn read_product(&self, id: ProductId) -> Option<Product> {
        match self.staged_products.get(&id) {
            Some(staged) => staged.clone(),
            None => self.tables.read().await.products.get(&id).cloned(),
        }
    }

    async fn read_order(&self, id: OrderId) -> Option<Order> {
        let mut order = match self.staged_orders.iter().find(|o| o.id() == id) {
            Some(order) => Some(order.clone()),
            None => self.tables.read().await.order(id),
        }?;
        if let Some(status) = self.staged_statuses.get(&id) {
            order.set_status(*status);
        }
        if self.staged_releases.contains(&id) {
            order.mark_stock_released();
        }
        Some(order)
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let mut locked = Vec::new();
        for id in lock_order(ids) {
            self.lock(LockKey::Product(id)).await;
            if let Some(product) = self.read_product(id).await {
                locked.push(product);
            }
        }
        Ok(locked)
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.read_product(id).await)
    }

    async fn decrement_stock(&mut self, id: ProductId, amount: u32) -> Result<Product> {
        self.lock(LockKey::Product(id)).await;
        let mut product = self
            .read_product(id)
            .await
            .ok_or_else(|| StoreError::not_found("Product", id))?;

        product.stock =
            product
                .stock
                .checked_sub(amount)
                .ok_or(StoreError::InsufficientStock {
                    product_id: id,
                    requested: amount,
                    available: product.stock,
                })?;

        self.staged_products.insert(id, Some(product.clone()));
        Ok(product)
    }

    async fn restock(&mut self, id: ProductId, amount: u32) -> Result<Product> {
        self.lock(LockKey::Product(id)).await;
        let mut product = self
            .read_product(id)
            .await
            .ok_or_else(|| StoreError::not_found("Product", id))?;

        product.stock = product.stock.checked_add(amount).ok_or_else(|| {
            StoreError::Conflict(format!("stock counter overflow for product {id}"))
        })?;

        self.staged_products.insert(id, Some(product.clone()));
        Ok(product)
    }

    async fn save_product(&mut self, product: &Product) -> Result<()> {
        self.lock(LockKey::Product(product.id)).await;
        if self.read_product(product.id).await.is_none() {
            return Err(StoreError::not_found("Product", product.id));
        }
        self.staged_products
            .insert(product.id, Some(product.clone()));
        Ok(())
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<()> {
        self.lock(LockKey::Product(id)).await;
        if self.read_product(id).await.is_none() {
            return Err(StoreError::not_found("Product", id));
        }
        if self.product_has_order_lines(id).await? {
            return Err(StoreError::Conflict(format!(
                "product {id} is referenced by existing order lines"
            )));
        }
        self.staged_products.insert(id, None);
        Ok(())
    }

    async fn product_has_order_lines(&mut self, id: ProductId) -> Result<bool> {
        let staged = self
            .staged_orders
            .iter()
            .flat_map(|order| order.lines())
            .any(|line| line.product_id == id);
        Ok(staged || self.tables.read().await.product_is_referenced(id))
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        self.lock(LockKey::Order(order.id())).await;
        if self.read_order(order.id()).await.is_some() {
            return Err(StoreError::Conflict(format!(
                "order {} already exists",
                order.id()
            )));
        }
        self.staged_orders.push(order.clone());
        Ok(())
    }

    async fn get_order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.lock(LockKey::Order(id)).await;
        Ok(self.read_order(id).await)
    }

    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()> {
        self.lock(LockKey::Order(id)).await;
        if self.read_order(id).await.is_none() {
            return Err(StoreError::not_found("Order", id));
        }
        self.staged_statuses.insert(id, status);
        Ok(())
    }

    async fn mark_stock_released(&mut self, id: OrderId) -> Result<()> {
        self.lock(LockKey::Order(id)).await;
        if self.read_order(id).await.is_none() {
            return Err(StoreError::not_found("Order", id));
        }
        self.staged_releases.insert(id);
        Ok(())
    }

    async fn commit(mut self) -> Result<()> {
        tracing::debug!(
            products = self.staged_products.len(),
            orders = self.staged_orders.len(),
            statuses = self.staged_statuses.len(),
            "committing in-memory unit of work"
        );
        let mut tables = self.tables.write().await;

        for (id, staged) in self.staged_products.drain() {
            match staged {
                Some(product) => {
                    tables.products.insert(id, product);
                }
                None => {
                    tables.products.remove(&id);
                }
            }
        }
        for order in self.staged_orders.drain(..) {
            tables.insert_order(&order);
        }
        for (id, status) in self.staged_statuses.drain() {
            if let Some(row) = tables.orders.get_mut(&id) {
                row.status = status;
            }
        }
        for id in self.staged_releases.drain() {
            if let Some(row) = tables.orders.get_mut(&id) {
                row.stock_released = true;
            }
        }

        drop(tables);
        self.guards.clear();
        Ok(())
    }

    async fn rollback(mut self) -> Result<()> {
        self.staged_products.clear();
        self.staged_orders.clear();
        self.staged_statuses.clear();
        self.staged_releases.clear();
        self.guards.clear();
        Ok(())
    }
}
