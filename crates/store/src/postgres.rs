use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use common::{
    Money, Order, OrderId, OrderLine, OrderLineId, OrderStatus, Product, ProductId, Role, User,
    UserId,
};
use sqlx::{
    PgConnection, PgPool, Postgres, Row, Transaction,
    postgres::{PgPoolOptions, PgRow},
};
use uuid::Uuid;

use crate::{
    OrderQuery, ProductQuery, Result, StoreError,
    store::{Store, UnitOfWork, lock_order},
};

const PRODUCT_COLUMNS: &str = "id, name, description, price_cents, stock, is_active, created_at";
const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, user_id, status, total_cents, stock_released, created_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    /// Connects to `database_url` with at most `max_connections` pooled connections.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::InvalidRow(format!("{column} out of range: {value}")))
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock: to_u32(row.try_get("stock")?, "stock")?,
        active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_user(row: &PgRow) -> Result<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: role
            .parse::<Role>()
            .map_err(|e| StoreError::InvalidRow(e.to_string()))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_line(row: &PgRow) -> Result<OrderLine> {
    Ok(OrderLine {
        id: OrderLineId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        quantity: to_u32(row.try_get("quantity")?, "quantity")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
    })
}

/// Attaches lines to order header rows, preserving header order.
async fn assemble_orders(conn: &mut PgConnection, headers: Vec<PgRow>) -> Result<Vec<Order>> {
    if headers.is_empty() {
        return Ok(Vec::new());
    }

    let ids = headers
        .iter()
        .map(|row| row.try_get::<Uuid, _>("id"))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let line_rows = sqlx::query(
        r#"
        SELECT id, order_id, product_id, quantity, unit_price_cents
        FROM order_lines
        WHERE order_id = ANY($1)
        ORDER BY order_id, position
        "#,
    )
    .bind(ids.as_slice())
    .fetch_all(&mut *conn)
    .await?;

    let mut lines_by_order: HashMap<OrderId, Vec<OrderLine>> = HashMap::new();
    for row in &line_rows {
        let line = row_to_line(row)?;
        lines_by_order.entry(line.order_id).or_default().push(line);
    }

    headers
        .iter()
        .map(|row| {
            let id = OrderId::from_uuid(row.try_get::<Uuid, _>("id")?);
            let status: String = row.try_get("status")?;
            Ok(Order::restore(
                id,
                UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
                status
                    .parse::<OrderStatus>()
                    .map_err(|e| StoreError::InvalidRow(e.to_string()))?,
                Money::from_cents(row.try_get("total_cents")?),
                lines_by_order.remove(&id).unwrap_or_default(),
                row.try_get("stock_released")?,
                row.try_get("created_at")?,
            ))
        })
        .collect()
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresUnitOfWork;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(PostgresUnitOfWork {
            tx: self.pool.begin().await?,
        })
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price_cents, stock, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(i64::from(product.stock))
        .bind(product.active)
        .bind(product.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(format!("product {} already exists", product.id))
            }
            e => StoreError::Database(e),
        })?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn list_products(&self, query: ProductQuery) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE ($1 OR is_active)
              AND ($2::text IS NULL OR POSITION(LOWER($2) IN LOWER(name)) > 0)
            ORDER BY name ASC, id ASC
            "#
        ))
        .bind(query.include_inactive)
        .bind(query.name_contains)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(format!("Email already exists: {}", user.email))
            }
            e => StoreError::Database(e),
        })?;
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_user).collect()
    }

    async fn set_user_role(&self, id: UserId, role: Role) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "UPDATE users SET role = $2, updated_at = $3 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(role.as_str())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        let headers = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_all(&mut *conn)
            .await?;
        Ok(assemble_orders(&mut *conn, headers).await?.pop())
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let headers = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(query.user_id.map(|id| id.as_uuid()))
        .bind(query.status.map(|status| status.as_str()))
        .fetch_all(&mut *conn)
        .await?;
        assemble_orders(&mut *conn, headers).await
    }
}

/// Unit of work backed by a PostgreSQL transaction.
///
/// Row locks are `SELECT ... FOR UPDATE` locks and are released by the
/// database on commit or rollback. Dropping the unit rolls the transaction
/// back.
pub struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PostgresUnitOfWork {
    async fn product_exists(&mut self, id: ProductId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let ids: Vec<Uuid> = lock_order(ids).iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(ids.as_slice())
        .fetch_all(&mut *self.tx)
        .await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn decrement_stock(&mut self, id: ProductId, amount: u32) -> Result<Product> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE products SET stock = stock - $2
            WHERE id = $1 AND stock >= $2
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(i64::from(amount))
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => row_to_product(&row),
            None => match self.get_product(id).await? {
                Some(product) => Err(StoreError::InsufficientStock {
                    product_id: id,
                    requested: amount,
                    available: product.stock,
                }),
                None => Err(StoreError::not_found("Product", id)),
            },
        }
    }

    async fn restock(&mut self, id: ProductId, amount: u32) -> Result<Product> {
        let row = sqlx::query(&format!(
            "UPDATE products SET stock = stock + $2 WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(i64::from(amount))
        .fetch_optional(&mut *self.tx)
        .await?;
        match row {
            Some(row) => row_to_product(&row),
            None => Err(StoreError::not_found("Product", id)),
        }
    }

    async fn save_product(&mut self, product: &Product) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, description = $3, price_cents = $4, stock = $5, is_active = $6
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(i64::from(product.stock))
        .bind(product.active)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Product", product.id));
        }
        Ok(())
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<()> {
        if !self.product_exists(id).await? {
            return Err(StoreError::not_found("Product", id));
        }
        if self.product_has_order_lines(id).await? {
            return Err(StoreError::Conflict(format!(
                "product {id} is referenced by existing order lines"
            )));
        }

        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    StoreError::Conflict(format!(
                        "product {id} is referenced by existing order lines"
                    ))
                }
                e => StoreError::Database(e),
            })?;
        Ok(())
    }

    async fn product_has_order_lines(&mut self, id: ProductId) -> Result<bool> {
        let referenced: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM order_lines WHERE product_id = $1)")
                .bind(id.as_uuid())
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(referenced)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, status, total_cents, stock_released, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.user_id().as_uuid())
        .bind(order.status().as_str())
        .bind(order.total().cents())
        .bind(order.stock_released())
        .bind(order.created_at())
        .execute(&mut *self.tx)
        .await?;

        for (position, line) in order.lines().iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| StoreError::InvalidRow(format!("too many lines: {position}")))?;
            sqlx::query(
                r#"
                INSERT INTO order_lines (id, order_id, product_id, position, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(line.id.as_uuid())
            .bind(order.id().as_uuid())
            .bind(line.product_id.as_uuid())
            .bind(position)
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.cents())
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn get_order_for_update(&mut self, id: OrderId) -> Result<Option<Order>> {
        let headers = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(assemble_orders(&mut *self.tx, headers).await?.pop())
    }

    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Order", id));
        }
        Ok(())
    }

    async fn mark_stock_released(&mut self, id: OrderId) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET stock_released = TRUE WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Order", id));
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
