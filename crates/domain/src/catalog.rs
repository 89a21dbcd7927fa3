//! Product catalog service.

use common::{Money, Product, ProductId};
use store::{ProductQuery, Store, UnitOfWork};

use crate::auth::{Action, Caller, authorize};
use crate::error::DomainError;
use crate::unit::finish;

const MAX_NAME_LEN: usize = 120;

/// Input for [`CatalogService::create_product`].
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock: u32,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, price: Money) -> Self {
        Self {
            name: name.into(),
            description: None,
            price,
            stock: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = stock;
        self
    }
}

/// Partial update for [`CatalogService::update_product`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub stock: Option<u32>,
    pub active: Option<bool>,
}

impl ProductPatch {
    fn apply(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            product.description = Some(description);
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(active) = self.active {
            product.active = active;
        }
    }
}

fn validate(name: &str, price: Money) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::Validation("product name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::Validation(format!(
            "product name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    if price.is_negative() {
        return Err(DomainError::Validation(
            "price must be zero or greater".to_string(),
        ));
    }
    Ok(())
}

/// Service for the product catalog.
///
/// Writes to existing products go through a unit of work so that they
/// serialize with order placement on the same product rows.
#[derive(Clone)]
pub struct CatalogService<S: Store> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Adds a product to the catalog. New products are active.
    #[tracing::instrument(skip(self, caller, input), fields(name = %input.name))]
    pub async fn create_product(
        &self,
        caller: &Caller,
        input: NewProduct,
    ) -> Result<Product, DomainError> {
        authorize(caller, Action::ManageCatalog, None)?;
        validate(&input.name, input.price)?;

        let product = Product::new(
            input.name.trim().to_string(),
            input.description,
            input.price,
            input.stock,
        );
        self.store.insert_product(&product).await?;

        tracing::info!(product_id = %product.id, price = %product.price, stock = product.stock, "product created");
        Ok(product)
    }

    /// Applies a partial update under the product's lock.
    #[tracing::instrument(skip(self, caller, patch))]
    pub async fn update_product(
        &self,
        caller: &Caller,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product, DomainError> {
        authorize(caller, Action::ManageCatalog, None)?;

        let mut uow = self.store.begin().await?;
        let result = async {
            let mut product = locked_product(&mut uow, id).await?;
            patch.apply(&mut product);
            validate(&product.name, product.price)?;
            uow.save_product(&product).await?;
            Ok::<_, DomainError>(product)
        }
        .await;
        let product = finish(uow, result).await?;

        tracing::info!(product_id = %product.id, "product updated");
        Ok(product)
    }

    /// Soft-deletes a product. It stays readable by id but leaves the active listings.
    #[tracing::instrument(skip(self, caller))]
    pub async fn deactivate_product(
        &self,
        caller: &Caller,
        id: ProductId,
    ) -> Result<Product, DomainError> {
        authorize(caller, Action::ManageCatalog, None)?;

        let mut uow = self.store.begin().await?;
        let result = async {
            let mut product = locked_product(&mut uow, id).await?;
            product.active = false;
            uow.save_product(&product).await?;
            Ok::<_, DomainError>(product)
        }
        .await;
        let product = finish(uow, result).await?;

        tracing::info!(product_id = %product.id, "product deactivated");
        Ok(product)
    }

    /// Removes a product for good. Fails with `Conflict` if any order line references it.
    #[tracing::instrument(skip(self, caller))]
    pub async fn delete_product(&self, caller: &Caller, id: ProductId) -> Result<(), DomainError> {
        authorize(caller, Action::ManageCatalog, None)?;

        let mut uow = self.store.begin().await?;
        let result = async {
            locked_product(&mut uow, id).await?;
            uow.delete_product(id).await?;
            Ok::<_, DomainError>(())
        }
        .await;
        finish(uow, result).await?;

        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product, DomainError> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", id))
    }

    pub async fn list_products(&self, include_inactive: bool) -> Result<Vec<Product>, DomainError> {
        let query = ProductQuery::active().include_inactive(include_inactive);
        Ok(self.store.list_products(query).await?)
    }

    pub async fn list_active_products(&self) -> Result<Vec<Product>, DomainError> {
        Ok(self.store.list_products(ProductQuery::active()).await?)
    }

    /// Case-insensitive name search across the whole catalog.
    pub async fn search_products(&self, term: &str) -> Result<Vec<Product>, DomainError> {
        let query = ProductQuery::all().name_contains(term.trim());
        Ok(self.store.list_products(query).await?)
    }
}

async fn locked_product<U: UnitOfWork>(uow: &mut U, id: ProductId) -> Result<Product, DomainError> {
    uow.lock_products(&[id])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| DomainError::not_found("Product", id))
}

#[cfg(test)]
mod tests {
    use common::UserId;
    use store::InMemoryStore;

    use super::*;

    fn service() -> CatalogService<InMemoryStore> {
        CatalogService::new(InMemoryStore::new())
    }

    fn admin() -> Caller {
        Caller::admin(UserId::new())
    }

    #[tokio::test]
    async fn create_validates_input() {
        let service = service();

        let blank = service
            .create_product(&admin(), NewProduct::new("  ", Money::from_cents(100)))
            .await;
        assert!(matches!(blank, Err(DomainError::Validation(_))));

        let negative = service
            .create_product(&admin(), NewProduct::new("Lamp", Money::from_cents(-1)))
            .await;
        assert!(matches!(negative, Err(DomainError::Validation(_))));

        let long = service
            .create_product(
                &admin(),
                NewProduct::new("x".repeat(121), Money::from_cents(100)),
            )
            .await;
        assert!(matches!(long, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn users_cannot_manage_catalog() {
        let service = service();
        let result = service
            .create_product(
                &Caller::user(UserId::new()),
                NewProduct::new("Lamp", Money::from_cents(100)),
            )
            .await;
        assert!(matches!(result, Err(DomainError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn partial_update_keeps_untouched_fields() {
        let service = service();
        let product = service
            .create_product(
                &admin(),
                NewProduct::new("Lamp", Money::from_cents(1500))
                    .with_description("Desk lamp")
                    .with_stock(4),
            )
            .await
            .unwrap();

        let patch = ProductPatch {
            price: Some(Money::from_cents(1800)),
            ..Default::default()
        };
        let updated = service
            .update_product(&admin(), product.id, patch)
            .await
            .unwrap();

        assert_eq!(updated.price, Money::from_cents(1800));
        assert_eq!(updated.name, "Lamp");
        assert_eq!(updated.description.as_deref(), Some("Desk lamp"));
        assert_eq!(updated.stock, 4);
        assert_eq!(service.get_product(product.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn patched_name_is_trimmed() {
        let service = service();
        let product = service
            .create_product(&admin(), NewProduct::new("Lamp", Money::from_cents(100)))
            .await
            .unwrap();

        let patch = ProductPatch {
            name: Some("  Desk Lamp \t".to_string()),
            ..Default::default()
        };
        let updated = service
            .update_product(&admin(), product.id, patch)
            .await
            .unwrap();

        assert_eq!(updated.name, "Desk Lamp");
        assert_eq!(service.get_product(product.id).await.unwrap().name, "Desk Lamp");
    }

    #[tokio::test]
    async fn deactivated_products_leave_active_listing() {
        let service = service();
        let product = service
            .create_product(&admin(), NewProduct::new("Lamp", Money::from_cents(100)))
            .await
            .unwrap();

        service
            .deactivate_product(&admin(), product.id)
            .await
            .unwrap();

        assert!(service.list_active_products().await.unwrap().is_empty());
        assert_eq!(service.list_products(true).await.unwrap().len(), 1);
        assert!(!service.get_product(product.id).await.unwrap().active);
    }

    #[tokio::test]
    async fn search_is_case_insensitive() {
        let service = service();
        for name in ["Desk Lamp", "Floor lamp", "Chair"] {
            service
                .create_product(&admin(), NewProduct::new(name, Money::from_cents(100)))
                .await
                .unwrap();
        }

        let found = service.search_products("LAMP").await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn delete_missing_product_is_not_found() {
        let service = service();
        let result = service.delete_product(&admin(), ProductId::new()).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }
}
