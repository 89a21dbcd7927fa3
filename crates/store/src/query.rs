use common::{Order, OrderStatus, Product, UserId};

/// Builder for catalog listings.
///
/// By default only active products are returned.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    /// Include deactivated products.
    pub include_inactive: bool,

    /// Case-insensitive substring match on the product name.
    pub name_contains: Option<String>,
}

impl ProductQuery {
    /// Creates a query for active products.
    pub fn active() -> Self {
        Self::default()
    }

    /// Creates a query for every product, active or not.
    pub fn all() -> Self {
        Self {
            include_inactive: true,
            ..Default::default()
        }
    }

    /// Sets whether inactive products are included.
    pub fn include_inactive(mut self, include: bool) -> Self {
        self.include_inactive = include;
        self
    }

    /// Filters by a case-insensitive name fragment.
    pub fn name_contains(mut self, term: impl Into<String>) -> Self {
        self.name_contains = Some(term.into());
        self
    }

    /// Returns true if `product` satisfies this query.
    pub fn matches(&self, product: &Product) -> bool {
        if !self.include_inactive && !product.active {
            return false;
        }
        if let Some(ref term) = self.name_contains
            && !product.name.to_lowercase().contains(&term.to_lowercase())
        {
            return false;
        }
        true
    }
}

/// Builder for order listings.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Filter by owning user.
    pub user_id: Option<UserId>,

    /// Filter by status.
    pub status: Option<OrderStatus>,
}

impl OrderQuery {
    /// Creates a query matching every order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for one user's orders.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    /// Creates a query for orders in one status.
    pub fn with_status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Returns true if `order` satisfies this query.
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(user_id) = self.user_id
            && order.user_id() != user_id
        {
            return false;
        }
        if let Some(status) = self.status
            && order.status() != status
        {
            return false;
        }
        true
    }
}
