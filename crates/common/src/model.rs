//! Catalog and account records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Money, ProductId, Role, UserId};

/// A sellable catalog product and its stock counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    /// Current unit price. Existing order lines keep their own copy.
    pub price: Money,
    /// Sellable units. Unsigned, so it can never go below zero.
    pub stock: u32,
    /// Inactive products are hidden from default listings and cannot be ordered.
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Creates a new active product.
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        price: Money,
        stock: u32,
    ) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            description,
            price,
            stock,
            active: true,
            created_at: Utc::now(),
        }
    }
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    /// Opaque credential produced by the authentication collaborator.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new account with the `USER` role.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            role: Role::User,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_product_is_active() {
        let product = Product::new("Widget", None, Money::from_cents(999), 4);
        assert!(product.active);
        assert_eq!(product.stock, 4);
    }

    #[test]
    fn new_user_has_user_role() {
        let user = User::new("Ana", "ana@example.com", "hash");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn user_serialization_hides_credential() {
        let user = User::new("Ana", "ana@example.com", "secret-hash");
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
    }
}
