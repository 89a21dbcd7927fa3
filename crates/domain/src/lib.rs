//! Domain layer for the order management backend.
//!
//! This crate provides the services that sit between the HTTP surface and
//! the store:
//! - [`OrderService`]: inventory reservation, order lifecycle and summaries
//! - [`CatalogService`]: product administration and catalog reads
//! - [`AccountService`]: user registration, lookup and promotion
//! - [`authorize`]: the role and ownership rules every service applies

pub mod accounts;
pub mod auth;
pub mod catalog;
pub mod error;
pub mod order;
mod unit;

pub use accounts::AccountService;
pub use auth::{Action, Caller, authorize};
pub use catalog::{CatalogService, NewProduct, ProductPatch};
pub use error::DomainError;
pub use order::{
    LineRequest, OrderLineSummary, OrderPolicy, OrderService, OrderSummary,
};
