//! Persistence for the order management backend.
//!
//! [`Store`] covers plain reads and uncontended writes. Anything that touches
//! product stock or order status goes through a [`UnitOfWork`] obtained from
//! [`Store::begin`], which holds the row locks it acquires until it is
//! committed, rolled back or dropped.

pub mod error;
mod locks;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use query::{OrderQuery, ProductQuery};
pub use store::{Store, UnitOfWork};
