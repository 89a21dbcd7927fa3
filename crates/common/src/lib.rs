//! Shared model types for the order management backend.
//!
//! Every other crate in the workspace speaks in these types:
//! - typed identifiers for products, users, orders and order lines
//! - [`Money`], a fixed-point amount in cents
//! - [`Role`] and [`OrderStatus`]
//! - the [`Product`], [`User`], [`Order`] and [`OrderLine`] records

pub mod ids;
pub mod model;
pub mod money;
pub mod order;
pub mod status;

pub use ids::{OrderId, OrderLineId, ProductId, UserId};
pub use model::{Product, User};
pub use money::Money;
pub use order::{Order, OrderLine, OrderLinesError};
pub use status::{OrderStatus, ParseEnumError, Role};
