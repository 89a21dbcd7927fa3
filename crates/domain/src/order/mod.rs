//! Order placement, lifecycle and summaries.

mod lifecycle;
mod placement;
mod service;
mod summary;

pub use lifecycle::OrderPolicy;
pub use placement::LineRequest;
pub use service::OrderService;
pub use summary::{OrderLineSummary, OrderSummary};
