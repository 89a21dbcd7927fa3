//! HTTP route handlers.

pub mod orders;
pub mod products;
pub mod system;
pub mod users;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path id, answering 400 on malformed input.
pub(crate) fn parse_id<T: FromStr>(kind: &str, raw: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {kind} id: {raw}")))
}
