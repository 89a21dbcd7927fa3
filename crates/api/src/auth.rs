//! Caller identity extraction.
//!
//! Tokens are verified upstream. The authentication gateway forwards the
//! verified identity as `x-user-id` and `x-user-role` headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{Role, UserId};
use domain::Caller;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The verified caller of the current request.
#[derive(Debug, Clone, Copy)]
pub struct CurrentCaller(pub Caller);

impl<S: Send + Sync> FromRequestParts<S> for CurrentCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)?
            .ok_or_else(|| ApiError::Unauthenticated("authentication required".to_string()))?
            .parse::<UserId>()
            .map_err(|_| ApiError::Unauthenticated(format!("invalid {USER_ID_HEADER} header")))?;

        let role = match header(parts, USER_ROLE_HEADER)? {
            Some(value) => value.parse::<Role>().map_err(|_| {
                ApiError::Unauthenticated(format!("invalid {USER_ROLE_HEADER} header"))
            })?,
            None => Role::User,
        };

        Ok(CurrentCaller(Caller::new(user_id, role)))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, ApiError> {
    parts
        .headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| ApiError::Unauthenticated(format!("invalid {name} header")))
        })
        .transpose()
}
