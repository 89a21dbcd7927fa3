//! Role-based authorization.
//!
//! Every rule is a pure function of the caller's role, the caller's id and,
//! where the resource has one, the owning user's id.

use common::{Role, UserId};

use crate::error::DomainError;

/// A verified `(user id, role)` pair supplied by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// A caller with the `USER` role.
    pub fn user(user_id: UserId) -> Self {
        Self::new(user_id, Role::User)
    }

    /// A caller with the `ADMIN` role.
    pub fn admin(user_id: UserId) -> Self {
        Self::new(user_id, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Operations guarded by [`authorize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    PlaceOrder,
    CancelOrder,
    ViewOrder,
    ListOwnOrders,
    /// Listing every order and overwriting statuses.
    ManageOrders,
    ManageCatalog,
    ViewAccount,
    ManageAccounts,
}

/// Decides whether `caller` may perform `action` on a resource owned by `owner`.
///
/// Admins may do everything a user may do except place and cancel orders.
/// Ownership-scoped actions without an owner are denied to non-admins.
pub fn authorize(caller: &Caller, action: Action, owner: Option<UserId>) -> Result<(), DomainError> {
    let owns = owner == Some(caller.user_id);

    let allowed = match (action, caller.role) {
        (Action::PlaceOrder, Role::User) => true,
        (Action::PlaceOrder, Role::Admin) => false,
        (Action::CancelOrder, Role::User) => owns,
        (Action::CancelOrder, Role::Admin) => false,
        (Action::ListOwnOrders, _) => true,
        (Action::ViewOrder | Action::ViewAccount, Role::Admin) => true,
        (Action::ViewOrder | Action::ViewAccount, Role::User) => owns,
        (Action::ManageOrders | Action::ManageCatalog | Action::ManageAccounts, role) => {
            role == Role::Admin
        }
    };

    if allowed {
        Ok(())
    } else {
        Err(DomainError::Unauthorized(denial_message(action).to_string()))
    }
}

fn denial_message(action: Action) -> &'static str {
    match action {
        Action::PlaceOrder => "only customers can place orders",
        Action::CancelOrder => "you can only cancel your own orders",
        Action::ViewOrder => "you can only view your own orders",
        Action::ViewAccount => "you can only view your own account",
        Action::ListOwnOrders => "access denied",
        Action::ManageOrders | Action::ManageCatalog | Action::ManageAccounts => {
            "administrator role required"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_can_view_and_cancel() {
        let me = Caller::user(UserId::new());
        assert!(authorize(&me, Action::ViewOrder, Some(me.user_id)).is_ok());
        assert!(authorize(&me, Action::CancelOrder, Some(me.user_id)).is_ok());
    }

    #[test]
    fn other_user_is_denied() {
        let me = Caller::user(UserId::new());
        let owner = Some(UserId::new());
        assert!(matches!(
            authorize(&me, Action::ViewOrder, owner),
            Err(DomainError::Unauthorized(_))
        ));
        assert!(matches!(
            authorize(&me, Action::CancelOrder, owner),
            Err(DomainError::Unauthorized(_))
        ));
        assert!(authorize(&me, Action::ViewAccount, owner).is_err());
    }

    #[test]
    fn admin_bypasses_ownership_but_cannot_place_or_cancel() {
        let admin = Caller::admin(UserId::new());
        let owner = Some(UserId::new());
        assert!(authorize(&admin, Action::ViewOrder, owner).is_ok());
        assert!(authorize(&admin, Action::ManageOrders, None).is_ok());
        assert!(authorize(&admin, Action::PlaceOrder, None).is_err());
        assert!(authorize(&admin, Action::CancelOrder, Some(admin.user_id)).is_err());
    }

    #[test]
    fn admin_only_actions_reject_users() {
        let me = Caller::user(UserId::new());
        for action in [
            Action::ManageOrders,
            Action::ManageCatalog,
            Action::ManageAccounts,
        ] {
            assert!(authorize(&me, action, None).is_err(), "{action:?}");
        }
        assert!(authorize(&me, Action::PlaceOrder, None).is_ok());
        assert!(authorize(&me, Action::ListOwnOrders, None).is_ok());
    }
}
