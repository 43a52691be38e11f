//! Role based authorization.
//!
//! Every service call goes through [`authorize`] with the caller's role
//! (`None` for guests), the resource it touches and the action it performs.

use crate::{error::AppError, models::Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Catalog,
    Cart,
    Wishlist,
    Orders,
    Payments,
    AdminOrders,
    Users,
    Inventory,
    Couriers,
    Dashboard,
    Deliveries,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    Unauthenticated,
    Forbidden,
}

impl From<AccessDenied> for AppError {
    fn from(denied: AccessDenied) -> Self {
        match denied {
            AccessDenied::Unauthenticated => AppError::Unauthorized,
            AccessDenied::Forbidden => AppError::Forbidden,
        }
    }
}

enum Rule {
    Anyone,
    Authenticated,
    Only(Role),
}

fn rule_for(resource: Resource, action: Action) -> Rule {
    match (resource, action) {
        (Resource::Catalog, Action::Read) => Rule::Anyone,
        (Resource::Catalog, _) => Rule::Only(Role::Admin),
        (Resource::Cart | Resource::Wishlist, _) => Rule::Authenticated,
        (Resource::Orders, Action::Create) => Rule::Anyone,
        (Resource::Orders, _) => Rule::Authenticated,
        (Resource::Payments, _) => Rule::Anyone,
        (
            Resource::AdminOrders
            | Resource::Users
            | Resource::Inventory
            | Resource::Couriers
            | Resource::Dashboard,
            _,
        ) => Rule::Only(Role::Admin),
        (Resource::Deliveries, _) => Rule::Only(Role::Courier),
    }
}

pub fn authorize(role: Option<Role>, resource: Resource, action: Action) -> Result<(), AccessDenied> {
    match (rule_for(resource, action), role) {
        (Rule::Anyone, _) => Ok(()),
        (_, None) => Err(AccessDenied::Unauthenticated),
        (Rule::Authenticated, Some(_)) => Ok(()),
        (Rule::Only(required), Some(actual)) if required == actual => Ok(()),
        (Rule::Only(_), Some(_)) => Err(AccessDenied::Forbidden),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guests_can_browse_and_checkout_only() {
        assert!(authorize(None, Resource::Catalog, Action::Read).is_ok());
        assert!(authorize(None, Resource::Orders, Action::Create).is_ok());
        assert!(authorize(None, Resource::Payments, Action::Update).is_ok());
        assert_eq!(
            authorize(None, Resource::Cart, Action::Read),
            Err(AccessDenied::Unauthenticated)
        );
        assert_eq!(
            authorize(None, Resource::AdminOrders, Action::Read),
            Err(AccessDenied::Unauthenticated)
        );
    }

    #[test]
    fn catalog_writes_need_admin() {
        assert_eq!(
            authorize(Some(Role::User), Resource::Catalog, Action::Create),
            Err(AccessDenied::Forbidden)
        );
        assert_eq!(
            authorize(Some(Role::Courier), Resource::Catalog, Action::Delete),
            Err(AccessDenied::Forbidden)
        );
        assert!(authorize(Some(Role::Admin), Resource::Catalog, Action::Update).is_ok());
    }

    #[test]
    fn deliveries_are_courier_only() {
        assert!(authorize(Some(Role::Courier), Resource::Deliveries, Action::Update).is_ok());
        assert_eq!(
            authorize(Some(Role::Admin), Resource::Deliveries, Action::Update),
            Err(AccessDenied::Forbidden)
        );
        assert_eq!(
            authorize(Some(Role::User), Resource::Deliveries, Action::Read),
            Err(AccessDenied::Forbidden)
        );
    }

    #[test]
    fn back_office_is_admin_only() {
        for resource in [
            Resource::AdminOrders,
            Resource::Users,
            Resource::Inventory,
            Resource::Couriers,
            Resource::Dashboard,
        ] {
            assert!(authorize(Some(Role::Admin), resource, Action::Read).is_ok());
            assert_eq!(
                authorize(Some(Role::User), resource, Action::Read),
                Err(AccessDenied::Forbidden)
            );
            assert_eq!(
                authorize(Some(Role::Courier), resource, Action::Update),
                Err(AccessDenied::Forbidden)
            );
        }
    }
}
