//! Storefront client: a local cart/wishlist mirror plus an HTTP client that
//! syncs it with the API at login, refresh, write-through and checkout.

pub mod api;
pub mod store;

pub use api::{ClientError, StorefrontClient};
pub use store::{CartLine, StoreError, StorefrontStore};
