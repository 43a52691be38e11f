//! Typed data access per entity.
//!
//! Every function is generic over [`sea_orm::ConnectionTrait`] so the same
//! query runs against the pooled connection or inside a transaction.

pub mod cart;
pub mod categories;
pub mod orders;
pub mod products;
pub mod users;
pub mod wishlist;
