pub mod addresses;
pub mod carts;
pub mod checkout;
pub mod common;
pub mod coupons;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod reviews;

pub use crate::AppState;
