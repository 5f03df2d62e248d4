//! Product records behind the bearer-protected API.

pub mod store;

pub use store::{InventoryError, NewProduct, Product, ProductStore};
