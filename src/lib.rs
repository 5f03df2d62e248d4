//! StockMaster inventory backend.
//!
//! The [`auth`] module is the core: bcrypt-backed credentials and stateless
//! HS256 bearer tokens. [`gateway`] exposes it over HTTP together with the
//! bearer-protected product API in [`inventory`].

pub mod auth;
pub mod config;
pub mod db;
pub mod gateway;
pub mod inventory;

pub use config::Config;
