//! Import and reconcile Google Sheets order data into relational tables.

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod migration;
pub mod notify;
pub mod server;
pub mod source;
pub mod store;
