//! Google Sheets v4 reader

mod auth;
mod client;

pub use auth::{SHEETS_READONLY_SCOPE, ServiceAccountAuth, ServiceAccountKey};
pub use client::SheetsClient;
