//! Remote APIs and the store-call plumbing shared by every backend
//!
//! `sheets` reads the Google Sheets v4 API, `supabase` talks to PostgREST.
//! `operations`, `query` and `resilience` describe store calls, their
//! filters and how they are retried.

pub mod operations;
pub mod query;
pub mod resilience;
pub mod sheets;
pub mod supabase;

pub use operations::{Operation, OperationResult};
pub use query::{Filter, Query};
pub use resilience::{RetryConfig, RetryPolicy, RetryableError};
