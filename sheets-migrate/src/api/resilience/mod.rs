//! Resilience for store calls
//!
//! Provides the retry policy wrapped around every store operation.

pub mod retry;

pub use retry::{RetryConfig, RetryPolicy, RetryableError};
