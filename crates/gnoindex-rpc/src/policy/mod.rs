//! Reliability policies for chain calls.

pub mod retry;

pub use retry::{RetryConfig, RetryPolicy};
