//! Cooperative cancellation.
//!
//! A [`CancellationToken`] is handed to the executor by the caller and a
//! per-run token is handed to every node task.

mod token;

pub use token::CancellationToken;
