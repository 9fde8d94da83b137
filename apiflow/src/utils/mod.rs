//! Time helpers shared by run records and built-in nodes.

pub mod timestamps;

pub use timestamps::{elapsed_ms, now_utc, rfc3339, unix_seconds, Timestamp};
