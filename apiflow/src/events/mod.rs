//! Progress sinks.
//!
//! The executor reports node and run transitions through a [`ProgressSink`].
//! The [`crate::hub::ProgressHub`] is the production sink; the others log,
//! discard or collect events.

mod sink;

pub use sink::{CollectingProgressSink, LoggingProgressSink, NoOpProgressSink, ProgressSink};
