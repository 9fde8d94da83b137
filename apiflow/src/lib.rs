//! # Apiflow
//!
//! A concurrent engine for API test flows.
//!
//! A flow is a directed acyclic graph of typed nodes (HTTP requests, mocks,
//! verifications, reports). The executor validates the graph, runs every node
//! as soon as its dependencies have finished, feeds each node the merged
//! outputs of its dependencies, and streams progress to live observers
//! through the progress hub.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use apiflow::prelude::*;
//! use std::sync::Arc;
//!
//! let flow = Flow::new("smoke")
//!     .with_node(FlowNode::new("login", "api").with_config(login_config))
//!     .with_node(FlowNode::new("check", "verification").with_config(check_config))
//!     .with_edge("login", "check");
//!
//! let hub = ProgressHub::start(HubConfig::default());
//! let executor = FlowExecutor::new(Arc::new(TaskRegistry::with_builtins()), hub.clone());
//!
//! let run = executor.execute(&CancellationToken::new(), &flow).await?;
//! assert_eq!(run.status, ExecutionStatus::Success);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod executor;
pub mod graph;
pub mod hub;
pub mod nodes;
pub mod observability;
pub mod tasks;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{EngineConfig, ExecutorConfig, HubConfig, LogFormat, LoggingConfig};
    pub use crate::core::{
        ExecutionStatus, Flow, FlowEdge, FlowNode, HubEvent, NodeResult, Position, TestRun,
        Value, ValueMap,
    };
    pub use crate::errors::{
        ConfigError, CycleDetectedError, FlowError, FlowValidationError, HubError, TaskError,
    };
    pub use crate::events::{
        CollectingProgressSink, LoggingProgressSink, NoOpProgressSink, ProgressSink,
    };
    pub use crate::executor::FlowExecutor;
    pub use crate::graph::DependencyGraph;
    pub use crate::hub::{EventStream, ProgressHub};
    pub use crate::observability::init_tracing;
    pub use crate::tasks::{FnTask, Task, TaskContext, TaskRegistry};
    pub use crate::utils::{now_utc, Timestamp};
}
