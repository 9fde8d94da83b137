//! Core domain model types for apiflow.
//!
//! This module contains the fundamental types used throughout the engine:
//! - The opaque `Value` used for node configuration and output
//! - Flow definitions (nodes and edges)
//! - Run records, node results and their status
//! - Progress events delivered to observers

mod event;
mod flow;
mod run;
mod status;
mod value;

pub use event::HubEvent;
pub use flow::{Flow, FlowEdge, FlowNode, Position};
pub use run::{derive_status, NodeResult, TestRun};
pub use status::ExecutionStatus;
pub use value::{Value, ValueMap};
