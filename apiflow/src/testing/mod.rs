//! Testing utilities for apiflow executions.
//!
//! This module provides:
//! - Scripted, static, failing, hanging and panicking tasks
//! - A flow builder and an executor harness with a collecting sink

mod fixtures;
mod mocks;

pub use fixtures::{ExecutorHarness, FlowFixture};
pub use mocks::{
    FailingTask, HangingTask, PanickingTask, Phase, RecordingTask, StaticTask, TaskEvent,
};
