//! Built-in node types.
//!
//! | Tag | Task |
//! |---|---|
//! | `api` | [`ApiNode`] (feature `http`) |
//! | `mock` | [`MockNode`] |
//! | `verification` | [`VerificationNode`] |
//! | `report` | [`ReportNode`] |
//! | `event_trigger` | [`MockNode`] |

#[cfg(feature = "http")]
mod api;
mod mock;
mod report;
mod verification;

#[cfg(feature = "http")]
pub use api::{ApiNode, REQUEST_TIMEOUT};
pub use mock::MockNode;
pub use report::ReportNode;
pub use verification::{AssertionType, VerificationNode};

use crate::tasks::TaskRegistry;
use std::sync::Arc;

/// Type tag of the HTTP call node.
pub const API: &str = "api";
/// Type tag of the mock node.
pub const MOCK: &str = "mock";
/// Type tag of the verification node.
pub const VERIFICATION: &str = "verification";
/// Type tag of the report node.
pub const REPORT: &str = "report";
/// Type tag of the event trigger node.
pub const EVENT_TRIGGER: &str = "event_trigger";

/// Registers every built-in node type.
pub fn register_builtins(registry: &TaskRegistry) {
    #[cfg(feature = "http")]
    match ApiNode::new() {
        Ok(node) => registry.register(API, Arc::new(node)),
        Err(e) => tracing::warn!(error = %e, "HTTP client unavailable; api nodes will fail"),
    }

    let mock = Arc::new(MockNode);
    registry.register(MOCK, mock.clone());
    // Triggers have no runtime behavior of their own yet.
    registry.register(EVENT_TRIGGER, mock);
    registry.register(VERIFICATION, Arc::new(VerificationNode));
    registry.register(REPORT, Arc::new(ReportNode));
}
