//! Tracing subscriber setup and span helpers.

use crate::config::{LogFormat, LoggingConfig};
use anyhow::{Context, Result};
use tracing::{Span, Subscriber};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter. Fails if a
/// global subscriber is already set or the filter does not parse.
///
/// ```rust,ignore
/// let config = EngineConfig::from_env()?;
/// apiflow::observability::init_tracing(&config.logging)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    build_subscriber(config)?
        .try_init()
        .context("Failed to initialize tracing subscriber")
}

/// Builds the subscriber [`init_tracing`] installs, without installing it.
pub fn build_subscriber(config: &LoggingConfig) -> Result<Box<dyn Subscriber + Send + Sync>> {
    let registry = tracing_subscriber::registry().with(build_filter(config)?);
    Ok(match config.format {
        LogFormat::Json => Box::new(
            registry.with(fmt::layer().json().flatten_event(true).with_target(true)),
        ),
        LogFormat::Text => Box::new(registry.with(fmt::layer().with_target(true))),
    })
}

/// Resolves the effective filter: `RUST_LOG` if set, else the configured one.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.filter)
            .with_context(|| format!("Invalid log filter '{}'", config.filter)),
    }
}

/// Span wrapping one run.
#[must_use]
pub fn run_span(run_id: Uuid, flow_id: Uuid) -> Span {
    tracing::info_span!("run", %run_id, %flow_id)
}

/// Span wrapping one node worker.
#[must_use]
pub fn node_span(run_id: Uuid, node_id: &str, node_type: &str) -> Span {
    tracing::debug_span!("node", %run_id, node_id, node_type)
}
