//! Delivery counters for the progress hub.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for hub fan-out monitoring.
#[derive(Debug, Default)]
pub struct HubMetrics {
    /// Events accepted from publishers.
    published: AtomicU64,
    /// Successful per-observer deliveries.
    delivered: AtomicU64,
    /// Observers evicted because their buffer was full.
    evicted: AtomicU64,
    /// Observers registered over the hub's lifetime.
    registered: AtomicU64,
}

impl HubMetrics {
    /// Records an event accepted by the actor.
    pub fn record_publish(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one successful delivery.
    pub fn record_delivery(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a slow observer eviction.
    pub fn record_eviction(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a new registration.
    pub fn record_registration(&self) {
        self.registered.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of published events.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Returns the number of deliveries.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Returns the number of evicted observers.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Returns the number of registrations.
    #[must_use]
    pub fn registered(&self) -> u64 {
        self.registered.load(Ordering::Relaxed)
    }

    /// Converts metrics to a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "published": self.published(),
            "delivered": self.delivered(),
            "evicted": self.evicted(),
            "registered": self.registered(),
        })
    }
}
