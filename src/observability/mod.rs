//! Observability subsystem for lineagedb
//!
//! Per LINEAGE.md §8, this module provides:
//! - Structured logging (JSON)
//! - Deterministic metrics
//! - Lifecycle event tracing
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on capture or evaluation
//! 3. No async or background threads
//! 4. Deterministic output
//! 5. Zero allocations in hot paths (where possible)
//!
//! # Usage
//!
//! ```ignore
//! use lineagedb::observability::{Logger, Event, MetricsRegistry, ObservationScope};
//!
//! // Log an event
//! Logger::info("CAPTURE_COMPLETE", &[("edges", "42")]);
//!
//! // Track metrics
//! let metrics = MetricsRegistry::new();
//! metrics.increment_captures_completed();
//!
//! // Scope-based logging
//! let scope = ObservationScope::new("BLOCK_BUILD");
//! // ... expand annotations ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::{ObservationScope, Timer};

/// Log a lifecycle event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        // This just verifies no panic
        log_event(Event::SessionOpened);
        log_event(Event::CaptureBegin);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::BlockStored, &[
            ("query_id", "12"),
        ]);
    }

    #[test]
    fn test_diagnostic_event_logs_warn() {
        // Severity is resolved from the event itself
        assert_eq!(Event::OperatorSkipped.severity(), Severity::Warn);
        log_event_with_fields(Event::OperatorSkipped, &[("label", "window")]);
    }
}
