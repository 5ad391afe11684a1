//! Observability events for lineagedb
//!
//! Per LINEAGE.md §8, this module defines all observable events
//! that can occur during capture, block management, and what-if
//! evaluation.
//!
//! Events are explicit and typed.

use std::fmt;

use super::logger::Severity;

/// Observable events in lineagedb
///
/// Per LINEAGE.md §8, these events cover:
/// - Session lifecycle
/// - Capture (per query)
/// - Capture diagnostics
/// - Block building, storage, and export
/// - What-if evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Session lifecycle
    /// Capture session created
    SessionOpened,
    /// Capture flag turned on
    CaptureEnabled,
    /// Capture flag turned off
    CaptureDisabled,

    // Capture
    /// Instrumented execution begins
    CaptureBegin,
    /// Instrumented execution complete, block stored
    CaptureComplete,
    /// Instrumented execution failed (query error)
    CaptureFailed,

    // Capture diagnostics (query unaffected)
    /// A scanned relation has no stable row identity
    IdentityUnavailable,
    /// An operator has no propagation rule
    OperatorSkipped,

    // Block building
    /// Annotation expansion begins
    BlockBuildBegin,
    /// Block materialized
    BlockBuildComplete,
    /// Expansion failed, no block stored
    BlockBuildFailed,

    // Block registry
    /// Block stored in the registry
    BlockStored,
    /// Block read from the registry
    BlockRead,
    /// Block evicted from the registry
    BlockEvicted,
    /// Block serialized to a writer
    BlockExported,

    // What-if evaluation
    /// Evaluation begins
    WhatIfBegin,
    /// Evaluation complete
    WhatIfComplete,
    /// Evaluation rejected (validation or shape failure)
    WhatIfFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            // Session lifecycle
            Event::SessionOpened => "SESSION_OPENED",
            Event::CaptureEnabled => "CAPTURE_ENABLED",
            Event::CaptureDisabled => "CAPTURE_DISABLED",

            // Capture
            Event::CaptureBegin => "CAPTURE_BEGIN",
            Event::CaptureComplete => "CAPTURE_COMPLETE",
            Event::CaptureFailed => "CAPTURE_FAILED",

            // Diagnostics
            Event::IdentityUnavailable => "IDENTITY_UNAVAILABLE",
            Event::OperatorSkipped => "OPERATOR_SKIPPED",

            // Block building
            Event::BlockBuildBegin => "BLOCK_BUILD_BEGIN",
            Event::BlockBuildComplete => "BLOCK_BUILD_COMPLETE",
            Event::BlockBuildFailed => "BLOCK_BUILD_FAILED",

            // Block registry
            Event::BlockStored => "BLOCK_STORED",
            Event::BlockRead => "BLOCK_READ",
            Event::BlockEvicted => "BLOCK_EVICTED",
            Event::BlockExported => "BLOCK_EXPORTED",

            // What-if
            Event::WhatIfBegin => "WHATIF_BEGIN",
            Event::WhatIfComplete => "WHATIF_COMPLETE",
            Event::WhatIfFailed => "WHATIF_FAILED",
        }
    }

    /// Returns the severity this event logs at
    ///
    /// Diagnostics are WARN (capture degraded, query unaffected);
    /// failures are ERROR; everything else is INFO.
    pub fn severity(&self) -> Severity {
        match self {
            Event::IdentityUnavailable | Event::OperatorSkipped => Severity::Warn,
            Event::CaptureFailed | Event::BlockBuildFailed | Event::WhatIfFailed => {
                Severity::Error
            }
            _ => Severity::Info,
        }
    }

    /// Returns true if this event marks degraded capture
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Event::IdentityUnavailable | Event::OperatorSkipped)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
