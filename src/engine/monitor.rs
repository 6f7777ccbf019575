//! Fill-status monitor.
//!
//! Each tick is a pure function of the status marker read from the slot
//! and the elapsed polling time. The engine owns the timer that drives it.

use crate::dom::{Document, NodeId};

/// Attribute the primary network writes onto its slot element.
pub const STATUS_ATTR: &str = "data-ad-status";

/// Fill status as read from the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStatus {
    Filled,
    Unfilled,
    /// Marker absent or not yet decided.
    Pending,
}

impl FillStatus {
    pub fn from_marker(marker: Option<&str>) -> Self {
        match marker.map(str::trim) {
            Some("filled") => FillStatus::Filled,
            Some("unfilled") => FillStatus::Unfilled,
            _ => FillStatus::Pending,
        }
    }

    /// Read the marker from the network slot inside `container`.
    pub fn read(doc: &Document, container: NodeId) -> Self {
        let marker = doc
            .query_tag_class(container, "ins", "adsbygoogle")
            .and_then(|ins| doc.node(ins).attr(STATUS_ATTR));
        Self::from_marker(marker)
    }
}

/// Outcome of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Filled,
    Unfilled,
    TimedOut,
    /// Poll again after another interval.
    Continue,
}

/// Bounded fixed-interval polling schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillMonitor {
    pub interval_ms: u64,
    pub ceiling_ms: u64,
}

impl FillMonitor {
    pub fn new(interval_ms: u64, ceiling_ms: u64) -> Self {
        Self {
            interval_ms: interval_ms.max(1),
            ceiling_ms,
        }
    }

    /// Decide the next step from a status read at `elapsed_ms`.
    pub fn evaluate(&self, status: FillStatus, elapsed_ms: u64) -> Verdict {
        match status {
            FillStatus::Filled => Verdict::Filled,
            FillStatus::Unfilled => Verdict::Unfilled,
            FillStatus::Pending if elapsed_ms >= self.ceiling_ms => Verdict::TimedOut,
            FillStatus::Pending => Verdict::Continue,
        }
    }
}
