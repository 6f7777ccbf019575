//! Placement lifecycle.
//!
//! Each placement walks a fixed transition table from `Created` to one of
//! the two terminal states, `Filled` or `FallbackActive`. Illegal moves are
//! refused rather than applied.

use std::fmt;

use crate::dom::guard::HeightGuard;
use crate::dom::NodeId;
use crate::engine::probe::PlacementConfig;

/// Lifecycle of one placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlacementState {
    Created,
    NetworkLoading,
    NetworkChecking,
    Filled,
    Unfilled,
    TimedOut,
    FallbackRendering,
    FallbackActive,
}

impl PlacementState {
    /// `Filled` and `FallbackActive` end the lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlacementState::Filled | PlacementState::FallbackActive)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: PlacementState) -> bool {
        use PlacementState::*;
        matches!(
            (self, next),
            (Created, NetworkLoading)
                | (Created, FallbackRendering)
                | (NetworkLoading, NetworkChecking)
                | (NetworkLoading, FallbackRendering)
                | (NetworkChecking, Filled)
                | (NetworkChecking, Unfilled)
                | (NetworkChecking, TimedOut)
                | (Unfilled, FallbackRendering)
                | (TimedOut, FallbackRendering)
                | (FallbackRendering, FallbackActive)
        )
    }
}

impl fmt::Display for PlacementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlacementState::Created => "created",
            PlacementState::NetworkLoading => "network-loading",
            PlacementState::NetworkChecking => "network-checking",
            PlacementState::Filled => "filled",
            PlacementState::Unfilled => "unfilled",
            PlacementState::TimedOut => "timed-out",
            PlacementState::FallbackRendering => "fallback-rendering",
            PlacementState::FallbackActive => "fallback-active",
        };
        f.write_str(s)
    }
}

/// Why a placement went to the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// `unitType = custom`.
    Custom,
    /// The network bootstrap failed to load.
    LoadFailed,
    Unfilled,
    TimedOut,
}

/// One ad slot on the page.
#[derive(Debug)]
pub struct PlacementInstance {
    /// Page-wide sequence number; `id` is derived from it.
    pub seq: u64,
    pub id: String,
    pub config: PlacementConfig,
    /// The declaring tag.
    pub declaration: NodeId,
    /// Container inserted after the declaration.
    pub node: NodeId,
    pub state: PlacementState,
    /// Full state history, starting with `Created`.
    pub history: Vec<PlacementState>,
    pub frame_id: Option<String>,
    pub frame_url: Option<String>,
    pub fallback_reason: Option<FallbackReason>,
    pub elapsed_check_ms: u64,
    pub polls: u64,
    pub height_guards: Vec<HeightGuard>,
}

impl PlacementInstance {
    pub fn new(seq: u64, id: String, config: PlacementConfig, declaration: NodeId, node: NodeId) -> Self {
        Self {
            seq,
            id,
            config,
            declaration,
            node,
            state: PlacementState::Created,
            history: vec![PlacementState::Created],
            frame_id: None,
            frame_url: None,
            fallback_reason: None,
            elapsed_check_ms: 0,
            polls: 0,
            height_guards: Vec::new(),
        }
    }

    /// Move to `next`. Illegal transitions are refused and logged.
    pub fn transition(&mut self, next: PlacementState, level: log::Level) -> bool {
        if !self.state.can_transition_to(next) {
            log::warn!("{}: refused transition {} -> {}", self.id, self.state, next);
            return false;
        }
        log::log!(level, "{}: {} -> {}", self.id, self.state, next);
        self.state = next;
        self.history.push(next);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::probe::UnitType;
    use crate::dom::Document;

    fn instance() -> PlacementInstance {
        let mut doc = Document::with_skeleton();
        let decl = doc.create_element("script");
        let node = doc.create_element("div");
        PlacementInstance::new(
            1,
            "uj-vert-unit-1".into(),
            PlacementConfig::new(UnitType::Display),
            decl,
            node,
        )
    }

    #[test]
    fn network_path_transitions() {
        let mut p = instance();
        for next in [
            PlacementState::NetworkLoading,
            PlacementState::NetworkChecking,
            PlacementState::TimedOut,
            PlacementState::FallbackRendering,
            PlacementState::FallbackActive,
        ] {
            assert!(p.transition(next, log::Level::Debug));
        }
        assert!(p.state.is_terminal());
        assert_eq!(p.history.len(), 6);
    }

    #[test]
    fn terminal_states_refuse_changes() {
        let mut p = instance();
        p.transition(PlacementState::NetworkLoading, log::Level::Debug);
        p.transition(PlacementState::NetworkChecking, log::Level::Debug);
        p.transition(PlacementState::Filled, log::Level::Debug);
        assert!(!p.transition(PlacementState::FallbackRendering, log::Level::Debug));
        assert_eq!(p.state, PlacementState::Filled);
    }

    #[test]
    fn cannot_skip_rendering() {
        let mut p = instance();
        assert!(!p.transition(PlacementState::FallbackActive, log::Level::Debug));
        assert!(!p.transition(PlacementState::Filled, log::Level::Debug));
        assert_eq!(p.state, PlacementState::Created);
    }
}
