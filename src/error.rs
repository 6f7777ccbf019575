use thiserror::Error;

/// Failures surfaced by placement operations.
///
/// None of these escape to the hosting page: the engine logs them and takes
/// the matching recovery path (abort the placement or render the fallback).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VertError {
    #[error("placement is missing a unit type")]
    MissingUnitType,

    #[error("unrecognized unit type {0:?}")]
    InvalidUnitType(String),

    #[error("failed to load script {src}: {reason}")]
    ScriptLoad { src: String, reason: String },

    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("placement node is not attached to the document")]
    Detached,
}

impl VertError {
    /// Configuration errors abort the placement; everything else recovers.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::MissingUnitType | Self::InvalidUnitType(_))
    }
}

/// Reading a message source's frame name was blocked by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cross-origin access to frame name blocked: {0}")]
pub struct FrameAccessError(pub String);
