//! Ad placements with primary-network fill detection and a sandboxed
//! first-party fallback.
//!
//! A [`page::Page`] models the hosting document; a [`engine::VertEngine`]
//! attaches placements to it and drives them on the page's event loop.

pub mod dom;
pub mod engine;
pub mod error;
pub mod net;
pub mod options;
pub mod page;

pub use engine::VertEngine;
pub use error::VertError;
pub use options::VertOptions;
