//! Ancestor height guard.
//!
//! The primary network's script forces `height: auto !important` onto
//! containers around its slot. Ancestors that size themselves through a
//! fixed-height utility class get a style watch, and any inline `height`
//! that shows up on them is stripped again.

use crate::dom::{Document, DomNode, MutationRecord, NodeId};

/// Utility classes that pin an element's height.
pub const FIXED_HEIGHT_CLASSES: &[&str] = &["h-100", "vh-100", "min-vh-100", "mh-100"];

/// Whether `node` uses one of the [`FIXED_HEIGHT_CLASSES`].
pub fn has_fixed_height_class(node: &DomNode) -> bool {
    node.classes().any(|c| FIXED_HEIGHT_CLASSES.contains(&c))
}

/// Watch handle on one ancestor's `style` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeightGuard {
    target: NodeId,
}

impl HeightGuard {
    pub fn target(&self) -> NodeId {
        self.target
    }

    /// Corrective callback: drop an inline `height` from the target.
    /// Returns whether anything was removed.
    pub fn apply(&self, doc: &mut Document) -> bool {
        let removed = doc.remove_style_property(self.target, "height");
        if removed {
            log::debug!("height guard: cleared inline height on {:?}", self.target);
        }
        removed
    }

    /// Stop watching the target.
    pub fn dispose(self, doc: &mut Document) {
        doc.unobserve_style(self.target);
    }
}

/// Attach a style watch to every ancestor of `start` that matches
/// `predicate`, walking up to but not including the `html` element.
/// `start` itself is never watched.
pub fn watch_ancestors<F>(doc: &mut Document, start: NodeId, predicate: F) -> Vec<HeightGuard>
where
    F: Fn(&DomNode) -> bool,
{
    let stop = doc.document_element();
    let targets: Vec<NodeId> = doc
        .ancestors(start)
        .into_iter()
        .take_while(|&a| Some(a) != stop)
        .filter(|&a| predicate(doc.node(a)))
        .collect();

    targets
        .into_iter()
        .map(|target| {
            doc.observe_style(target);
            HeightGuard { target }
        })
        .collect()
}

/// Guard the fixed-height ancestors of a placement's insertion point.
pub fn guard_ancestors(doc: &mut Document, start: NodeId) -> Vec<HeightGuard> {
    let guards = watch_ancestors(doc, start, has_fixed_height_class);
    if !guards.is_empty() {
        log::debug!("height guard: watching {} ancestor(s)", guards.len());
    }
    guards
}

/// Deliver queued mutation records to `guards` until the queue settles.
/// Returns the number of corrections made.
pub fn deliver<'a, I>(doc: &mut Document, guards: I) -> usize
where
    I: IntoIterator<Item = &'a HeightGuard> + Clone,
{
    let mut corrections = 0;
    loop {
        let records: Vec<MutationRecord> = doc.take_records();
        if records.is_empty() {
            break;
        }
        for record in &records {
            for guard in guards.clone() {
                if guard.target == record.target && guard.apply(doc) {
                    corrections += 1;
                }
            }
        }
    }
    corrections
}
