//! Entitlement re-evaluation hook.
//!
//! Whether a viewer sees ads depends on their plan, which may resolve after
//! a placement has already rendered. Each resolved placement arms a one-shot
//! listener on the auth stream; the next auth update re-runs the bindings.

use crate::page::Page;

/// Attribute listing plan ids for which an element is hidden.
pub const HIDE_PLANS_ATTR: &str = "data-vert-hide-plans";

/// Snapshot pushed by the external authentication stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub authenticated: bool,
    pub plan: Option<String>,
}

impl AuthState {
    pub fn signed_in(plan: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            plan: Some(plan.into()),
        }
    }
}

/// External visibility/binding system.
pub trait Bindings {
    fn reevaluate(&mut self, page: &mut Page, state: &AuthState);
}

/// Hides every element whose [`HIDE_PLANS_ATTR`] names the viewer's plan.
#[derive(Debug, Default)]
pub struct PlanBindings;

impl Bindings for PlanBindings {
    fn reevaluate(&mut self, page: &mut Page, state: &AuthState) {
        let doc = &mut page.document;
        for node in doc.elements_with_attr(HIDE_PLANS_ATTR) {
            let hide = match (&state.plan, doc.node(node).attr(HIDE_PLANS_ATTR)) {
                (Some(plan), Some(list)) => list.split(',').any(|p| p.trim() == plan),
                _ => false,
            };
            if hide {
                doc.set_attribute(node, "hidden", "");
            } else {
                doc.remove_attribute(node, "hidden");
            }
        }
    }
}

/// One-shot listeners waiting for the next auth update.
#[derive(Debug, Default)]
pub struct EntitlementHook {
    armed: Vec<String>,
}

impl EntitlementHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a listener on behalf of `placement_id`.
    pub fn arm(&mut self, placement_id: &str) {
        self.armed.push(placement_id.to_string());
    }

    pub fn armed(&self) -> usize {
        self.armed.len()
    }

    /// Fire every armed listener once, then disarm them all. Returns the
    /// number of re-evaluations triggered.
    pub fn fire(&mut self, page: &mut Page, state: &AuthState, bindings: &mut dyn Bindings) -> usize {
        let listeners = std::mem::take(&mut self.armed);
        for id in &listeners {
            log::debug!("entitlement: re-evaluating bindings for {}", id);
            bindings.reevaluate(page, state);
        }
        listeners.len()
    }
}
