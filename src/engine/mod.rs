//! Placement orchestrator.
//!
//! `VertEngine` owns the placements it attached and drives each through
//! Probe → Height guard → Network loader → Fill monitor → Fallback, keeping
//! the broker and entitlement hook running after. Ids, the broker listener
//! and the live-frame set are page-wide and live on the [`Page`], so several
//! engines on one page never collide.

pub mod assembly;
pub mod broker;
pub mod entitlement;
pub mod fallback;
pub mod monitor;
pub mod placement;
pub mod probe;

use crate::dom::guard::{self, guard_ancestors};
use crate::dom::NodeId;
use crate::engine::assembly::{insert_container, insert_network_slot, PLACEMENT_ID_PREFIX};
use crate::engine::broker::{Dispatch, InboundMessage};
use crate::engine::entitlement::{AuthState, Bindings, EntitlementHook, PlanBindings};
use crate::engine::fallback::{frame_url, mount_frame, server_base};
use crate::engine::monitor::{FillMonitor, FillStatus, Verdict};
use crate::engine::placement::{FallbackReason, PlacementInstance, PlacementState};
use crate::engine::probe::{Environment, PlacementConfig, DECLARATION_ATTR};
use crate::error::VertError;
use crate::net::loader::{NetworkLoader, ScriptLoader};
use crate::options::VertOptions;
use crate::page::{Page, Task};

/// Index of a placement inside its engine.
pub type PlacementIdx = usize;

pub struct VertEngine<L: ScriptLoader> {
    options: VertOptions,
    monitor: FillMonitor,
    network: NetworkLoader,
    scripts: L,
    bindings: Box<dyn Bindings>,
    entitlement: EntitlementHook,
    env: Environment,
    placements: Vec<PlacementInstance>,
}

impl<L: ScriptLoader> VertEngine<L> {
    pub fn new(options: VertOptions, scripts: L) -> Self {
        Self {
            monitor: FillMonitor::new(options.poll_interval_ms, options.poll_ceiling_ms),
            network: NetworkLoader::new(options.network_script.clone()),
            options,
            scripts,
            bindings: Box::new(PlanBindings),
            entitlement: EntitlementHook::new(),
            env: Environment::default(),
            placements: Vec::new(),
        }
    }

    /// Swap the visibility/binding system.
    pub fn with_bindings(mut self, bindings: Box<dyn Bindings>) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn options(&self) -> &VertOptions {
        &self.options
    }

    pub fn scripts(&self) -> &L {
        &self.scripts
    }

    pub fn entitlement(&self) -> &EntitlementHook {
        &self.entitlement
    }

    pub fn placements(&self) -> &[PlacementInstance] {
        &self.placements
    }

    pub fn placement(&self, id: &str) -> Option<&PlacementInstance> {
        self.placements.iter().find(|p| p.id == id)
    }

    /// Whether every placement reached `Filled` or `FallbackActive`.
    pub fn all_settled(&self) -> bool {
        self.placements.iter().all(|p| p.state.is_terminal())
    }

    /// Attach every declaration in the document. Runs once the page is
    /// ready; failures are per placement.
    pub fn attach_all(&mut self, page: &mut Page) -> Vec<Result<PlacementIdx, VertError>> {
        let fresh: Vec<NodeId> = page
            .document
            .elements_with_attr(DECLARATION_ATTR)
            .into_iter()
            .filter(|&decl| !self.placements.iter().any(|p| p.declaration == decl))
            .collect();
        fresh
            .into_iter()
            .map(|decl| self.attach(page, decl))
            .collect()
    }

    /// Create a placement for the declaring tag `declaration`.
    ///
    /// Configuration errors abort before anything is inserted. Every other
    /// failure is recovered by rendering the fallback.
    pub fn attach(&mut self, page: &mut Page, declaration: NodeId) -> Result<PlacementIdx, VertError> {
        let config = PlacementConfig::from_node(page.document.node(declaration)).map_err(|e| {
            log::error!("vert unit: {}", e);
            e
        })?;
        if !page.document.is_connected(declaration) {
            return Err(VertError::Detached);
        }

        self.env = Environment::probe(page);
        broker::install(page);

        let idx = self.placements.len();
        let seq = page.next_placement_seq();
        let id = format!("{}{}", PLACEMENT_ID_PREFIX, seq);
        let node = insert_container(
            &mut page.document,
            declaration,
            &id,
            config.unit_type,
            &self.options.hide_for_plans,
        );
        let guards = guard_ancestors(&mut page.document, declaration);

        let mut placement = PlacementInstance::new(seq, id, config, declaration, node);
        placement.height_guards = guards;
        log::log!(
            self.env.log_level(),
            "{}: created ({})",
            placement.id,
            placement.config.unit_type
        );
        self.placements.push(placement);

        if self.placements[idx].config.unit_type.uses_network() {
            self.start_network(page, idx);
        } else {
            self.render_fallback(page, idx, FallbackReason::Custom);
        }
        self.deliver_mutations(page);
        Ok(idx)
    }

    fn transition(&mut self, idx: PlacementIdx, next: PlacementState) -> bool {
        let level = self.env.log_level();
        self.placements[idx].transition(next, level)
    }

    fn start_network(&mut self, page: &mut Page, idx: PlacementIdx) {
        self.transition(idx, PlacementState::NetworkLoading);
        let client = self.placements[idx].config.network_client_id.clone();

        match self.network.load(page, client.as_deref(), &mut self.scripts) {
            Ok(_) => {
                let p = &self.placements[idx];
                insert_network_slot(&mut page.document, p.node, &p.config);
                NetworkLoader::request_ad(page, &p.id);
                self.entitlement.arm(&p.id);
                self.transition(idx, PlacementState::NetworkChecking);
                self.schedule_poll(page, idx);
            }
            Err(e) => {
                log::warn!("{}: network unavailable ({}), rendering fallback", self.placements[idx].id, e);
                self.render_fallback(page, idx, FallbackReason::LoadFailed);
            }
        }
    }

    fn schedule_poll(&mut self, page: &mut Page, idx: PlacementIdx) {
        let seq = self.placements[idx].seq;
        page.timers.schedule(self.monitor.interval_ms, Task::PollFill(seq));
    }

    /// Whether `task` belongs to one of this engine's placements.
    fn owns(placements: &[PlacementInstance], task: &Task) -> bool {
        match task {
            Task::PollFill(seq) => placements.iter().any(|p| p.seq == *seq),
        }
    }

    /// One fill-status poll. Ticks for a placement that already left
    /// `NetworkChecking` do nothing.
    fn poll(&mut self, page: &mut Page, seq: u64) -> Option<Verdict> {
        let interval = self.monitor.interval_ms;
        let idx = self.placements.iter().position(|p| p.seq == seq)?;
        let p = &mut self.placements[idx];
        if p.state != PlacementState::NetworkChecking {
            return None;
        }
        p.polls += 1;
        p.elapsed_check_ms += interval;

        let status = FillStatus::read(&page.document, p.node);
        let verdict = self.monitor.evaluate(status, p.elapsed_check_ms);
        match verdict {
            Verdict::Filled => {
                self.transition(idx, PlacementState::Filled);
            }
            Verdict::Unfilled => {
                self.transition(idx, PlacementState::Unfilled);
                self.render_fallback(page, idx, FallbackReason::Unfilled);
            }
            Verdict::TimedOut => {
                self.transition(idx, PlacementState::TimedOut);
                self.render_fallback(page, idx, FallbackReason::TimedOut);
            }
            Verdict::Continue => self.schedule_poll(page, idx),
        }
        Some(verdict)
    }

    /// Mount the sandboxed frame. The URL is built before any state or id
    /// changes, so a bad server base leaves the placement untouched.
    fn render_fallback(&mut self, page: &mut Page, idx: PlacementIdx, reason: FallbackReason) {
        let p = &self.placements[idx];
        if !p.state.can_transition_to(PlacementState::FallbackRendering) {
            log::warn!("{}: no fallback from {}", p.id, p.state);
            return;
        }
        let base = server_base(&self.options, &self.env, &page.location);
        let parent_url = page.location.href().to_string();
        let url = match frame_url(&base, &parent_url, &page.frame_ids.peek_id(), &p.config) {
            Ok(url) => url,
            Err(e) => {
                log::error!("{}: cannot build fallback url: {}", p.id, e);
                return;
            }
        };

        self.transition(idx, PlacementState::FallbackRendering);
        let frame_id = page.frame_ids.next_id();
        let p = &mut self.placements[idx];
        mount_frame(&mut page.document, p.node, &frame_id, &url);
        log::debug!("{}: fallback {} ({:?}) -> {}", p.id, frame_id, reason, url);

        page.register_live_frame(&frame_id);
        p.frame_id = Some(frame_id);
        p.frame_url = Some(url.to_string());
        p.fallback_reason = Some(reason);
        self.entitlement.arm(&p.id);
        self.transition(idx, PlacementState::FallbackActive);
    }

    fn run_task(&mut self, page: &mut Page, task: Task) {
        match task {
            Task::PollFill(seq) => {
                self.poll(page, seq);
            }
        }
        self.deliver_mutations(page);
    }

    /// Advance virtual time by `ms`, running every timer of this engine
    /// that falls due. Other engines' timers stay queued for them.
    pub fn advance(&mut self, page: &mut Page, ms: u64) {
        let deadline = page.timers.now_ms() + ms;
        while let Some((_, task)) = page
            .timers
            .pop_due(deadline, |t| Self::owns(&self.placements, t))
        {
            self.run_task(page, task);
        }
        page.timers.settle(deadline);
    }

    /// Run this engine's timers until none are pending. Monitors are
    /// bounded by the polling ceiling, so this terminates.
    pub fn run_until_idle(&mut self, page: &mut Page) {
        while let Some(due) = page.timers.next_due(|t| Self::owns(&self.placements, t)) {
            let step = due.saturating_sub(page.timers.now_ms());
            self.advance(page, step);
        }
    }

    /// Hand queued style mutations to the height guards.
    pub fn deliver_mutations(&mut self, page: &mut Page) -> usize {
        guard::deliver(
            &mut page.document,
            self.placements.iter().flat_map(|p| p.height_guards.iter()),
        )
    }

    /// Deliver a `message` event to the page. The single broker listener
    /// handles it once; `None` when no placement has installed it yet.
    pub fn deliver_message(&mut self, page: &mut Page, message: &InboundMessage) -> Option<Dispatch> {
        page.broker_listener()?;
        let out = broker::dispatch(page, message);
        self.deliver_mutations(page);
        Some(out)
    }

    /// Feed an auth-stream update. Returns the number of armed listeners
    /// that fired.
    pub fn on_auth_state(&mut self, page: &mut Page, state: &AuthState) -> usize {
        let fired = self.entitlement.fire(page, state, self.bindings.as_mut());
        self.deliver_mutations(page);
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::broker::{Ignored, NamedFrame, OpaqueFrame, CMD_CLICK, CMD_SET_DIMENSIONS};
    use crate::engine::fallback::SANDBOX_POLICY;
    use crate::engine::monitor::STATUS_ATTR;
    use crate::net::loader::StaticScriptLoader;
    use serde_json::json;

    const DISPLAY_PAGE: &str = r#"
        <html><head></head><body>
            <main class="container">
                <div class="row h-100">
                    <script data-vert-unit data-ad-type="display" data-ad-slot="123" data-ad-client="abc"></script>
                </div>
            </main>
        </body></html>
    "#;

    fn engine(scripts: StaticScriptLoader) -> VertEngine<StaticScriptLoader> {
        VertEngine::new(VertOptions::default(), scripts)
    }

    fn page(html: &str) -> Page {
        Page::from_html(html, "https://site.test/blog/post").unwrap()
    }

    fn slot(page: &Page, p: &PlacementInstance) -> NodeId {
        page.document.query_tag_class(p.node, "ins", "adsbygoogle").unwrap()
    }

    fn iframes(page: &Page) -> Vec<NodeId> {
        page.document
            .descendants(page.document.root())
            .into_iter()
            .filter(|&n| page.document.node(n).tag == "iframe")
            .collect()
    }

    fn declaration(unit: &str, extra: &str) -> String {
        format!(r#"<script data-vert-unit data-ad-type="{}" {}></script>"#, unit, extra)
    }

    #[test]
    fn scenario_a_filled_on_first_poll() {
        let mut page = page(DISPLAY_PAGE);
        let mut eng = engine(StaticScriptLoader::succeeding());
        let idx = eng.attach_all(&mut page)[0].clone().unwrap();

        let ins = slot(&page, &eng.placements()[idx]);
        page.document.set_attribute(ins, STATUS_ATTR, "filled");
        eng.run_until_idle(&mut page);

        let p = &eng.placements()[idx];
        assert_eq!(p.state, PlacementState::Filled);
        assert_eq!(p.polls, 1);
        assert!(iframes(&page).is_empty());
        assert_eq!(page.frame_ids.issued(), 0);
        assert!(page.timers.is_empty());
    }

    #[test]
    fn scenario_b_unfilled_renders_one_frame() {
        let mut page = page(DISPLAY_PAGE);
        let mut eng = engine(StaticScriptLoader::succeeding());
        let idx = eng.attach_all(&mut page)[0].clone().unwrap();

        let ins = slot(&page, &eng.placements()[idx]);
        page.document.set_attribute(ins, STATUS_ATTR, "unfilled");
        eng.advance(&mut page, 100);

        let p = &eng.placements()[idx];
        assert!(p.history.contains(&PlacementState::Unfilled));
        assert_eq!(p.state, PlacementState::FallbackActive);
        assert_eq!(p.fallback_reason, Some(FallbackReason::Unfilled));

        let frames = iframes(&page);
        assert_eq!(frames.len(), 1);
        let frame = page.document.node(frames[0]);
        assert!(frame.attr("src").unwrap().contains("frameId=vert-1"));
        assert_eq!(frame.attr("sandbox"), Some(SANDBOX_POLICY));
        assert_eq!(page.document.node(p.node).children(), &frames[..]);
        assert!(page.timers.is_empty());
    }

    #[test]
    fn scenario_c_timeout_renders_once() {
        let mut page = page(DISPLAY_PAGE);
        let opts = VertOptions::default().with_poll(100, 1000);
        let mut eng = VertEngine::new(opts, StaticScriptLoader::succeeding());
        let idx = eng.attach_all(&mut page)[0].clone().unwrap();

        eng.advance(&mut page, 900);
        assert_eq!(eng.placements()[idx].state, PlacementState::NetworkChecking);

        eng.advance(&mut page, 100);
        let p = &eng.placements()[idx];
        assert_eq!(p.state, PlacementState::FallbackActive);
        assert_eq!(p.fallback_reason, Some(FallbackReason::TimedOut));
        assert_eq!(p.polls, 10);

        eng.advance(&mut page, 10_000);
        assert_eq!(eng.placements()[idx].polls, 10);
        assert_eq!(iframes(&page).len(), 1);
        assert_eq!(page.frame_ids.issued(), 1);
        let timed_out = eng.placements()[idx]
            .history
            .iter()
            .filter(|s| **s == PlacementState::TimedOut)
            .count();
        assert_eq!(timed_out, 1);
    }

    #[test]
    fn scenario_d_click_navigates_top() {
        let html = format!("<html><body>{}</body></html>", declaration("custom", ""));
        let mut page = page(&html);
        let mut eng = engine(StaticScriptLoader::succeeding());
        eng.attach_all(&mut page);

        let msg = InboundMessage::new(json!({
            "command": CMD_CLICK,
            "payload": { "url": "https://example.com/x" }
        }));
        let out = eng.deliver_message(&mut page, &msg);
        assert_eq!(out, Some(Dispatch::Navigated { url: "https://example.com/x".into() }));
        assert_eq!(page.location.href().as_str(), "https://example.com/x");
    }

    #[test]
    fn custom_units_skip_network() {
        let html = format!(
            "<html><body>{}</body></html>",
            declaration("custom", r#"data-ad-size="300x250" data-vert-id="promo-7""#)
        );
        let mut page = page(&html);
        let mut eng = engine(StaticScriptLoader::succeeding());
        let idx = eng.attach_all(&mut page)[0].clone().unwrap();
        eng.run_until_idle(&mut page);

        let p = &eng.placements()[idx];
        assert_eq!(
            p.history,
            vec![
                PlacementState::Created,
                PlacementState::FallbackRendering,
                PlacementState::FallbackActive
            ]
        );
        assert_eq!(p.polls, 0);
        assert!(eng.scripts().requests.is_empty());
        assert!(page.globals.ad_queue.is_none());
        assert_eq!(page.frame_ids.issued(), 1);

        let url = p.frame_url.as_deref().unwrap();
        assert!(url.starts_with("https://vert.itwcreativeworks.com/verts/main?"));
        assert!(url.contains("size=300x250"));
        assert!(url.contains("loadVertId=promo-7"));
    }

    #[test]
    fn load_failure_goes_straight_to_fallback() {
        let mut page = page(DISPLAY_PAGE);
        let mut eng = engine(StaticScriptLoader::failing("net::ERR_BLOCKED_BY_CLIENT"));
        let idx = eng.attach_all(&mut page)[0].clone().unwrap();

        let p = &eng.placements()[idx];
        assert_eq!(p.state, PlacementState::FallbackActive);
        assert_eq!(p.fallback_reason, Some(FallbackReason::LoadFailed));
        assert!(!p.history.contains(&PlacementState::NetworkChecking));
        assert!(page.timers.is_empty());
    }

    #[test]
    fn invalid_unit_type_inserts_nothing() {
        let html = format!("<html><body>{}</body></html>", declaration("banner", ""));
        let mut page = page(&html);
        let before = page.document.node_count();
        let mut eng = engine(StaticScriptLoader::succeeding());

        let results = eng.attach_all(&mut page);
        assert_eq!(results, vec![Err(VertError::InvalidUnitType("banner".into()))]);
        assert!(eng.placements().is_empty());
        assert_eq!(page.document.node_count(), before);
    }

    #[test]
    fn frame_ids_unique_and_increasing() {
        let decls: String = (0..4).map(|_| declaration("custom", "")).collect();
        let mut page = page(&format!("<html><body>{}</body></html>", decls));
        let mut eng = engine(StaticScriptLoader::succeeding());
        eng.attach_all(&mut page);

        let ids: Vec<&str> = eng
            .placements()
            .iter()
            .map(|p| p.frame_id.as_deref().unwrap())
            .collect();
        assert_eq!(ids, vec!["vert-1", "vert-2", "vert-3", "vert-4"]);
    }

    #[test]
    fn network_script_injected_once_for_many_placements() {
        let decls: String = (0..3)
            .map(|_| declaration("display", r#"data-ad-client="abc""#))
            .collect();
        let mut page = page(&format!("<html><head></head><body>{}</body></html>", decls));
        let mut eng = engine(StaticScriptLoader::succeeding());
        eng.attach_all(&mut page);

        assert_eq!(eng.scripts().requests.len(), 1);
        let injected = page
            .document
            .elements_with_attr("src")
            .into_iter()
            .filter(|&n| page.document.node(n).tag == "script")
            .count();
        assert_eq!(injected, 1);
        assert_eq!(page.globals.ad_queue.as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn broker_installed_once_dispatches_once() {
        let decls = format!("{}{}", declaration("custom", ""), declaration("custom", ""));
        let mut page = page(&format!("<html><body>{}</body></html>", decls));
        let mut eng = engine(StaticScriptLoader::succeeding());
        eng.attach_all(&mut page);
        assert_eq!(page.message_listeners().len(), 1);

        let msg = InboundMessage::from_frame(
            json!({ "command": CMD_SET_DIMENSIONS, "payload": { "height": 250 } }),
            NamedFrame("vert-2".into()),
        );
        let out = eng.deliver_message(&mut page, &msg);
        assert_eq!(out, Some(Dispatch::Resized { id: "vert-2".into(), height: 250.0 }));

        let frame = page.document.get_element_by_id("vert-2").unwrap();
        assert_eq!(page.document.style_property(frame, "height").as_deref(), Some("250px"));
    }

    #[test]
    fn resize_of_removed_frame_is_ignored() {
        let html = format!("<html><body>{}</body></html>", declaration("custom", ""));
        let mut page = page(&html);
        let mut eng = engine(StaticScriptLoader::succeeding());
        let idx = eng.attach_all(&mut page)[0].clone().unwrap();
        let container = eng.placements()[idx].node;
        page.document.remove(container);

        let msg = InboundMessage::new(json!({
            "command": CMD_SET_DIMENSIONS,
            "payload": { "id": "vert-1", "height": 250 }
        }));
        let out = eng.deliver_message(&mut page, &msg);
        assert_eq!(out, Some(Dispatch::Ignored(Ignored::UnknownTarget)));
    }

    #[test]
    fn height_guard_counters_network_override() {
        let mut page = page(DISPLAY_PAGE);
        let mut eng = engine(StaticScriptLoader::succeeding());
        let idx = eng.attach_all(&mut page)[0].clone().unwrap();

        let p = &eng.placements()[idx];
        assert_eq!(p.height_guards.len(), 1);
        let row = p.height_guards[0].target();
        assert!(!page.document.is_style_observed(p.node));

        page.document.set_attribute(row, "style", "height: auto !important");
        eng.advance(&mut page, 100);
        assert_eq!(page.document.style_property(row, "height"), None);
    }

    #[test]
    fn detached_placement_times_out_harmlessly() {
        let mut page = page(DISPLAY_PAGE);
        let opts = VertOptions::default().with_poll(100, 300);
        let mut eng = VertEngine::new(opts, StaticScriptLoader::succeeding());
        let idx = eng.attach_all(&mut page)[0].clone().unwrap();
        let container = eng.placements()[idx].node;
        page.document.remove(container);

        eng.run_until_idle(&mut page);
        assert_eq!(eng.placements()[idx].state, PlacementState::FallbackActive);
        assert!(iframes(&page).is_empty());
    }

    #[test]
    fn debug_flag_points_fallback_at_page_origin() {
        let html = format!("<html><body>{}</body></html>", declaration("custom", ""));
        let mut page = Page::from_html(&html, "http://localhost:4000/post?vert-debug").unwrap();
        let mut eng = engine(StaticScriptLoader::succeeding());
        eng.attach_all(&mut page);
        let url = eng.placements()[0].frame_url.as_deref().unwrap();
        assert!(url.starts_with("http://localhost:4000/verts/main?parentURL="));
    }

    #[test]
    fn auth_update_rehides_for_paid_plan() {
        let mut page = page(DISPLAY_PAGE);
        let mut eng = engine(StaticScriptLoader::succeeding());
        let idx = eng.attach_all(&mut page)[0].clone().unwrap();
        let ins = slot(&page, &eng.placements()[idx]);
        page.document.set_attribute(ins, STATUS_ATTR, "unfilled");
        eng.run_until_idle(&mut page);

        // One listener from the network push, one from the fallback.
        assert_eq!(eng.entitlement().armed(), 2);
        let fired = eng.on_auth_state(&mut page, &AuthState::signed_in("premium"));
        assert_eq!(fired, 2);
        let node = eng.placements()[idx].node;
        assert_eq!(page.document.node(node).attr("hidden"), Some(""));
        assert_eq!(eng.on_auth_state(&mut page, &AuthState::default()), 0);
    }

    #[test]
    fn attach_all_skips_existing_placements() {
        let mut page = page(DISPLAY_PAGE);
        let mut eng = engine(StaticScriptLoader::succeeding());
        assert_eq!(eng.attach_all(&mut page).len(), 1);
        assert!(eng.attach_all(&mut page).is_empty());
        assert_eq!(eng.placements().len(), 1);
    }

    #[test]
    fn message_before_any_placement_is_unhandled() {
        let mut page = page("<html><body></body></html>");
        let mut eng = engine(StaticScriptLoader::succeeding());
        let msg = InboundMessage::new(json!({
            "command": CMD_CLICK,
            "payload": { "url": "https://example.com/x" }
        }));
        assert_eq!(eng.deliver_message(&mut page, &msg), None);
        assert!(page.location.navigations().is_empty());
    }

    #[test]
    fn opaque_source_resizes_by_payload_id() {
        let html = format!("<html><body>{}</body></html>", declaration("custom", ""));
        let mut page = page(&html);
        let mut eng = engine(StaticScriptLoader::succeeding());
        eng.attach_all(&mut page);

        let msg = InboundMessage::from_frame(
            json!({ "command": CMD_SET_DIMENSIONS, "payload": { "id": "vert-1", "height": "120px" } }),
            OpaqueFrame,
        );
        let out = eng.deliver_message(&mut page, &msg);
        assert_eq!(out, Some(Dispatch::Resized { id: "vert-1".into(), height: 120.0 }));
        let frame = page.document.get_element_by_id("vert-1").unwrap();
        assert_eq!(page.document.style_property(frame, "height").as_deref(), Some("120px"));

        let nameless = InboundMessage::from_frame(
            json!({ "command": CMD_SET_DIMENSIONS, "payload": { "height": 80 } }),
            OpaqueFrame,
        );
        let out = eng.deliver_message(&mut page, &nameless);
        assert_eq!(out, Some(Dispatch::Ignored(Ignored::Malformed)));
        assert_eq!(page.document.style_property(frame, "height").as_deref(), Some("120px"));
    }

    #[test]
    fn two_engines_share_page_singletons() {
        let decls = format!("{}{}", declaration("custom", ""), declaration("custom", ""));
        let mut page = page(&format!("<html><body>{}</body></html>", decls));
        let found = page.document.elements_with_attr(DECLARATION_ATTR);
        let mut a = engine(StaticScriptLoader::succeeding());
        let mut b = engine(StaticScriptLoader::succeeding());
        a.attach(&mut page, found[0]).unwrap();
        b.attach(&mut page, found[1]).unwrap();

        assert_eq!(page.message_listeners().len(), 1);
        let pa = &a.placements()[0];
        let pb = &b.placements()[0];
        assert_ne!(pa.id, pb.id);
        assert_eq!(pa.frame_id.as_deref(), Some("vert-1"));
        assert_eq!(pb.frame_id.as_deref(), Some("vert-2"));
        assert_eq!(page.frame_ids.issued(), 2);
        for id in ["vert-1", "vert-2", pa.id.as_str(), pb.id.as_str()] {
            let hits = page
                .document
                .descendants(page.document.root())
                .into_iter()
                .filter(|&n| page.document.node(n).attr("id") == Some(id))
                .count();
            assert_eq!(hits, 1, "duplicate element id {}", id);
        }

        let click = InboundMessage::new(json!({
            "command": CMD_CLICK,
            "payload": { "url": "https://example.com/x" }
        }));
        let out = a.deliver_message(&mut page, &click);
        assert_eq!(out, Some(Dispatch::Navigated { url: "https://example.com/x".into() }));
        assert_eq!(page.location.navigations().len(), 1);

        // Engine A can route a resize to the frame engine B mounted.
        let resize = InboundMessage::from_frame(
            json!({ "command": CMD_SET_DIMENSIONS, "payload": { "height": 90 } }),
            NamedFrame("vert-2".into()),
        );
        let out = a.deliver_message(&mut page, &resize);
        assert_eq!(out, Some(Dispatch::Resized { id: "vert-2".into(), height: 90.0 }));
    }

    #[test]
    fn engines_only_run_their_own_polls() {
        let decls = format!(
            "{}{}",
            declaration("display", r#"data-ad-client="abc""#),
            declaration("display", r#"data-ad-client="abc""#)
        );
        let mut page = page(&format!("<html><head></head><body>{}</body></html>", decls));
        let found = page.document.elements_with_attr(DECLARATION_ATTR);
        let mut a = engine(StaticScriptLoader::succeeding());
        let mut b = engine(StaticScriptLoader::succeeding());
        a.attach(&mut page, found[0]).unwrap();
        b.attach(&mut page, found[1]).unwrap();
        assert_eq!(page.timers.len(), 2);

        a.advance(&mut page, 100);
        assert_eq!(a.placements()[0].polls, 1);
        assert_eq!(b.placements()[0].polls, 0);

        let ins = slot(&page, &b.placements()[0]);
        page.document.set_attribute(ins, STATUS_ATTR, "filled");
        b.run_until_idle(&mut page);
        assert_eq!(b.placements()[0].state, PlacementState::Filled);
        assert_eq!(a.placements()[0].state, PlacementState::NetworkChecking);
    }

    #[test]
    fn bad_server_base_leaves_placement_untouched() {
        let html = format!("<html><body>{}</body></html>", declaration("custom", ""));
        let mut page = page(&html);
        let mut opts = VertOptions::default();
        opts.server_base = url::Url::parse("mailto:ads@site.test").unwrap();
        let mut eng = VertEngine::new(opts, StaticScriptLoader::succeeding());
        let idx = eng.attach_all(&mut page)[0].clone().unwrap();

        let p = &eng.placements()[idx];
        assert_eq!(p.history, vec![PlacementState::Created]);
        assert_eq!(p.frame_id, None);
        assert_eq!(page.frame_ids.issued(), 0);
        assert!(iframes(&page).is_empty());
        assert_eq!(eng.entitlement().armed(), 0);
        assert!(!eng.all_settled());
    }

    #[test]
    fn debug_flag_on_opaque_page_uses_production() {
        let html = format!("<html><body>{}</body></html>", declaration("custom", ""));
        let mut page = Page::from_html(&html, "about:blank?vert-debug").unwrap();
        let mut eng = engine(StaticScriptLoader::succeeding());
        eng.attach_all(&mut page);

        let p = &eng.placements()[0];
        assert_eq!(p.state, PlacementState::FallbackActive);
        assert!(p
            .frame_url
            .as_deref()
            .unwrap()
            .starts_with("https://vert.itwcreativeworks.com/verts/main?"));
        assert!(eng.all_settled());
    }
}
