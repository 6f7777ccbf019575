//! The hosting page as seen by placements.
//!
//! Bundles the document, the top-level location, the primary network's
//! page globals, the timer queue, and the `message` listener registry into
//! one owned value. Everything runs on the page's single event loop.
//!
//! State that must be unique per page rather than per initializer (frame
//! ids, placement ids, the broker listener, the set of live fallback
//! frames) lives here too. It is created with the page and never reset.

pub mod timers;

use url::Url;

use crate::dom::Document;
use crate::engine::fallback::FrameIdCounter;
use crate::error::VertError;
use crate::page::timers::TimerQueue;

/// Work the page's event loop can run later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// One fill-status poll for the placement with this page sequence number.
    PollFill(u64),
}

/// One `push({})` onto the primary network's ad queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdRequest {
    /// Id of the placement container whose slot should be rendered.
    pub placement_id: String,
}

/// Page-level globals the placements read or write.
#[derive(Debug, Default)]
pub struct Globals {
    /// The primary network's ad queue; `None` until its bootstrap loads.
    pub ad_queue: Option<Vec<AdRequest>>,
}

/// Top-level browsing context location.
#[derive(Debug, Clone)]
pub struct Location {
    href: Url,
    navigations: Vec<String>,
}

impl Location {
    pub fn new(href: Url) -> Self {
        Self {
            href,
            navigations: Vec::new(),
        }
    }

    pub fn href(&self) -> &Url {
        &self.href
    }

    /// `scheme://host[:port]` of the current page, or `"null"` for
    /// opaque origins.
    pub fn origin(&self) -> String {
        self.href.origin().ascii_serialization()
    }

    /// Whether a query flag is present and not explicitly false.
    pub fn query_flag(&self, name: &str) -> bool {
        self.href
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| !matches!(&*v, "false" | "0"))
            .unwrap_or(false)
    }

    /// Navigate the top-level page. The raw string is recorded even when
    /// it does not parse, in which case the current href is kept.
    pub fn assign(&mut self, url: &str) {
        self.navigations.push(url.to_string());
        match self.href.join(url) {
            Ok(next) => self.href = next,
            Err(e) => log::warn!("location: cannot resolve {:?}: {}", url, e),
        }
    }

    /// Every navigation requested so far, oldest first.
    pub fn navigations(&self) -> &[String] {
        &self.navigations
    }
}

/// Opaque id of a registered `message` listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(usize);

/// The hosting page.
#[derive(Debug)]
pub struct Page {
    pub document: Document,
    pub location: Location,
    pub globals: Globals,
    pub timers: TimerQueue<Task>,
    /// Frame ids are handed out page-wide so two initializers never mint
    /// the same `vert-N`.
    pub frame_ids: FrameIdCounter,
    message_listeners: Vec<ListenerId>,
    broker_listener: Option<ListenerId>,
    placement_seq: u64,
    live_frames: Vec<String>,
}

impl Page {
    pub fn new(document: Document, href: &str) -> Result<Self, VertError> {
        let href = Url::parse(href).map_err(|e| VertError::InvalidUrl {
            url: href.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            document,
            location: Location::new(href),
            globals: Globals::default(),
            timers: TimerQueue::new(),
            frame_ids: FrameIdCounter::new(),
            message_listeners: Vec::new(),
            broker_listener: None,
            placement_seq: 0,
            live_frames: Vec::new(),
        })
    }

    /// Parse `html` and host it at `href`.
    pub fn from_html(html: &str, href: &str) -> Result<Self, VertError> {
        Self::new(crate::dom::parser::parse_html(html), href)
    }

    fn add_message_listener(&mut self) -> ListenerId {
        let id = ListenerId(self.message_listeners.len());
        self.message_listeners.push(id);
        id
    }

    pub fn message_listeners(&self) -> &[ListenerId] {
        &self.message_listeners
    }

    /// Register the broker's listener unless the page already has one.
    /// Returns the new id on the first call only.
    pub fn install_broker_listener(&mut self) -> Option<ListenerId> {
        if self.broker_listener.is_some() {
            return None;
        }
        let id = self.add_message_listener();
        self.broker_listener = Some(id);
        Some(id)
    }

    pub fn broker_listener(&self) -> Option<ListenerId> {
        self.broker_listener
    }

    /// Next placement sequence number, starting at 1.
    pub fn next_placement_seq(&mut self) -> u64 {
        self.placement_seq += 1;
        self.placement_seq
    }

    /// Record a fallback frame that may now address the broker.
    pub fn register_live_frame(&mut self, frame_id: &str) {
        if !self.live_frames.iter().any(|f| f == frame_id) {
            self.live_frames.push(frame_id.to_string());
        }
    }

    /// Frame ids of every active fallback on the page, in mount order.
    pub fn live_frames(&self) -> &[String] {
        &self.live_frames
    }
}
