//! Fallback renderer: a sandboxed iframe pointing at the internal ad server.

use url::Url;

use crate::dom::{Document, NodeId};
use crate::engine::probe::{Environment, PlacementConfig};
use crate::error::VertError;
use crate::options::VertOptions;
use crate::page::Location;

/// Permissions granted to the fallback frame, and nothing else.
pub const SANDBOX_POLICY: &str = "allow-forms allow-popups allow-popups-to-escape-sandbox \
allow-same-origin allow-scripts allow-top-navigation-by-user-activation";

pub const FRAME_ID_PREFIX: &str = "vert-";

/// Page-lifetime source of frame ids. Starts at 1, only ever increments.
#[derive(Debug, Default)]
pub struct FrameIdCounter {
    last: u64,
}

impl FrameIdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id `next_id` will return, without consuming it.
    pub fn peek_id(&self) -> String {
        format!("{}{}", FRAME_ID_PREFIX, self.last + 1)
    }

    pub fn next_id(&mut self) -> String {
        let id = self.peek_id();
        self.last += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.last
    }
}

/// Pick the ad-server base: the page's own origin under the debug flag or
/// in development for a local brand, production otherwise. A page with an
/// opaque origin always gets production.
pub fn server_base(options: &VertOptions, env: &Environment, location: &Location) -> Url {
    let local_brand = env
        .brand
        .as_deref()
        .map(|b| options.local_brands.iter().any(|l| l == b))
        .unwrap_or(false);
    if !(env.debug || (env.development && local_brand)) {
        return options.server_base.clone();
    }
    let origin = location.origin();
    match Url::parse(&origin) {
        Ok(url) => url,
        Err(e) => {
            log::warn!("fallback: page origin {:?} unusable ({}), using production", origin, e);
            options.server_base.clone()
        }
    }
}

/// `{base}/verts/main?parentURL=..&frameId=..[&size=..][&loadVertId=..]`
pub fn frame_url(
    base: &Url,
    parent_url: &str,
    frame_id: &str,
    config: &PlacementConfig,
) -> Result<Url, VertError> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|_| VertError::InvalidUrl {
            url: base.to_string(),
            reason: "cannot be a base".to_string(),
        })?
        .pop_if_empty()
        .extend(["verts", "main"]);

    {
        let mut q = url.query_pairs_mut();
        q.append_pair("parentURL", parent_url);
        q.append_pair("frameId", frame_id);
        if let Some(size) = &config.size_hint {
            q.append_pair("size", size);
        }
        if let Some(vert) = &config.vert_id {
            q.append_pair("loadVertId", vert);
        }
    }
    Ok(url)
}

/// Replace everything inside `container` with the sandboxed frame.
/// `name` mirrors `id` so the broker can identify the sender even when
/// the message source can't be inspected.
pub fn mount_frame(doc: &mut Document, container: NodeId, frame_id: &str, src: &Url) -> NodeId {
    let frame = doc.create_element("iframe");
    doc.set_attribute(frame, "id", frame_id);
    doc.set_attribute(frame, "name", frame_id);
    doc.set_attribute(frame, "src", src.as_str());
    doc.set_attribute(frame, "sandbox", SANDBOX_POLICY);
    doc.set_attribute(frame, "scrolling", "no");
    doc.set_attribute(frame, "frameborder", "0");
    doc.set_attribute(frame, "style", "width: 100%; border: 0;");
    doc.replace_children(container, frame);
    frame
}
