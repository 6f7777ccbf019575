//! Primary network loader.
//!
//! Injects the network's bootstrap script at most once per page, then
//! queues render requests onto the network's global ad queue.

use url::Url;

use crate::error::VertError;
use crate::page::{AdRequest, Page};

/// What the external "load script" utility is asked to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRequest {
    pub src: String,
    pub async_load: bool,
    pub crossorigin: Option<String>,
}

/// External script-loading collaborator.
pub trait ScriptLoader {
    /// Load `request`, resolving once the script has executed.
    fn load(&mut self, request: &ScriptRequest) -> Result<(), VertError>;
}

/// Loader with a fixed outcome that records every request.
#[derive(Debug, Default)]
pub struct StaticScriptLoader {
    fail_with: Option<String>,
    pub requests: Vec<ScriptRequest>,
}

impl StaticScriptLoader {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail_with: Some(reason.into()),
            requests: Vec::new(),
        }
    }
}

impl ScriptLoader for StaticScriptLoader {
    fn load(&mut self, request: &ScriptRequest) -> Result<(), VertError> {
        self.requests.push(request.clone());
        match &self.fail_with {
            Some(reason) => Err(VertError::ScriptLoad {
                src: request.src.clone(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// How a [`NetworkLoader::load`] call was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The script tag was inserted and loaded by this call.
    Injected,
    /// The network's ad queue already existed.
    AlreadyLoaded,
}

/// Page-scoped loader for the primary network bootstrap.
#[derive(Debug)]
pub struct NetworkLoader {
    script: Url,
    failure: Option<VertError>,
}

impl NetworkLoader {
    pub fn new(script: Url) -> Self {
        Self {
            script,
            failure: None,
        }
    }

    /// Bootstrap URL for a client id.
    pub fn script_src(&self, client_id: Option<&str>) -> String {
        let mut url = self.script.clone();
        if let Some(client) = client_id {
            url.query_pairs_mut().append_pair("client", client);
        }
        url.to_string()
    }

    /// Make sure the bootstrap is loaded. Resolves immediately when the ad
    /// queue already exists; a failed load is remembered for the rest of
    /// the page so later placements fall back without another tag.
    pub fn load(
        &mut self,
        page: &mut Page,
        client_id: Option<&str>,
        loader: &mut dyn ScriptLoader,
    ) -> Result<LoadOutcome, VertError> {
        if page.globals.ad_queue.is_some() {
            return Ok(LoadOutcome::AlreadyLoaded);
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        let request = ScriptRequest {
            src: self.script_src(client_id),
            async_load: true,
            crossorigin: Some("anonymous".to_string()),
        };
        insert_script_tag(page, &request);
        log::debug!("network loader: injecting {}", request.src);

        match loader.load(&request) {
            Ok(()) => {
                page.globals.ad_queue = Some(Vec::new());
                Ok(LoadOutcome::Injected)
            }
            Err(err) => {
                log::warn!("network loader: {}", err);
                self.failure = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Ask the network to render into the placement `placement_id`.
    pub fn request_ad(page: &mut Page, placement_id: &str) {
        page.globals
            .ad_queue
            .get_or_insert_with(Vec::new)
            .push(AdRequest {
                placement_id: placement_id.to_string(),
            });
    }
}

fn insert_script_tag(page: &mut Page, request: &ScriptRequest) {
    let doc = &mut page.document;
    let Some(parent) = doc.head().or_else(|| doc.body()).or_else(|| doc.document_element()) else {
        return;
    };
    let tag = doc.create_element("script");
    doc.set_attribute(tag, "src", request.src.as_str());
    if request.async_load {
        doc.set_attribute(tag, "async", "");
    }
    if let Some(mode) = &request.crossorigin {
        doc.set_attribute(tag, "crossorigin", mode.as_str());
    }
    doc.append_child(parent, tag);
}
