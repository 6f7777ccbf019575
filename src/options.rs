//! Engine-wide settings.
//!
//! Defaults cover production; `from_env` lets deployments and the
//! simulator override them through `VERT_*` variables.

use url::Url;

pub const DEFAULT_SERVER_BASE: &str = "https://vert.itwcreativeworks.com";
pub const DEFAULT_NETWORK_SCRIPT: &str =
    "https://pagead2.googlesyndication.com/pagead/js/adsbygoogle.js";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_POLL_CEILING_MS: u64 = 10_000;

/// Tunables for [`crate::engine::VertEngine`].
#[derive(Debug, Clone)]
pub struct VertOptions {
    /// Production fallback ad-server base.
    pub server_base: Url,
    /// Primary network bootstrap script (client id is appended as a query).
    pub network_script: Url,
    /// Delay between fill-status polls.
    pub poll_interval_ms: u64,
    /// Hard ceiling on fill-status polling.
    pub poll_ceiling_ms: u64,
    /// Brands whose development builds talk to a locally served ad server.
    pub local_brands: Vec<String>,
    /// Plan ids whose viewers get placements hidden.
    pub hide_for_plans: Vec<String>,
}

impl Default for VertOptions {
    fn default() -> Self {
        Self {
            server_base: Url::parse(DEFAULT_SERVER_BASE).expect("static url"),
            network_script: Url::parse(DEFAULT_NETWORK_SCRIPT).expect("static url"),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            poll_ceiling_ms: DEFAULT_POLL_CEILING_MS,
            local_brands: vec!["itw-creative-works".to_string()],
            hide_for_plans: vec!["premium".to_string()],
        }
    }
}

impl VertOptions {
    /// Defaults overridden by any valid `VERT_*` environment variable.
    pub fn from_env() -> Self {
        Self::default().with_lookup(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup. Invalid values are
    /// logged and skipped.
    pub fn with_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("VERT_SERVER_BASE") {
            match Url::parse(&v) {
                Ok(url) if url.cannot_be_a_base() => {
                    log::warn!("VERT_SERVER_BASE ignored: {:?} cannot hold a path", v)
                }
                Ok(url) => self.server_base = url,
                Err(e) => log::warn!("VERT_SERVER_BASE ignored: {}", e),
            }
        }
        if let Some(v) = lookup("VERT_NETWORK_SCRIPT") {
            match Url::parse(&v) {
                Ok(url) => self.network_script = url,
                Err(e) => log::warn!("VERT_NETWORK_SCRIPT ignored: {}", e),
            }
        }
        if let Some(v) = lookup("VERT_POLL_INTERVAL_MS") {
            match v.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.poll_interval_ms = ms,
                _ => log::warn!("VERT_POLL_INTERVAL_MS ignored: {:?}", v),
            }
        }
        if let Some(v) = lookup("VERT_POLL_CEILING_MS") {
            match v.trim().parse::<u64>() {
                Ok(ms) => self.poll_ceiling_ms = ms,
                Err(_) => log::warn!("VERT_POLL_CEILING_MS ignored: {:?}", v),
            }
        }
        if let Some(v) = lookup("VERT_LOCAL_BRANDS") {
            self.local_brands = split_list(&v);
        }
        if let Some(v) = lookup("VERT_HIDE_PLANS") {
            self.hide_for_plans = split_list(&v);
        }
        self
    }

    pub fn with_poll(mut self, interval_ms: u64, ceiling_ms: u64) -> Self {
        self.poll_interval_ms = interval_ms.max(1);
        self.poll_ceiling_ms = ceiling_ms;
        self
    }

    pub fn with_local_brands(mut self, brands: Vec<String>) -> Self {
        self.local_brands = brands;
        self
    }
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
