//! Environment probe: read placement configuration from the declaring tag
//! and page-level flags from the hosting document.

use std::fmt;
use std::str::FromStr;

use crate::dom::DomNode;
use crate::error::VertError;
use crate::page::Page;

/// Marker attribute on a placement declaration.
pub const DECLARATION_ATTR: &str = "data-vert-unit";

pub const ATTR_CLIENT: &str = "data-ad-client";
pub const ATTR_SLOT: &str = "data-ad-slot";
pub const ATTR_TYPE: &str = "data-ad-type";
pub const ATTR_LAYOUT: &str = "data-ad-layout";
pub const ATTR_STYLE: &str = "data-ad-style";
pub const ATTR_SIZE: &str = "data-ad-size";
pub const ATTR_VERT_ID: &str = "data-vert-id";

pub const DEFAULT_VISUAL_STYLE: &str = "display:block";

/// Kind of ad unit a placement requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitType {
    Display,
    InArticle,
    InFeed,
    Multiplex,
    /// Skips the primary network and renders the fallback directly.
    Custom,
}

impl UnitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitType::Display => "display",
            UnitType::InArticle => "in-article",
            UnitType::InFeed => "in-feed",
            UnitType::Multiplex => "multiplex",
            UnitType::Custom => "custom",
        }
    }

    /// Whether this unit goes through the primary network first.
    pub fn uses_network(&self) -> bool {
        !matches!(self, UnitType::Custom)
    }
}

impl FromStr for UnitType {
    type Err = VertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "display" => Ok(UnitType::Display),
            "in-article" => Ok(UnitType::InArticle),
            "in-feed" => Ok(UnitType::InFeed),
            "multiplex" => Ok(UnitType::Multiplex),
            "custom" => Ok(UnitType::Custom),
            "" => Err(VertError::MissingUnitType),
            other => Err(VertError::InvalidUnitType(other.to_string())),
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable per-placement configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementConfig {
    pub network_client_id: Option<String>,
    pub slot_id: Option<String>,
    pub unit_type: UnitType,
    pub layout_hint: Option<String>,
    pub visual_style: String,
    pub size_hint: Option<String>,
    pub vert_id: Option<String>,
}

impl PlacementConfig {
    /// Config for a unit type with everything else unset.
    pub fn new(unit_type: UnitType) -> Self {
        Self {
            network_client_id: None,
            slot_id: None,
            unit_type,
            layout_hint: None,
            visual_style: DEFAULT_VISUAL_STYLE.to_string(),
            size_hint: None,
            vert_id: None,
        }
    }

    /// Read a config from the attributes of a declaring tag. A missing
    /// client id is fine; a missing or unknown unit type is not.
    pub fn from_node(node: &DomNode) -> Result<Self, VertError> {
        let unit_type = node
            .attr(ATTR_TYPE)
            .ok_or(VertError::MissingUnitType)?
            .parse::<UnitType>()?;

        let opt = |name: &str| {
            node.attr(name)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Ok(Self {
            network_client_id: opt(ATTR_CLIENT),
            slot_id: opt(ATTR_SLOT),
            unit_type,
            layout_hint: opt(ATTR_LAYOUT),
            visual_style: opt(ATTR_STYLE).unwrap_or_else(|| DEFAULT_VISUAL_STYLE.to_string()),
            size_hint: opt(ATTR_SIZE),
            vert_id: opt(ATTR_VERT_ID),
        })
    }
}

/// Page-level flags that affect every placement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// `?vert-debug`: point the fallback at the page's own origin.
    pub debug: bool,
    /// `?vert-loud`: log placement transitions at info level.
    pub loud: bool,
    /// `<html data-environment="development">`.
    pub development: bool,
    /// `<html data-brand-id="...">`.
    pub brand: Option<String>,
}

impl Environment {
    pub fn probe(page: &Page) -> Self {
        let root = page
            .document
            .document_element()
            .map(|html| page.document.node(html));
        let development = root
            .and_then(|n| n.attr("data-environment"))
            .map(|v| v.eq_ignore_ascii_case("development"))
            .unwrap_or(false);
        let brand = root
            .and_then(|n| n.attr("data-brand-id"))
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        Self {
            debug: page.location.query_flag("vert-debug"),
            loud: page.location.query_flag("vert-loud"),
            development,
            brand,
        }
    }

    /// Level for per-placement transition logs.
    pub fn log_level(&self) -> log::Level {
        if self.loud {
            log::Level::Info
        } else {
            log::Level::Debug
        }
    }
}
