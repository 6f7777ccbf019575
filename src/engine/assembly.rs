//! Placement assembly: the container inserted next to a declaration and
//! the primary network's slot element inside it.

use crate::dom::css::InlineStyle;
use crate::dom::{Document, NodeId};
use crate::engine::entitlement::HIDE_PLANS_ATTR;
use crate::engine::probe::{PlacementConfig, UnitType};

pub const CONTAINER_CLASS: &str = "uj-vert-unit";
pub const PLACEMENT_ID_PREFIX: &str = "uj-vert-unit-";

/// Insert an empty placement container right after `declaration`.
pub fn insert_container(
    doc: &mut Document,
    declaration: NodeId,
    id: &str,
    unit_type: UnitType,
    hide_for_plans: &[String],
) -> NodeId {
    let container = doc.create_element("div");
    doc.set_attribute(container, "id", id);
    doc.set_attribute(container, "class", CONTAINER_CLASS);
    doc.set_attribute(container, "data-vert-unit-type", unit_type.as_str());
    if !hide_for_plans.is_empty() {
        doc.set_attribute(container, HIDE_PLANS_ATTR, hide_for_plans.join(","));
    }
    doc.insert_after(declaration, container);
    container
}

/// Build the network's `<ins class="adsbygoogle">` slot inside `container`.
pub fn insert_network_slot(doc: &mut Document, container: NodeId, config: &PlacementConfig) -> NodeId {
    let ins = doc.create_element("ins");
    doc.set_attribute(ins, "class", "adsbygoogle");

    let mut style = InlineStyle::parse(&config.visual_style);
    if style.get("display").is_none() {
        style.set("display", "block");
    }

    if let Some(client) = &config.network_client_id {
        doc.set_attribute(ins, "data-ad-client", client.as_str());
    }
    if let Some(slot) = &config.slot_id {
        doc.set_attribute(ins, "data-ad-slot", slot.as_str());
    }

    match config.unit_type {
        UnitType::Display => {
            doc.set_attribute(ins, "data-ad-format", "auto");
            doc.set_attribute(ins, "data-full-width-responsive", "true");
        }
        UnitType::InArticle => {
            doc.set_attribute(ins, "data-ad-layout", "in-article");
            doc.set_attribute(ins, "data-ad-format", "fluid");
            style.set("text-align", "center");
        }
        UnitType::InFeed => {
            doc.set_attribute(ins, "data-ad-format", "fluid");
            if let Some(layout) = &config.layout_hint {
                doc.set_attribute(ins, "data-ad-layout-key", layout.as_str());
            }
        }
        UnitType::Multiplex => {
            doc.set_attribute(ins, "data-ad-format", "autorelaxed");
        }
        UnitType::Custom => {}
    }

    doc.set_attribute(ins, "style", style.to_string());
    doc.append_child(container, ins);
    ins
}
