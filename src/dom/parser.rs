use crate::dom::{Document, NodeId};
use scraper::{ElementRef, Html, Node};

/// Tags whose text children are dropped. `script` elements themselves are
/// kept because they carry placement declarations.
const SKIP_CHILDREN: &[&str] = &["script", "style", "noscript", "svg"];

/// Parse a raw HTML string into an arena [`Document`].
pub fn parse_html(html: &str) -> Document {
    let parsed = Html::parse_document(html);
    let mut doc = Document::new();
    let root = doc.root();
    convert_element(&mut doc, root, parsed.root_element());
    doc
}

fn convert_element(doc: &mut Document, parent: NodeId, el: ElementRef<'_>) {
    let tag = el.value().name.local.as_ref().to_string();
    let node = doc.create_element(&tag);
    for (k, v) in el.value().attrs() {
        doc.set_attribute(node, k, v);
    }
    doc.append_child(parent, node);

    if SKIP_CHILDREN.contains(&tag.as_str()) {
        return;
    }

    for child_ref in el.children() {
        match child_ref.value() {
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child_ref) {
                    convert_element(doc, node, child_el);
                }
            }
            Node::Text(t) => {
                let s = t.text.to_string();
                if !s.trim().is_empty() {
                    let text = doc.create_text(s);
                    doc.append_child(node, text);
                }
            }
            _ => {}
        }
    }
}
