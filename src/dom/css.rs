//! Inline `style=""` attribute handling.
//!
//! Keeps declarations in source order so that rewriting one property leaves
//! the rest of the attribute as the page author wrote it.

use std::fmt;

/// Ordered list of inline declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    decls: Vec<(String, String)>,
}

impl InlineStyle {
    /// Parse an inline `style="..."` attribute value.
    pub fn parse(style: &str) -> Self {
        let mut out = Self::default();
        for decl in style.split(';') {
            let parts: Vec<&str> = decl.splitn(2, ':').collect();
            if parts.len() != 2 {
                continue;
            }
            let prop = parts[0].trim().to_lowercase();
            let val = parts[1].trim();
            if prop.is_empty() {
                continue;
            }
            out.set(&prop, val);
        }
        out
    }

    pub fn get(&self, prop: &str) -> Option<&str> {
        self.decls
            .iter()
            .find(|(p, _)| p == prop)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, prop: &str, value: &str) {
        match self.decls.iter_mut().find(|(p, _)| p == prop) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.decls.push((prop.to_string(), value.to_string())),
        }
    }

    pub fn remove(&mut self, prop: &str) -> bool {
        let before = self.decls.len();
        self.decls.retain(|(p, _)| p != prop);
        self.decls.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}

impl fmt::Display for InlineStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (prop, val)) in self.decls.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}: {};", prop, val)?;
        }
        Ok(())
    }
}

/// Parse a CSS pixel length (`"250px"` or a bare number).
pub fn parse_css_px(val: &str) -> Option<f64> {
    let v = val.trim().to_lowercase();
    v.trim_end_matches("px").trim().parse::<f64>().ok()
}

/// Format a height for an inline style, dropping a zero fraction.
pub fn format_px(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}px", value as i64)
    } else {
        format!("{}px", value)
    }
}
