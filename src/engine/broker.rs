//! Cross-frame message broker.
//!
//! One page-wide `message` listener. Its registration and the set of frames
//! it may resize live on the [`Page`], so every initializer on the page
//! shares them. Inbound payloads are parsed into a tagged [`Command`] at the
//! boundary; anything that does not match is dropped without error.

use serde::Deserialize;
use serde_json::Value;

use crate::dom::css::format_px;
use crate::error::FrameAccessError;
use crate::page::Page;

pub const CMD_SET_DIMENSIONS: &str = "uj-vert-unit:set-dimensions";
pub const CMD_CLICK: &str = "uj-vert-unit:click";

/// The window that posted a message, as far as the page can inspect it.
pub trait FrameSource {
    /// The posting frame's `name`. Cross-origin sources may refuse.
    fn name(&self) -> Result<String, FrameAccessError>;
}

/// Source whose name is readable.
#[derive(Debug, Clone)]
pub struct NamedFrame(pub String);

impl FrameSource for NamedFrame {
    fn name(&self) -> Result<String, FrameAccessError> {
        Ok(self.0.clone())
    }
}

/// Source that throws on any property access.
#[derive(Debug, Clone, Default)]
pub struct OpaqueFrame;

impl FrameSource for OpaqueFrame {
    fn name(&self) -> Result<String, FrameAccessError> {
        Err(FrameAccessError("blocked a frame from accessing a cross-origin frame".into()))
    }
}

/// A `message` event delivered to the page.
pub struct InboundMessage {
    pub data: Value,
    pub source: Option<Box<dyn FrameSource>>,
}

impl InboundMessage {
    pub fn new(data: Value) -> Self {
        Self { data, source: None }
    }

    pub fn from_frame(data: Value, source: impl FrameSource + 'static) -> Self {
        Self {
            data,
            source: Some(Box::new(source)),
        }
    }
}

/// Wire shape, every field optional.
#[derive(Debug, Default, Deserialize)]
pub struct WireMessage {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub payload: WirePayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct WirePayload {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub height: Option<Value>,
    #[serde(default)]
    pub url: Option<Value>,
}

/// Recognized commands.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetDimensions { id: String, height: f64 },
    Click { id: Option<String>, url: String },
}

/// Why a message was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    Malformed,
    UnknownCommand,
    UnknownTarget,
}

/// What the broker did with one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Resized { id: String, height: f64 },
    Navigated { url: String },
    Ignored(Ignored),
}

/// Decode the event data. Strings are treated as serialized JSON.
fn decode(data: &Value) -> Option<WireMessage> {
    match data {
        Value::Object(_) => serde_json::from_value(data.clone()).ok(),
        Value::String(s) => serde_json::from_str(s).ok(),
        _ => None,
    }
}

fn as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_height(v: &Value) -> Option<f64> {
    let h = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => crate::dom::css::parse_css_px(s)?,
        _ => return None,
    };
    (h.is_finite() && h >= 0.0).then_some(h)
}

/// Parse an inbound message into a [`Command`]. `source` supplies the
/// sender's identity when the payload has no `id`.
pub fn parse(message: &InboundMessage) -> Result<Command, Ignored> {
    let wire = decode(&message.data).ok_or(Ignored::Malformed)?;
    let command = wire.command.as_deref().ok_or(Ignored::Malformed)?;

    let mut id = wire.payload.id.as_ref().and_then(as_string);
    if let Some(source) = &message.source {
        match source.name() {
            Ok(name) if id.is_none() && !name.is_empty() => id = Some(name),
            Ok(_) => {}
            Err(e) => log::warn!("broker: {}", e),
        }
    }

    match command {
        CMD_SET_DIMENSIONS => {
            let id = id.ok_or(Ignored::Malformed)?;
            let height = wire
                .payload
                .height
                .as_ref()
                .and_then(as_height)
                .ok_or(Ignored::Malformed)?;
            Ok(Command::SetDimensions { id, height })
        }
        CMD_CLICK => {
            let url = wire
                .payload
                .url
                .as_ref()
                .and_then(as_string)
                .ok_or(Ignored::Malformed)?;
            Ok(Command::Click { id, url })
        }
        _ => Err(Ignored::UnknownCommand),
    }
}

/// Register the page-wide listener unless the page already has one.
/// Returns whether this call installed it.
pub fn install(page: &mut Page) -> bool {
    match page.install_broker_listener() {
        Some(_) => {
            log::debug!("broker: message listener installed");
            true
        }
        None => false,
    }
}

/// Handle one message event. Only frames the page registered as live
/// fallbacks can be resized. Never fails.
pub fn dispatch(page: &mut Page, message: &InboundMessage) -> Dispatch {
    let command = match parse(message) {
        Ok(c) => c,
        Err(reason) => {
            log::trace!("broker: dropped message ({:?})", reason);
            return Dispatch::Ignored(reason);
        }
    };

    match command {
        Command::SetDimensions { id, height } => {
            if !page.live_frames().iter().any(|f| *f == id) {
                return Dispatch::Ignored(Ignored::UnknownTarget);
            }
            let Some(frame) = page.document.get_element_by_id(&id) else {
                return Dispatch::Ignored(Ignored::UnknownTarget);
            };
            page.document.set_style_property(frame, "height", &format_px(height));
            log::debug!("broker: {} resized to {}px", id, height);
            Dispatch::Resized { id, height }
        }
        Command::Click { id, url } => {
            log::debug!("broker: click from {:?} -> {}", id, url);
            page.location.assign(&url);
            Dispatch::Navigated { url }
        }
    }
}
