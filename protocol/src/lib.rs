//! Stroke protocol shared by the drawboard server, browser canvas and CLI.
//!
//! This crate owns the wire representation of every realtime message. All
//! messages travel as JSON text frames. Payload shapes are decoded exactly once
//! at the receive boundary into typed enums; handlers never re-inspect raw
//! JSON.
//!
//! DESIGN
//! ======
//! - `DrawingData` is a two-variant sum type: a stroke segment or a clear.
//! - Whiteboard ids arrive as strings or integers and are carried as strings.
//! - Decoding is strict about shape and lenient about extras: unknown fields
//!   are ignored, missing required fields are a [`CodecError`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

// =============================================================================
// FIELD CONSTANTS
// =============================================================================

/// Channel name carried by subscription requests.
pub const CHANNEL_NAME: &str = "DrawingChannel";

/// Color used to render a remote segment that carries no color.
pub const DEFAULT_STROKE_COLOR: &str = "#000000";

const FIELD_CHANNEL: &str = "channel";
const FIELD_COMMAND: &str = "command";
const FIELD_WHITEBOARD_ID: &str = "whiteboardId";
const FIELD_DRAWING_DATA: &str = "drawingData";
const FIELD_TYPE: &str = "type";
const FIELD_ACTION: &str = "action";
const FIELD_CODE: &str = "code";
const FIELD_MESSAGE: &str = "message";

const COMMAND_SUBSCRIBE: &str = "subscribe";
const COMMAND_UNSUBSCRIBE: &str = "unsubscribe";
const ACTION_CLEAR: &str = "clear";
const TYPE_CONFIRM: &str = "confirm_subscription";
const TYPE_REJECT: &str = "reject_subscription";

// =============================================================================
// ERRORS
// =============================================================================

/// Error returned when a message does not match any known shape.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text is not valid JSON.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    /// The message is JSON but not an object.
    #[error("message must be a JSON object")]
    NotAnObject,
    /// A required field is absent or empty.
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    /// A whiteboard id is neither a string nor an integer.
    #[error("invalid whiteboard id: {0}")]
    InvalidWhiteboardId(Value),
    /// A subscription request names a channel this server does not serve.
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
    /// A subscription command other than subscribe/unsubscribe.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    /// `drawingData` is neither a segment nor a clear action.
    #[error("unrecognized drawing payload")]
    UnrecognizedPayload,
    /// The object matches no known message kind.
    #[error("unrecognized message shape")]
    UnrecognizedMessage,
}

/// Grepable error code and retryable flag for structured rejections.
pub trait ErrorCode: fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// WHITEBOARD ID
// =============================================================================

/// Opaque whiteboard identifier; the partition key for all realtime traffic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WhiteboardId(String);

impl WhiteboardId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read an optional id from a JSON field.
    ///
    /// `null`, absent and blank strings all mean "no id".
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidWhiteboardId`] for values that are neither
    /// strings nor integers.
    pub fn from_field(value: Option<&Value>) -> Result<Option<Self>, CodecError> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(Self(s.trim().to_owned()))),
            Some(Value::Number(n)) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Ok(Some(Self(i.to_string()))),
                (None, Some(u)) => Ok(Some(Self(u.to_string()))),
                _ => Err(CodecError::InvalidWhiteboardId(Value::Number(n.clone()))),
            },
            Some(other) => Err(CodecError::InvalidWhiteboardId(other.clone())),
        }
    }

    fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }
}

impl fmt::Display for WhiteboardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WhiteboardId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<i64> for WhiteboardId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for WhiteboardId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for WhiteboardId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match Self::from_field(Some(&value)) {
            Ok(Some(id)) => Ok(id),
            Ok(None) => Err(serde::de::Error::custom("whiteboard id must not be empty")),
            Err(e) => Err(serde::de::Error::custom(e)),
        }
    }
}

// =============================================================================
// DRAWING PAYLOADS
// =============================================================================

/// One straight line segment of a freehand stroke, in canvas bitmap pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeSegment {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    /// RGB hex string. Absent on the wire means "use the default color".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl StrokeSegment {
    #[must_use]
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64, color: impl Into<String>) -> Self {
        Self { x1, y1, x2, y2, color: Some(color.into()) }
    }

    /// Color to render with, falling back to [`DEFAULT_STROKE_COLOR`].
    #[must_use]
    pub fn color_or_default(&self) -> &str {
        self.color.as_deref().unwrap_or(DEFAULT_STROKE_COLOR)
    }
}

/// Drawing payload carried under `drawingData`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum DrawingData {
    /// A line segment to render.
    Segment(StrokeSegment),
    /// Erase the whole canvas.
    Clear,
}

impl DrawingData {
    #[must_use]
    pub fn is_clear(&self) -> bool {
        matches!(self, Self::Clear)
    }
}

impl TryFrom<Value> for DrawingData {
    type Error = CodecError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(obj) = value else {
            return Err(CodecError::UnrecognizedPayload);
        };

        if let Some(action) = obj.get(FIELD_ACTION) {
            return match action.as_str() {
                Some(ACTION_CLEAR) => Ok(Self::Clear),
                _ => Err(CodecError::UnrecognizedPayload),
            };
        }

        let coord = |key: &str| obj.get(key).and_then(Value::as_f64);
        let (Some(x1), Some(y1), Some(x2), Some(y2)) = (coord("x1"), coord("y1"), coord("x2"), coord("y2")) else {
            return Err(CodecError::UnrecognizedPayload);
        };
        let color = obj
            .get("color")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(str::to_owned);

        Ok(Self::Segment(StrokeSegment { x1, y1, x2, y2, color }))
    }
}

impl From<DrawingData> for Value {
    fn from(data: DrawingData) -> Self {
        match data {
            DrawingData::Clear => json!({ FIELD_ACTION: ACTION_CLEAR }),
            DrawingData::Segment(seg) => {
                let mut obj = Map::new();
                obj.insert("x1".into(), json!(seg.x1));
                obj.insert("y1".into(), json!(seg.y1));
                obj.insert("x2".into(), json!(seg.x2));
                obj.insert("y2".into(), json!(seg.y2));
                if let Some(color) = seg.color {
                    obj.insert("color".into(), Value::String(color));
                }
                Value::Object(obj)
            }
        }
    }
}

impl From<StrokeSegment> for DrawingData {
    fn from(segment: StrokeSegment) -> Self {
        Self::Segment(segment)
    }
}

// =============================================================================
// CLIENT → SERVER
// =============================================================================

/// A message sent by a client to the broadcast channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Join a whiteboard partition. `None` resolves to the default whiteboard.
    Subscribe { whiteboard_id: Option<WhiteboardId> },
    /// Leave the current partition without closing the connection.
    Unsubscribe,
    /// Fan a drawing payload out to the other members of a partition.
    Publish { whiteboard_id: WhiteboardId, drawing_data: DrawingData },
}

impl ClientMessage {
    /// Decode one inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] describing why the frame matches no known
    /// message shape. Callers drop such frames.
    pub fn decode(text: &str) -> Result<Self, CodecError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(obj) = value else {
            return Err(CodecError::NotAnObject);
        };

        if let Some(channel) = obj.get(FIELD_CHANNEL) {
            let channel = channel.as_str().unwrap_or_default();
            if channel != CHANNEL_NAME {
                return Err(CodecError::UnknownChannel(channel.to_owned()));
            }
            let command = obj
                .get(FIELD_COMMAND)
                .and_then(Value::as_str)
                .unwrap_or(COMMAND_SUBSCRIBE);
            return match command {
                COMMAND_SUBSCRIBE => Ok(Self::Subscribe {
                    whiteboard_id: WhiteboardId::from_field(obj.get(FIELD_WHITEBOARD_ID))?,
                }),
                COMMAND_UNSUBSCRIBE => Ok(Self::Unsubscribe),
                other => Err(CodecError::UnknownCommand(other.to_owned())),
            };
        }

        if let Some(data) = obj.get(FIELD_DRAWING_DATA) {
            let whiteboard_id = WhiteboardId::from_field(obj.get(FIELD_WHITEBOARD_ID))?
                .ok_or(CodecError::MissingField(FIELD_WHITEBOARD_ID))?;
            let drawing_data = DrawingData::try_from(data.clone())?;
            return Ok(Self::Publish { whiteboard_id, drawing_data });
        }

        Err(CodecError::UnrecognizedMessage)
    }

    /// Encode as a JSON text frame.
    #[must_use]
    pub fn encode(&self) -> String {
        let value = match self {
            Self::Subscribe { whiteboard_id } => json!({
                FIELD_CHANNEL: CHANNEL_NAME,
                FIELD_WHITEBOARD_ID: whiteboard_id.as_ref().map_or(Value::String(String::new()), WhiteboardId::to_value),
            }),
            Self::Unsubscribe => json!({
                FIELD_CHANNEL: CHANNEL_NAME,
                FIELD_COMMAND: COMMAND_UNSUBSCRIBE,
            }),
            Self::Publish { whiteboard_id, drawing_data } => json!({
                FIELD_WHITEBOARD_ID: whiteboard_id.to_value(),
                FIELD_DRAWING_DATA: Value::from(drawing_data.clone()),
            }),
        };
        value.to_string()
    }
}

// =============================================================================
// SERVER → CLIENT
// =============================================================================

/// A message sent by the broadcast channel to a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// The join succeeded; carries the resolved partition id.
    Confirmed { whiteboard_id: WhiteboardId },
    /// The join was refused. `code` is a stable grepable error code.
    Rejected { whiteboard_id: Option<WhiteboardId>, code: String, message: String },
    /// A drawing payload published by another member of the partition.
    Broadcast(DrawingData),
}

impl ServerMessage {
    /// Build a rejection from a typed error.
    #[must_use]
    pub fn rejection(whiteboard_id: Option<WhiteboardId>, err: &(impl ErrorCode + ?Sized)) -> Self {
        Self::Rejected { whiteboard_id, code: err.error_code().to_owned(), message: err.to_string() }
    }

    /// Decode one inbound text frame on the client side.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] when the frame matches no known shape.
    pub fn decode(text: &str) -> Result<Self, CodecError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(obj) = value else {
            return Err(CodecError::NotAnObject);
        };

        match obj.get(FIELD_TYPE).and_then(Value::as_str) {
            Some(TYPE_CONFIRM) => {
                let whiteboard_id = WhiteboardId::from_field(obj.get(FIELD_WHITEBOARD_ID))?
                    .ok_or(CodecError::MissingField(FIELD_WHITEBOARD_ID))?;
                Ok(Self::Confirmed { whiteboard_id })
            }
            Some(TYPE_REJECT) => {
                let text_field = |key: &str| {
                    obj.get(key)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_owned()
                };
                Ok(Self::Rejected {
                    whiteboard_id: WhiteboardId::from_field(obj.get(FIELD_WHITEBOARD_ID))?,
                    code: text_field(FIELD_CODE),
                    message: text_field(FIELD_MESSAGE),
                })
            }
            Some(_) => Err(CodecError::UnrecognizedMessage),
            None => {
                let data = obj
                    .get(FIELD_DRAWING_DATA)
                    .ok_or(CodecError::MissingField(FIELD_DRAWING_DATA))?;
                Ok(Self::Broadcast(DrawingData::try_from(data.clone())?))
            }
        }
    }

    /// Encode as a JSON text frame.
    #[must_use]
    pub fn encode(&self) -> String {
        let value = match self {
            Self::Confirmed { whiteboard_id } => json!({
                FIELD_TYPE: TYPE_CONFIRM,
                FIELD_WHITEBOARD_ID: whiteboard_id.to_value(),
            }),
            Self::Rejected { whiteboard_id, code, message } => json!({
                FIELD_TYPE: TYPE_REJECT,
                FIELD_WHITEBOARD_ID: whiteboard_id.as_ref().map_or(Value::Null, WhiteboardId::to_value),
                FIELD_CODE: code,
                FIELD_MESSAGE: message,
            }),
            Self::Broadcast(data) => json!({
                FIELD_DRAWING_DATA: Value::from(data.clone()),
            }),
        };
        value.to_string()
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
