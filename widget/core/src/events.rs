//! Stream Events
//!
//! Typed events decoded from the backend's `data: <json>` frames. The wire
//! format is owned by the backend; this module only consumes it.
//!
//! # Wire Shapes
//!
//! ```text
//! {"type":"content","full_content":"..."}            (or "text")
//! {"type":"reasoning","step":{"title":"..","thought":".."}}  (or "reasoning")
//! {"type":"crawling"}
//! {"type":"completion","final_content":"..","sources":[{"url":".."}]}
//! {"type":"error","message":".."}
//! ```
//!
//! Unknown fields are ignored so the backend can grow its schema without
//! breaking older widgets. Unknown `type` tags are rejected and the reader
//! skips them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A source link attached to a completed answer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Link target
    pub url: String,
}

impl Source {
    /// Create a source from a URL
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// One discrete unit of "thinking" to reveal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningStep {
    /// Short step heading
    pub title: String,
    /// Step text (may be empty)
    pub body: String,
}

impl ReasoningStep {
    /// Create a reasoning step
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Text revealed word by word for this step
    #[must_use]
    pub fn reveal_text(&self) -> String {
        if self.body.is_empty() {
            self.title.clone()
        } else {
            format!("{}: {}", self.title, self.body)
        }
    }
}

/// An event received from the response stream
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamEvent {
    /// Snapshot of the answer so far (not a delta)
    Content {
        /// Full answer text so far
        text: String,
        /// Whether the backend marked this snapshot final
        is_final: bool,
    },
    /// A reasoning step to reveal
    Reasoning(ReasoningStep),
    /// The backend is crawling/analyzing; no payload
    Crawling,
    /// Terminal success
    Completion {
        /// Final answer; empty means "keep the last content snapshot"
        final_text: String,
        /// Sources backing the answer, in order
        sources: Vec<Source>,
    },
    /// Terminal failure reported by the backend
    Error {
        /// Backend detail (logged, never shown to the user)
        message: String,
    },
}

impl StreamEvent {
    /// Decode one JSON payload (the part after `data:`)
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] for malformed JSON, unknown event types, or
    /// events missing their required payload.
    pub fn decode(json: &str) -> Result<Self, DecodeError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let tag = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or(DecodeError::MissingField("type"))?;
        if !KNOWN_TYPES.contains(&tag) {
            return Err(DecodeError::UnknownType(tag.to_string()));
        }

        let wire: WireEvent = serde_json::from_value(value)?;
        wire.try_into()
    }

    /// Whether this event ends the turn
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completion { .. } | Self::Error { .. })
    }

    /// Short name for logging
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Content { .. } => "content",
            Self::Reasoning(_) => "reasoning",
            Self::Crawling => "crawling",
            Self::Completion { .. } => "completion",
            Self::Error { .. } => "error",
        }
    }
}

/// Errors decoding a single event line
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload was not valid JSON for its event type
    #[error("malformed event JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// `type` tag not one of the five known kinds
    #[error("unknown event type: {0}")]
    UnknownType(String),

    /// A required field was absent
    #[error("event missing field `{0}`")]
    MissingField(&'static str),
}

const KNOWN_TYPES: [&str; 5] = ["content", "reasoning", "crawling", "completion", "error"];

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireEvent {
    Content {
        #[serde(default)]
        full_content: Option<String>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        is_final: bool,
    },
    Reasoning {
        #[serde(default)]
        step: Option<WireStep>,
    },
    Crawling {},
    Completion {
        #[serde(default)]
        final_content: Option<String>,
        #[serde(default)]
        sources: Option<Vec<Source>>,
    },
    Error {
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Deserialize)]
struct WireStep {
    #[serde(default)]
    title: String,
    #[serde(default)]
    thought: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Empty strings count as absent, the same way the widget's `a || b` did
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

impl TryFrom<WireEvent> for StreamEvent {
    type Error = DecodeError;

    fn try_from(wire: WireEvent) -> Result<Self, DecodeError> {
        Ok(match wire {
            WireEvent::Content {
                full_content,
                text,
                is_final,
            } => {
                let text = non_empty(full_content)
                    .or(text)
                    .ok_or(DecodeError::MissingField("full_content"))?;
                StreamEvent::Content { text, is_final }
            }
            WireEvent::Reasoning { step } => {
                let step = step.ok_or(DecodeError::MissingField("step"))?;
                let body = non_empty(step.thought)
                    .or_else(|| non_empty(step.reasoning))
                    .unwrap_or_default();
                StreamEvent::Reasoning(ReasoningStep {
                    title: step.title,
                    body,
                })
            }
            WireEvent::Crawling {} => StreamEvent::Crawling,
            WireEvent::Completion {
                final_content,
                sources,
            } => StreamEvent::Completion {
                final_text: final_content.unwrap_or_default(),
                sources: sources.unwrap_or_default(),
            },
            WireEvent::Error { message } => StreamEvent::Error {
                message: message.unwrap_or_default(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_content_prefers_full_content() {
        let event =
            StreamEvent::decode(r#"{"type":"content","full_content":"Hello","text":"He"}"#)
                .unwrap();
        assert_eq!(
            event,
            StreamEvent::Content {
                text: "Hello".to_string(),
                is_final: false
            }
        );

        let event = StreamEvent::decode(r#"{"type":"content","text":"Hi","is_final":true}"#)
            .unwrap();
        assert_eq!(
            event,
            StreamEvent::Content {
                text: "Hi".to_string(),
                is_final: true
            }
        );
    }

    #[test]
    fn test_decode_content_without_text_is_rejected() {
        let err = StreamEvent::decode(r#"{"type":"content"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("full_content")));
    }

    #[test]
    fn test_decode_reasoning_body_fallbacks() {
        let thought = StreamEvent::decode(
            r#"{"type":"reasoning","step":{"title":"Step 1","thought":"checking docs"}}"#,
        )
        .unwrap();
        assert_eq!(
            thought,
            StreamEvent::Reasoning(ReasoningStep::new("Step 1", "checking docs"))
        );

        let reasoning = StreamEvent::decode(
            r#"{"type":"reasoning","step":{"title":"Step 2","reasoning":"comparing"}}"#,
        )
        .unwrap();
        assert_eq!(
            reasoning,
            StreamEvent::Reasoning(ReasoningStep::new("Step 2", "comparing"))
        );

        let bare = StreamEvent::decode(r#"{"type":"reasoning","step":{"title":"Only"}}"#).unwrap();
        assert_eq!(bare, StreamEvent::Reasoning(ReasoningStep::new("Only", "")));
    }

    #[test]
    fn test_decode_reasoning_without_step_is_rejected() {
        let err = StreamEvent::decode(r#"{"type":"reasoning"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("step")));
    }

    #[test]
    fn test_decode_completion_with_sources() {
        let event = StreamEvent::decode(
            r#"{"type":"completion","final_content":"The answer is 42.","sources":[{"url":"https://x.test"}]}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            StreamEvent::Completion {
                final_text: "The answer is 42.".to_string(),
                sources: vec![Source::new("https://x.test")],
            }
        );
        assert!(event.is_terminal());
    }

    #[test]
    fn test_decode_completion_defaults() {
        let event = StreamEvent::decode(r#"{"type":"completion"}"#).unwrap();
        assert_eq!(
            event,
            StreamEvent::Completion {
                final_text: String::new(),
                sources: Vec::new(),
            }
        );
    }

    #[test]
    fn test_decode_crawling_and_error() {
        assert_eq!(
            StreamEvent::decode(r#"{"type":"crawling"}"#).unwrap(),
            StreamEvent::Crawling
        );

        let event = StreamEvent::decode(r#"{"type":"error","message":"boom"}"#).unwrap();
        assert_eq!(
            event,
            StreamEvent::Error {
                message: "boom".to_string()
            }
        );
        assert!(event.is_terminal());
        assert_eq!(event.kind(), "error");
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let event = StreamEvent::decode(
            r#"{"type":"crawling","progress":0.4,"schema":{"v":2}}"#,
        )
        .unwrap();
        assert_eq!(event, StreamEvent::Crawling);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = StreamEvent::decode(r#"{"type":"heartbeat"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownType(ref t) if t == "heartbeat"));
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        let err = StreamEvent::decode(r#"{"type":"content","#).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));

        let err = StreamEvent::decode(r#"{"kind":"content"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("type")));
    }

    #[test]
    fn test_reveal_text() {
        assert_eq!(
            ReasoningStep::new("Step 1", "checking docs").reveal_text(),
            "Step 1: checking docs"
        );
        assert_eq!(ReasoningStep::new("Step 1", "").reveal_text(), "Step 1");
    }
}
