//! Render Callbacks
//!
//! The seam between the coordinator and whatever draws the chat. The core
//! never assumes a rendering technology: a terminal surface, a test, or a
//! headless CLI all implement [`RenderSink`].

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::events::{ReasoningStep, Source};
use crate::timers::TurnId;

/// Shown for every failure path; backend detail is never surfaced
pub const GENERIC_ERROR_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

/// Greeting shown on an empty or freshly cleared chat
pub const WELCOME_MESSAGE: &str = "Hi! I'm your AI assistant. How can I help you today?";

/// Text of the transient crawling indicator
pub const CRAWLING_STATUS_TEXT: &str = "Analyzing content...";

/// Receives presentation updates from the coordinator
pub trait RenderSink {
    /// Reasoning step `index` now shows `visible` (a prefix of its full text)
    fn on_reasoning_step(&mut self, index: usize, step: &ReasoningStep, visible: &str);

    /// Replace the answer text
    fn on_content(&mut self, text: &str);

    /// Show the sources list
    fn on_sources(&mut self, sources: &[Source]);

    /// Show a user-facing error
    fn on_error(&mut self, message: &str);

    /// Show or hide the "analyzing" indicator
    fn on_crawling_status(&mut self, visible: bool);

    /// A user message started a new turn
    fn on_turn_started(&mut self, _turn: TurnId, _query: &str) {}

    /// Show or hide the loading indicator
    fn on_loading(&mut self, _visible: bool) {}

    /// Every reasoning step of the turn is fully shown
    fn on_reasoning_complete(&mut self) {}

    /// The conversation was cleared
    fn on_cleared(&mut self, _welcome: Option<&str>) {}
}

/// One render callback, as data
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RenderOp {
    /// See [`RenderSink::on_turn_started`]
    TurnStarted {
        /// Turn id
        turn: u64,
        /// The user's message
        query: String,
    },
    /// See [`RenderSink::on_loading`]
    Loading {
        /// Indicator visibility
        visible: bool,
    },
    /// See [`RenderSink::on_reasoning_step`]
    ReasoningStep {
        /// Position of the step in this turn
        index: usize,
        /// Step title
        title: String,
        /// Currently visible text
        visible: String,
    },
    /// See [`RenderSink::on_reasoning_complete`]
    ReasoningComplete,
    /// See [`RenderSink::on_content`]
    Content {
        /// Answer text
        text: String,
    },
    /// See [`RenderSink::on_sources`]
    Sources {
        /// Source links
        sources: Vec<Source>,
    },
    /// See [`RenderSink::on_error`]
    Error {
        /// User-facing message
        message: String,
    },
    /// See [`RenderSink::on_crawling_status`]
    Crawling {
        /// Indicator visibility
        visible: bool,
    },
    /// See [`RenderSink::on_cleared`]
    Cleared {
        /// Welcome message to show, if enabled
        welcome: Option<String>,
    },
}

impl RenderOp {
    /// Replay this op onto a sink
    pub fn apply<S: RenderSink + ?Sized>(&self, sink: &mut S) {
        match self {
            Self::TurnStarted { turn, query } => sink.on_turn_started(TurnId(*turn), query),
            Self::Loading { visible } => sink.on_loading(*visible),
            Self::ReasoningStep {
                index,
                title,
                visible,
            } => {
                let step = ReasoningStep::new(title.clone(), String::new());
                sink.on_reasoning_step(*index, &step, visible);
            }
            Self::ReasoningComplete => sink.on_reasoning_complete(),
            Self::Content { text } => sink.on_content(text),
            Self::Sources { sources } => sink.on_sources(sources),
            Self::Error { message } => sink.on_error(message),
            Self::Crawling { visible } => sink.on_crawling_status(*visible),
            Self::Cleared { welcome } => sink.on_cleared(welcome.as_deref()),
        }
    }
}

/// Collects every callback as a [`RenderOp`]
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    ops: Vec<RenderOp>,
}

impl RecordingSink {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far
    #[must_use]
    pub fn ops(&self) -> &[RenderOp] {
        &self.ops
    }

    /// Take the recorded ops, leaving the recorder empty
    pub fn take(&mut self) -> Vec<RenderOp> {
        std::mem::take(&mut self.ops)
    }

    /// Last answer text rendered, if any
    #[must_use]
    pub fn last_content(&self) -> Option<&str> {
        self.ops.iter().rev().find_map(|op| match op {
            RenderOp::Content { text } => Some(text.as_str()),
            _ => None,
        })
    }
}

impl RenderSink for RecordingSink {
    fn on_reasoning_step(&mut self, index: usize, step: &ReasoningStep, visible: &str) {
        self.ops.push(RenderOp::ReasoningStep {
            index,
            title: step.title.clone(),
            visible: visible.to_string(),
        });
    }

    fn on_content(&mut self, text: &str) {
        self.ops.push(RenderOp::Content {
            text: text.to_string(),
        });
    }

    fn on_sources(&mut self, sources: &[Source]) {
        self.ops.push(RenderOp::Sources {
            sources: sources.to_vec(),
        });
    }

    fn on_error(&mut self, message: &str) {
        self.ops.push(RenderOp::Error {
            message: message.to_string(),
        });
    }

    fn on_crawling_status(&mut self, visible: bool) {
        self.ops.push(RenderOp::Crawling { visible });
    }

    fn on_turn_started(&mut self, turn: TurnId, query: &str) {
        self.ops.push(RenderOp::TurnStarted {
            turn: turn.0,
            query: query.to_string(),
        });
    }

    fn on_loading(&mut self, visible: bool) {
        self.ops.push(RenderOp::Loading { visible });
    }

    fn on_reasoning_complete(&mut self) {
        self.ops.push(RenderOp::ReasoningComplete);
    }

    fn on_cleared(&mut self, welcome: Option<&str>) {
        self.ops.push(RenderOp::Cleared {
            welcome: welcome.map(str::to_string),
        });
    }
}

/// Forwards every callback over a channel
///
/// Used when the surface runs on a different task than the session. A closed
/// channel means the surface went away; ops are then dropped silently.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<RenderOp>,
}

impl ChannelSink {
    /// Create a sink and the receiver the surface drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RenderOp>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, op: RenderOp) {
        if self.tx.send(op).is_err() {
            tracing::trace!("Render channel closed, dropping op");
        }
    }
}

impl RenderSink for ChannelSink {
    fn on_reasoning_step(&mut self, index: usize, step: &ReasoningStep, visible: &str) {
        self.send(RenderOp::ReasoningStep {
            index,
            title: step.title.clone(),
            visible: visible.to_string(),
        });
    }

    fn on_content(&mut self, text: &str) {
        self.send(RenderOp::Content {
            text: text.to_string(),
        });
    }

    fn on_sources(&mut self, sources: &[Source]) {
        self.send(RenderOp::Sources {
            sources: sources.to_vec(),
        });
    }

    fn on_error(&mut self, message: &str) {
        self.send(RenderOp::Error {
            message: message.to_string(),
        });
    }

    fn on_crawling_status(&mut self, visible: bool) {
        self.send(RenderOp::Crawling { visible });
    }

    fn on_turn_started(&mut self, turn: TurnId, query: &str) {
        self.send(RenderOp::TurnStarted {
            turn: turn.0,
            query: query.to_string(),
        });
    }

    fn on_loading(&mut self, visible: bool) {
        self.send(RenderOp::Loading { visible });
    }

    fn on_reasoning_complete(&mut self) {
        self.send(RenderOp::ReasoningComplete);
    }

    fn on_cleared(&mut self, welcome: Option<&str>) {
        self.send(RenderOp::Cleared {
            welcome: welcome.map(str::to_string),
        });
    }
}
