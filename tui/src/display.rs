//! Display State Types
//!
//! What the terminal shows, folded from the session's render callbacks.
//! The TUI never decides *when* something appears; the core coordinator
//! does. `DisplayState` only remembers the latest picture and turns it into
//! styled lines.
//!
//! - [`DisplayTurn`]: One user message and everything rendered in reply
//! - [`DisplayStep`]: A reasoning step as currently revealed
//! - [`DisplayState`]: The whole conversation plus transient indicators

use ratatui::style::{Modifier, Style};

use navian_core::{
    ReasoningStep, RenderOp, RenderSink, Source, TurnId, CRAWLING_STATUS_TEXT, WELCOME_MESSAGE,
};

use crate::markdown::render_answer;
use crate::theme;
use crate::widgets::StyledLine;

/// Reasoning section title while steps are still arriving
pub const THINKING_TITLE: &str = "Thinking...";

/// Reasoning section title once every step is shown
pub const THINKING_COMPLETE_TITLE: &str = "Thinking Complete";

/// A reasoning step as currently revealed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayStep {
    /// Step title
    pub title: String,
    /// Visible prefix of the step text
    pub visible: String,
}

/// One user message and the reply rendered for it
#[derive(Clone, Debug)]
pub struct DisplayTurn {
    /// Turn id assigned by the session
    pub id: TurnId,
    /// What the user asked
    pub query: String,
    /// Reasoning steps, by index
    pub reasoning: Vec<DisplayStep>,
    /// Every step is fully shown
    pub reasoning_complete: bool,
    /// Reasoning section folded away
    pub reasoning_collapsed: bool,
    /// Latest answer text
    pub content: Option<String>,
    /// Source links
    pub sources: Vec<Source>,
    /// Sources list folded away
    pub sources_collapsed: bool,
    /// User-facing error
    pub error: Option<String>,
}

impl DisplayTurn {
    /// Fresh turn for `query`
    pub fn new(id: TurnId, query: impl Into<String>) -> Self {
        Self {
            id,
            query: query.into(),
            reasoning: Vec::new(),
            reasoning_complete: false,
            reasoning_collapsed: false,
            content: None,
            sources: Vec::new(),
            sources_collapsed: true,
            error: None,
        }
    }

    /// Header of the reasoning section
    pub fn reasoning_title(&self) -> &'static str {
        if self.reasoning_complete {
            THINKING_COMPLETE_TITLE
        } else {
            THINKING_TITLE
        }
    }

    fn set_step(&mut self, index: usize, title: &str, visible: &str) {
        if index >= self.reasoning.len() {
            self.reasoning.resize_with(index + 1, || DisplayStep {
                title: String::new(),
                visible: String::new(),
            });
        }
        let step = &mut self.reasoning[index];
        step.title = title.to_string();
        step.visible = visible.to_string();
    }
}

/// A conversation entry
#[derive(Clone, Debug)]
pub enum DisplayEntry {
    /// Greeting from the assistant
    Welcome(String),
    /// A user message and its reply
    Turn(DisplayTurn),
}

/// The full display state for the TUI
#[derive(Debug)]
pub struct DisplayState {
    /// Shown in the header
    pub company_name: String,
    /// Conversation, oldest first
    pub entries: Vec<DisplayEntry>,
    /// Waiting for the first response of a turn
    pub loading: bool,
    /// Backend is crawling the configured pages
    pub crawling: bool,
}

impl DisplayState {
    /// Empty conversation, greeted when `show_welcome`
    pub fn new(company_name: impl Into<String>, show_welcome: bool) -> Self {
        let mut entries = Vec::new();
        if show_welcome {
            entries.push(DisplayEntry::Welcome(WELCOME_MESSAGE.to_string()));
        }
        Self {
            company_name: company_name.into(),
            entries,
            loading: false,
            crawling: false,
        }
    }

    /// Fold one op into the state
    pub fn apply(&mut self, op: &RenderOp) {
        op.apply(self);
    }

    /// Latest turn, if any
    pub fn latest_turn(&self) -> Option<&DisplayTurn> {
        self.entries.iter().rev().find_map(|e| match e {
            DisplayEntry::Turn(turn) => Some(turn),
            DisplayEntry::Welcome(_) => None,
        })
    }

    fn latest_turn_mut(&mut self) -> Option<&mut DisplayTurn> {
        self.entries.iter_mut().rev().find_map(|e| match e {
            DisplayEntry::Turn(turn) => Some(turn),
            DisplayEntry::Welcome(_) => None,
        })
    }

    /// Whether a message may be sent now
    pub fn is_busy(&self) -> bool {
        self.loading
    }

    /// Fold or unfold the latest reasoning section
    ///
    /// Returns false when there is nothing to toggle.
    pub fn toggle_reasoning(&mut self) -> bool {
        match self.latest_turn_mut() {
            Some(turn) if !turn.reasoning.is_empty() => {
                turn.reasoning_collapsed = !turn.reasoning_collapsed;
                true
            }
            _ => false,
        }
    }

    /// Fold or unfold the latest sources list
    ///
    /// Returns false when there is nothing to toggle.
    pub fn toggle_sources(&mut self) -> bool {
        match self.latest_turn_mut() {
            Some(turn) if !turn.sources.is_empty() => {
                turn.sources_collapsed = !turn.sources_collapsed;
                true
            }
            _ => false,
        }
    }

    /// Conversation as styled lines; `frame` drives the loading dots
    pub fn lines(&self, frame: u64) -> Vec<StyledLine> {
        let mut lines = Vec::new();

        for entry in &self.entries {
            match entry {
                DisplayEntry::Welcome(text) => {
                    lines.push(StyledLine::new(text.clone(), Style::default().fg(theme::ANSWER_FG)));
                    lines.push(StyledLine::blank());
                }
                DisplayEntry::Turn(turn) => push_turn(&mut lines, turn),
            }
        }

        if self.crawling {
            lines.push(StyledLine::new(
                CRAWLING_STATUS_TEXT,
                Style::default()
                    .fg(theme::ACTIVITY_YELLOW)
                    .add_modifier(Modifier::ITALIC),
            ));
        }
        if self.loading {
            lines.push(StyledLine::new(
                loading_dots(frame),
                Style::default().fg(theme::ACTIVITY_YELLOW),
            ));
        }

        lines
    }
}

fn push_turn(lines: &mut Vec<StyledLine>, turn: &DisplayTurn) {
    lines.push(StyledLine::new(
        format!("You: {}", turn.query),
        Style::default().fg(theme::USER_GREEN),
    ));
    lines.push(StyledLine::blank());

    if !turn.reasoning.is_empty() {
        let chevron = if turn.reasoning_collapsed { '▸' } else { '▾' };
        lines.push(StyledLine::new(
            format!("{chevron} {}", turn.reasoning_title()),
            theme::section_header(),
        ));
        if !turn.reasoning_collapsed {
            for step in &turn.reasoning {
                lines.push(StyledLine::indented(
                    step.visible.clone(),
                    Style::default().fg(theme::REASONING_FG),
                    2,
                ));
            }
        }
        lines.push(StyledLine::blank());
    }

    if let Some(content) = &turn.content {
        lines.extend(render_answer(content));
        lines.push(StyledLine::blank());
    }

    if !turn.sources.is_empty() {
        let chevron = if turn.sources_collapsed { '▸' } else { '▾' };
        lines.push(StyledLine::new(
            format!("{chevron} Sources ({})", turn.sources.len()),
            theme::section_header(),
        ));
        if !turn.sources_collapsed {
            for source in &turn.sources {
                lines.push(StyledLine::indented(
                    source.url.clone(),
                    Style::default()
                        .fg(theme::LINK_BLUE)
                        .add_modifier(Modifier::UNDERLINED),
                    2,
                ));
            }
        }
        lines.push(StyledLine::blank());
    }

    if let Some(error) = &turn.error {
        lines.push(StyledLine::new(error.clone(), Style::default().fg(theme::ERROR_RED)));
        lines.push(StyledLine::blank());
    }
}

fn loading_dots(frame: u64) -> String {
    // One more dot roughly every third of a second at 30 FPS
    let count = usize::try_from(frame / 10 % 3).unwrap_or(0) + 1;
    "●".repeat(count)
}

impl RenderSink for DisplayState {
    fn on_reasoning_step(&mut self, index: usize, step: &ReasoningStep, visible: &str) {
        if let Some(turn) = self.latest_turn_mut() {
            turn.set_step(index, &step.title, visible);
        }
    }

    fn on_content(&mut self, text: &str) {
        if let Some(turn) = self.latest_turn_mut() {
            turn.content = Some(text.to_string());
        }
    }

    fn on_sources(&mut self, sources: &[Source]) {
        if let Some(turn) = self.latest_turn_mut() {
            turn.sources = sources.to_vec();
        }
    }

    fn on_error(&mut self, message: &str) {
        if let Some(turn) = self.latest_turn_mut() {
            turn.error = Some(message.to_string());
        }
    }

    fn on_crawling_status(&mut self, visible: bool) {
        self.crawling = visible;
    }

    fn on_turn_started(&mut self, turn: TurnId, query: &str) {
        self.entries.push(DisplayEntry::Turn(DisplayTurn::new(turn, query)));
    }

    fn on_loading(&mut self, visible: bool) {
        self.loading = visible;
    }

    fn on_reasoning_complete(&mut self) {
        if let Some(turn) = self.latest_turn_mut() {
            turn.reasoning_complete = true;
            turn.reasoning_collapsed = true;
        }
    }

    fn on_cleared(&mut self, welcome: Option<&str>) {
        self.entries.clear();
        self.loading = false;
        self.crawling = false;
        if let Some(text) = welcome {
            self.entries.push(DisplayEntry::Welcome(text.to_string()));
        }
    }
}
