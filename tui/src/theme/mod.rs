//! Theme and Colors
//!
//! The widget palette, carried over to the terminal: a dark header bar,
//! green user bubbles, and muted grays for the reasoning trail.

use ratatui::style::{Color, Modifier, Style};

// ============================================================================
// Chrome
// ============================================================================

/// Header bar background
pub const HEADER_BG: Color = Color::Rgb(33, 37, 41);

/// Header title text
pub const HEADER_FG: Color = Color::Rgb(248, 249, 250);

/// Separators and borders
pub const BORDER_GRAY: Color = Color::Rgb(73, 80, 87);

/// System/dim text
pub const DIM_GRAY: Color = Color::Rgb(108, 117, 125);

// ============================================================================
// Conversation
// ============================================================================

/// User message bubble
pub const USER_GREEN: Color = Color::Rgb(130, 220, 130);

/// Assistant answer text
pub const ANSWER_FG: Color = Color::Rgb(233, 236, 239);

/// Reasoning section header ("Thinking...")
pub const REASONING_HEADER: Color = Color::Rgb(150, 180, 255);

/// Reasoning step text
pub const REASONING_FG: Color = Color::Rgb(173, 181, 189);

/// Source links
pub const LINK_BLUE: Color = Color::Rgb(100, 180, 255);

/// Crawling and loading indicators
pub const ACTIVITY_YELLOW: Color = Color::Rgb(255, 223, 128);

/// Inline code and code blocks in answers
pub const CODE_FG: Color = Color::Rgb(255, 170, 120);

/// Error red
pub const ERROR_RED: Color = Color::Rgb(255, 80, 80);

// ============================================================================
// Styles
// ============================================================================

/// Header bar
#[must_use]
pub fn header() -> Style {
    Style::default()
        .fg(HEADER_FG)
        .bg(HEADER_BG)
        .add_modifier(Modifier::BOLD)
}

/// Collapsible section headers
#[must_use]
pub fn section_header() -> Style {
    Style::default()
        .fg(REASONING_HEADER)
        .add_modifier(Modifier::BOLD)
}

/// Headings and table headers in answers
#[must_use]
pub fn markdown_heading() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}
