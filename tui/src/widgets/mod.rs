//! Widgets

pub mod conversation;

pub use conversation::{row_text, wrap_lines, Conversation, ConversationState, Mark, Row, StyledLine};
