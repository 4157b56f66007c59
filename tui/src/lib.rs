//! Navian TUI - Terminal surface for the Navian chat widget
//!
//! This crate renders the chat widget in a terminal and offers headless
//! `ask` and `contact` commands. All chat behavior lives in `navian-core`;
//! this crate only draws what the session tells it to.
//!
//! # Architecture
//!
//! - **Session worker**: Owns the `ChatSession` on its own task, sends render ops back
//! - **Display**: Folds render ops into the conversation picture
//! - **Markdown**: Answer text to styled lines
//! - **Widgets**: Bottom-anchored scrollable conversation view
//! - **Headless**: Plain-text transcript sink for scripts and pipes

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod display;
pub mod headless;
pub mod markdown;
pub mod session_worker;
pub mod theme;
pub mod widgets;

pub use app::App;
pub use display::DisplayState;
pub use headless::TranscriptSink;
pub use session_worker::{SessionCommand, SessionHandle, WorkerStopped};
