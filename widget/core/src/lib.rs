//! Navian Core - Streaming Chat Widget Engine
//!
//! This crate holds everything the Navian chat widget does that is not
//! drawing: decoding the backend's event stream, pacing the word-by-word
//! reasoning reveal, and making sure an answer never jumps ahead of the
//! reasoning that precedes it. A terminal UI, a headless CLI or a test all
//! drive it the same way.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           Surfaces                                │
//! │     ┌─────────┐      ┌──────────────┐      ┌─────────────────┐    │
//! │     │   TUI   │      │ Headless ask │      │      Tests      │    │
//! │     │(ratatui)│      │   (stdout)   │      │ (RecordingSink) │    │
//! │     └────┬────┘      └──────┬───────┘      └────────┬────────┘    │
//! │          └──────────────────┴───────────────────────┘             │
//! │                             │ RenderSink callbacks                │
//! └─────────────────────────────┼─────────────────────────────────────┘
//!                               │
//! ┌─────────────────────────────┼─────────────────────────────────────┐
//! │                        NAVIAN CORE                                 │
//! │  ┌──────────────────────────┴─────────────────────────────────┐   │
//! │  │                       ChatSession                           │   │
//! │  │  ┌───────────┐  ┌──────────────┐  ┌─────────────────────┐  │   │
//! │  │  │ Transport │─►│ Stream Reader│─►│   Presentation      │  │   │
//! │  │  │ (reqwest) │  │ (data: json) │  │   Coordinator       │  │   │
//! │  │  └───────────┘  └──────────────┘  └──────────▲──────────┘  │   │
//! │  │                                              │ ticks       │   │
//! │  │                                   ┌──────────┴──────────┐  │   │
//! │  │                                   │    RevealTimers     │  │   │
//! │  │                                   └─────────────────────┘  │   │
//! │  └────────────────────────────────────────────────────────────┘   │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`StreamEvent`]: One decoded `data:` frame
//! - [`EventStream`]: Lazy event reader over a response body
//! - [`PresentationCoordinator`]: Per-turn state machine deciding what renders when
//! - [`RenderSink`]: Callbacks a surface implements
//! - [`ChatSession`]: Turn driver tying transport, reader, timers and coordinator together
//!
//! # Quick Start
//!
//! ```ignore
//! use navian_core::{load_config, ChatSession, HttpTransport, RecordingSink};
//!
//! let config = load_config()?;
//! config.validate()?;
//! let transport = HttpTransport::new(&config.widget)?;
//! let mut session = ChatSession::new(transport, config.widget.clone(), config.reveal);
//!
//! let mut sink = RecordingSink::new();
//! let outcome = session.send_message("What do you offer?", &mut sink).await?;
//! println!("{outcome:?}: {:?}", sink.last_content());
//! ```
//!
//! # Module Overview
//!
//! - [`events`]: Wire event types and decoding
//! - [`reader`]: Byte stream to event stream
//! - [`reveal`]: Word-by-word reveal state and timing
//! - [`timers`]: Cancellable reveal tick scheduling
//! - [`render`]: Render callbacks and sinks
//! - [`coordinator`]: The presentation state machine
//! - [`client`]: Chat request and HTTP transport
//! - [`session`]: Turn lifecycle
//! - [`contact`]: Contact form submission
//! - [`config`]: TOML/env/CLI configuration
//!
//! # No UI Dependencies
//!
//! This crate has no dependency on ratatui, crossterm, or any HTTP server
//! framework.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod contact;
pub mod coordinator;
pub mod events;
pub mod reader;
pub mod render;
pub mod reveal;
pub mod session;
pub mod timers;

pub use client::{byte_stream_from, BoxByteStream, ChatRequest, ChatTransport, ClientError, HttpTransport};
pub use contact::{
    ContactClient, ContactError, ContactForm, CONTACT_FAILURE_MESSAGE, CONTACT_SUCCESS_MESSAGE,
};
pub use coordinator::{CoordinatorState, PresentationCoordinator};
pub use events::{DecodeError, ReasoningStep, Source, StreamEvent};
pub use reader::{EventStream, StreamError};
pub use render::{
    ChannelSink, RecordingSink, RenderOp, RenderSink, CRAWLING_STATUS_TEXT, GENERIC_ERROR_MESSAGE,
    WELCOME_MESSAGE,
};
pub use reveal::{RevealTiming, WordReveal};
pub use session::{ChatSession, SessionError, SessionId, TurnOutcome, TurnProgress};
pub use timers::{RevealId, RevealTick, RevealTimers, TickScheduler, TurnId};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, ContactSettings, NavianConfig, ProxySettings, WidgetSettings,
};
