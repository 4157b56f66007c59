//! Chat Session
//!
//! Drives turns end to end: builds the request, opens the stream, and feeds
//! network events and reveal ticks into a fresh [`PresentationCoordinator`]
//! per turn.
//!
//! # Turn Lifecycle
//!
//! ```text
//! begin_turn ──► cancel old timers ──► cancel old coordinator ──► open stream
//!                                                                    │
//!        ┌───────────────────────── advance ◄────────────────────────┘
//!        │  select! { reveal tick, next stream event }
//!        ▼
//!   Finished(outcome) once the stream is done and the coordinator settled
//! ```
//!
//! Everything runs on the caller's task. Ticks from the timers come back over
//! a channel, so the coordinator is never touched concurrently.

use rand::Rng;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::client::{BoxByteStream, ChatRequest, ChatTransport};
use crate::config::WidgetSettings;
use crate::coordinator::PresentationCoordinator;
use crate::events::StreamEvent;
use crate::reader::{EventStream, StreamError};
use crate::render::{RenderSink, WELCOME_MESSAGE};
use crate::reveal::RevealTiming;
use crate::timers::{RevealTick, RevealTimers, TurnId};

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Per-session identifier sent with every request
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// `session_<9 random base36 chars>_<unix millis>`
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let random: String = (0..9)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect();
        let millis = chrono::Utc::now().timestamp_millis();
        Self(format!("session_{random}_{millis}"))
    }

    /// The identifier as sent on the wire
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a message was not sent
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// Nothing but whitespace
    #[error("message is empty")]
    EmptyMessage,

    /// The previous turn has not received its first response yet
    #[error("still waiting for the previous response")]
    Busy,
}

/// How a turn ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Backend sent a completion
    Completed,
    /// Stream closed without a terminal event
    EndedWithoutCompletion,
    /// Backend error, HTTP failure or transport failure
    Failed,
}

/// Result of one [`ChatSession::advance`] step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnProgress {
    /// No turn has been started
    Idle,
    /// Still streaming or animating
    Running,
    /// Done; nothing further will render for this turn
    Finished(TurnOutcome),
}

struct ActiveTurn {
    id: TurnId,
    coordinator: PresentationCoordinator,
    /// `None` once the stream ended, failed or delivered a terminal event
    events: Option<EventStream<BoxByteStream>>,
    first_event_seen: bool,
    outcome: Option<TurnOutcome>,
}

impl ActiveTurn {
    fn awaiting_first_response(&self) -> bool {
        self.events.is_some() && !self.first_event_seen
    }

    fn is_finished(&self) -> bool {
        self.events.is_none() && self.coordinator.is_settled()
    }

    fn hide_loading<R: RenderSink + ?Sized>(&mut self, sink: &mut R) {
        if !self.first_event_seen {
            self.first_event_seen = true;
            sink.on_loading(false);
        }
    }
}

/// Owns the transport, the reveal timers and at most one active turn
pub struct ChatSession<T> {
    transport: T,
    settings: WidgetSettings,
    timing: RevealTiming,
    session_id: SessionId,
    history: Vec<String>,
    timers: RevealTimers,
    ticks: mpsc::UnboundedReceiver<RevealTick>,
    next_turn: u64,
    turn: Option<ActiveTurn>,
}

impl<T: ChatTransport> ChatSession<T> {
    /// New session with a fresh id
    pub fn new(transport: T, settings: WidgetSettings, timing: RevealTiming) -> Self {
        let (timers, ticks) = RevealTimers::new();
        let session_id = SessionId::generate();
        tracing::info!(session_id = %session_id, "Chat session created");
        Self {
            transport,
            settings,
            timing,
            session_id,
            history: Vec::new(),
            timers,
            ticks,
            next_turn: 0,
            turn: None,
        }
    }

    /// Current session id
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// User messages sent this session, oldest first
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Widget settings in use
    #[must_use]
    pub fn settings(&self) -> &WidgetSettings {
        &self.settings
    }

    /// Id of the current turn, if any
    #[must_use]
    pub fn current_turn(&self) -> Option<TurnId> {
        self.turn.as_ref().map(|t| t.id)
    }

    /// Whether a turn is still streaming or animating
    #[must_use]
    pub fn is_turn_active(&self) -> bool {
        self.turn.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start a new turn for `query`
    ///
    /// Any previous turn is cancelled first: its timers are aborted and its
    /// in-flight reveal snaps to full text. Not cancel-safe while the request
    /// is being sent.
    ///
    /// # Errors
    ///
    /// [`SessionError::EmptyMessage`] for blank input, [`SessionError::Busy`]
    /// while the previous turn has not received any response yet.
    pub async fn begin_turn<R>(&mut self, query: &str, sink: &mut R) -> Result<TurnId, SessionError>
    where
        R: RenderSink + ?Sized,
    {
        let query = query.trim();
        if query.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        if self.turn.as_ref().is_some_and(ActiveTurn::awaiting_first_response) {
            return Err(SessionError::Busy);
        }

        self.timers.cancel_all();
        if let Some(mut previous) = self.turn.take() {
            previous.coordinator.cancel(sink);
        }

        self.next_turn += 1;
        let id = TurnId(self.next_turn);
        self.history.push(query.to_string());
        tracing::info!(turn = %id, session_id = %self.session_id, "Starting turn");

        sink.on_turn_started(id, query);
        sink.on_loading(true);

        let request = ChatRequest {
            urls: self.settings.urls.clone(),
            query: query.to_string(),
            session_id: self.session_id.to_string(),
            company_name: self.settings.company_name.clone(),
        };

        let mut turn = ActiveTurn {
            id,
            coordinator: PresentationCoordinator::new(id, self.timing),
            events: None,
            first_event_seen: false,
            outcome: None,
        };

        match self.transport.open(&request).await {
            Ok(events) => turn.events = Some(events),
            Err(e) => {
                tracing::warn!(turn = %id, error = %e, "Failed to open chat stream");
                turn.hide_loading(sink);
                turn.coordinator.fail(sink);
                turn.outcome = Some(TurnOutcome::Failed);
            }
        }

        self.turn = Some(turn);
        Ok(id)
    }

    /// Run one cooperative step of the current turn
    ///
    /// Waits for whichever comes first, the next reveal tick or the next
    /// stream event, and dispatches it. Cancel-safe.
    pub async fn advance<R>(&mut self, sink: &mut R) -> TurnProgress
    where
        R: RenderSink + ?Sized,
    {
        let Self {
            turn,
            ticks,
            timers,
            ..
        } = self;

        let Some(turn) = turn.as_mut() else {
            return TurnProgress::Idle;
        };
        if turn.is_finished() {
            return TurnProgress::Finished(turn.outcome.unwrap_or(TurnOutcome::EndedWithoutCompletion));
        }

        tokio::select! {
            biased;

            Some(tick) = ticks.recv() => {
                turn.coordinator.handle_tick(tick, sink, timers);
            }

            item = next_or_pending(&mut turn.events) => {
                match item {
                    Some(Ok(event)) => {
                        turn.hide_loading(sink);
                        if event.is_terminal() {
                            turn.outcome = Some(if matches!(event, StreamEvent::Completion { .. }) {
                                TurnOutcome::Completed
                            } else {
                                TurnOutcome::Failed
                            });
                            turn.events = None;
                        }
                        turn.coordinator.handle_event(event, sink, timers);
                    }
                    Some(Err(StreamError::Transport(e))) => {
                        tracing::warn!(turn = %turn.id, error = %e, "Chat stream failed");
                        turn.hide_loading(sink);
                        turn.coordinator.fail(sink);
                        turn.outcome = Some(TurnOutcome::Failed);
                        turn.events = None;
                    }
                    None => {
                        tracing::debug!(turn = %turn.id, "Chat stream ended without a terminal event");
                        turn.hide_loading(sink);
                        turn.outcome.get_or_insert(TurnOutcome::EndedWithoutCompletion);
                        turn.events = None;
                    }
                }
            }
        }

        if turn.is_finished() {
            let outcome = turn.outcome.unwrap_or(TurnOutcome::EndedWithoutCompletion);
            tracing::info!(turn = %turn.id, ?outcome, "Turn finished");
            TurnProgress::Finished(outcome)
        } else {
            TurnProgress::Running
        }
    }

    /// Advance until the current turn finishes
    ///
    /// Returns `None` when there is no turn.
    pub async fn drive<R>(&mut self, sink: &mut R) -> Option<TurnOutcome>
    where
        R: RenderSink + ?Sized,
    {
        loop {
            match self.advance(sink).await {
                TurnProgress::Idle => return None,
                TurnProgress::Running => {}
                TurnProgress::Finished(outcome) => return Some(outcome),
            }
        }
    }

    /// Send `query` and drive the turn to completion
    ///
    /// # Errors
    ///
    /// Same as [`ChatSession::begin_turn`].
    pub async fn send_message<R>(&mut self, query: &str, sink: &mut R) -> Result<TurnOutcome, SessionError>
    where
        R: RenderSink + ?Sized,
    {
        self.begin_turn(query, sink).await?;
        Ok(self
            .drive(sink)
            .await
            .unwrap_or(TurnOutcome::EndedWithoutCompletion))
    }

    /// Forget the conversation and start a new session id
    pub fn clear<R>(&mut self, sink: &mut R)
    where
        R: RenderSink + ?Sized,
    {
        self.timers.cancel_all();
        if let Some(mut turn) = self.turn.take() {
            turn.coordinator.cancel(sink);
        }
        self.history.clear();
        self.session_id = SessionId::generate();
        tracing::info!(session_id = %self.session_id, "Chat cleared");

        sink.on_cleared(self.settings.show_welcome.then_some(WELCOME_MESSAGE));
    }
}

async fn next_or_pending(
    events: &mut Option<EventStream<BoxByteStream>>,
) -> Option<Result<StreamEvent, StreamError>> {
    match events {
        Some(stream) => stream.next_event().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{byte_stream_from, ClientError};
    use crate::events::Source;
    use crate::render::{RecordingSink, RenderOp, GENERIC_ERROR_MESSAGE};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    enum Scripted {
        Lines(Vec<&'static str>),
        Broken(Vec<&'static str>),
        Status(u16),
        Hang,
    }

    struct FakeTransport {
        script: Mutex<VecDeque<Scripted>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl FakeTransport {
        fn new(script: Vec<Scripted>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatTransport for FakeTransport {
        async fn open(&self, request: &ChatRequest) -> Result<EventStream<BoxByteStream>, ClientError> {
            self.requests.lock().unwrap().push(request.clone());
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Scripted::Lines(lines)) => Ok(EventStream::new(byte_stream_from(
                    lines
                        .into_iter()
                        .map(|l| Ok(format!("{l}\n").into_bytes()))
                        .collect::<Vec<_>>(),
                ))),
                Some(Scripted::Broken(lines)) => {
                    let mut chunks: Vec<Result<Vec<u8>, String>> = lines
                        .into_iter()
                        .map(|l| Ok(format!("{l}\n").into_bytes()))
                        .collect();
                    chunks.push(Err("connection reset".to_string()));
                    Ok(EventStream::new(byte_stream_from(chunks)))
                }
                Some(Scripted::Status(code)) => Err(ClientError::Status(code)),
                Some(Scripted::Hang) | None => {
                    let body: BoxByteStream = Box::pin(futures::stream::pending());
                    Ok(EventStream::new(body))
                }
            }
        }
    }

    fn session(script: Vec<Scripted>) -> ChatSession<FakeTransport> {
        let settings = WidgetSettings {
            urls: vec!["https://docs.test".to_string()],
            company_name: "Acme".to_string(),
            ..WidgetSettings::default()
        };
        ChatSession::new(FakeTransport::new(script), settings, RevealTiming::default())
    }

    const REASONING: &str =
        r#"data:{"type":"reasoning","step":{"title":"Step 1","thought":"checking docs"}}"#;
    const COMPLETION: &str = r#"data:{"type":"completion","final_content":"The answer is 42.","sources":[{"url":"https://x.test"}]}"#;

    #[test]
    fn test_session_id_format() {
        let id = SessionId::generate();
        let parts: Vec<_> = id.as_str().split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "session");
        assert_eq!(parts[1].len(), 9);
        assert!(parts[1].bytes().all(|b| BASE36.contains(&b)));
        assert!(parts[2].parse::<i64>().unwrap() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_message_reveals_reasoning_before_answer() {
        let mut chat = session(vec![Scripted::Lines(vec![REASONING, COMPLETION])]);
        let mut sink = RecordingSink::new();

        let outcome = chat.send_message("  What is it?  ", &mut sink).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Completed);

        let step = |visible: &str| RenderOp::ReasoningStep {
            index: 0,
            title: "Step 1".to_string(),
            visible: visible.to_string(),
        };
        assert_eq!(
            sink.ops(),
            &[
                RenderOp::TurnStarted {
                    turn: 1,
                    query: "What is it?".to_string()
                },
                RenderOp::Loading { visible: true },
                RenderOp::Loading { visible: false },
                step("Step"),
                step("Step 1:"),
                step("Step 1: checking"),
                step("Step 1: checking docs"),
                RenderOp::ReasoningComplete,
                RenderOp::Content {
                    text: "The answer is 42.".to_string()
                },
                RenderOp::Sources {
                    sources: vec![Source::new("https://x.test")]
                },
            ]
        );

        let requests = chat.transport.requests.lock().unwrap();
        assert_eq!(requests[0].query, "What is it?");
        assert_eq!(requests[0].company_name, "Acme");
        assert_eq!(requests[0].urls, vec!["https://docs.test".to_string()]);
        assert_eq!(requests[0].session_id, chat.session_id().to_string());
        assert_eq!(chat.history(), &["What is it?".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_event_fails_turn() {
        let mut chat = session(vec![Scripted::Lines(vec![
            r#"data:{"type":"error","message":"boom"}"#,
        ])]);
        let mut sink = RecordingSink::new();

        let outcome = chat.send_message("hi", &mut sink).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Failed);
        assert_eq!(
            sink.ops().last(),
            Some(&RenderOp::Error {
                message: GENERIC_ERROR_MESSAGE.to_string()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_http_status_is_treated_as_failure() {
        let mut chat = session(vec![Scripted::Status(502)]);
        let mut sink = RecordingSink::new();

        let outcome = chat.send_message("hi", &mut sink).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Failed);
        assert_eq!(
            &sink.ops()[1..],
            &[
                RenderOp::Loading { visible: true },
                RenderOp::Loading { visible: false },
                RenderOp::Error {
                    message: GENERIC_ERROR_MESSAGE.to_string()
                },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_keeps_rendered_content() {
        let mut chat = session(vec![Scripted::Broken(vec![
            r#"data: {"type":"content","full_content":"Partial"}"#,
        ])]);
        let mut sink = RecordingSink::new();

        let outcome = chat.send_message("hi", &mut sink).await.unwrap();
        assert_eq!(outcome, TurnOutcome::Failed);
        assert_eq!(sink.last_content(), Some("Partial"));
        assert!(matches!(sink.ops().last(), Some(RenderOp::Error { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_end_without_completion_releases_buffer() {
        let mut chat = session(vec![Scripted::Lines(vec![
            REASONING,
            r#"data: {"type":"content","full_content":"Almost"}"#,
        ])]);
        let mut sink = RecordingSink::new();

        let outcome = chat.send_message("hi", &mut sink).await.unwrap();
        assert_eq!(outcome, TurnOutcome::EndedWithoutCompletion);
        assert_eq!(sink.last_content(), Some("Almost"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_message_rejected() {
        let mut chat = session(vec![]);
        let mut sink = RecordingSink::new();

        assert_eq!(
            chat.begin_turn("   ", &mut sink).await,
            Err(SessionError::EmptyMessage)
        );
        assert!(sink.ops().is_empty());
        assert_eq!(chat.advance(&mut sink).await, TurnProgress::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_until_first_response() {
        let mut chat = session(vec![Scripted::Hang]);
        let mut sink = RecordingSink::new();

        chat.begin_turn("first", &mut sink).await.unwrap();
        assert_eq!(
            chat.begin_turn("second", &mut sink).await,
            Err(SessionError::Busy)
        );
        assert_eq!(chat.history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_turn_cancels_previous_reveal() {
        let mut chat = session(vec![
            Scripted::Lines(vec![
                r#"data:{"type":"reasoning","step":{"title":"A","thought":"a long chain of careful thought"}}"#,
            ]),
            Scripted::Lines(vec![
                r#"data:{"type":"reasoning","step":{"title":"B","thought":"short"}}"#,
                r#"data:{"type":"completion","final_content":"B done"}"#,
            ]),
        ]);
        let mut sink = RecordingSink::new();

        chat.begin_turn("first", &mut sink).await.unwrap();
        assert_eq!(chat.advance(&mut sink).await, TurnProgress::Running);
        assert_eq!(chat.advance(&mut sink).await, TurnProgress::Running);

        chat.begin_turn("second", &mut sink).await.unwrap();
        let outcome = chat.drive(&mut sink).await;
        assert_eq!(outcome, Some(TurnOutcome::Completed));

        let ops = sink.ops();
        let second_start = ops
            .iter()
            .position(|op| matches!(op, RenderOp::TurnStarted { turn: 2, .. }))
            .unwrap();

        // Turn A snapped to full text before turn B began
        assert_eq!(
            ops[second_start - 1],
            RenderOp::ReasoningStep {
                index: 0,
                title: "A".to_string(),
                visible: "A: a long chain of careful thought".to_string(),
            }
        );
        for op in &ops[second_start..] {
            if let RenderOp::ReasoningStep { title, .. } = op {
                assert_eq!(title, "B");
            }
        }
        assert_eq!(sink.last_content(), Some("B done"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_resets_session() {
        let mut chat = session(vec![Scripted::Lines(vec![COMPLETION])]);
        let mut sink = RecordingSink::new();

        chat.send_message("hi", &mut sink).await.unwrap();
        let old_id = chat.session_id().clone();

        chat.clear(&mut sink);
        assert_ne!(chat.session_id(), &old_id);
        assert!(chat.history().is_empty());
        assert_eq!(chat.current_turn(), None);
        assert_eq!(
            sink.ops().last(),
            Some(&RenderOp::Cleared {
                welcome: Some(WELCOME_MESSAGE.to_string())
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_turn_reports_outcome_again() {
        let mut chat = session(vec![Scripted::Lines(vec![COMPLETION])]);
        let mut sink = RecordingSink::new();

        chat.send_message("hi", &mut sink).await.unwrap();
        assert_eq!(
            chat.advance(&mut sink).await,
            TurnProgress::Finished(TurnOutcome::Completed)
        );
        assert!(!chat.is_turn_active());
    }
}
