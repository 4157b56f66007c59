//! Presentation Coordinator
//!
//! Owns the visual timeline of one chat turn. Events arrive from the stream
//! reader in network order; ticks arrive from the reveal timers. The
//! coordinator decides, for each, what to render now and what to hold back.
//!
//! # State Machine
//!
//! ```text
//!            Reasoning                    reveal done, queue empty
//!   Idle ───────────────► RevealingReasoning ─────────────────► ReasoningDoneNoPending
//!                              │      ▲                                  ▲
//!          Content/Completion  │      │ Reasoning                        │ released Content
//!          while animating     ▼      │                                  │
//!                     WaitingForReasoningThenRelease ────────────────────┘
//!                              │
//!                              │ released Completion / Error (from any state)
//!                              ▼
//!                         TurnComplete
//! ```
//!
//! # Guarantees
//!
//! - Answer text never appears while a reasoning reveal is still running.
//! - Snapshots received while animating are buffered last-write-wins; an
//!   older snapshot is never rendered once a newer one arrived.
//! - Reasoning steps reveal strictly in arrival order, one at a time.
//! - A tick is acted on only if it names this turn and the in-flight reveal.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::events::{ReasoningStep, Source, StreamEvent};
use crate::render::{RenderSink, GENERIC_ERROR_MESSAGE};
use crate::reveal::{RevealTiming, WordReveal};
use crate::timers::{RevealId, RevealTick, TickScheduler, TurnId};

/// Coordinator state for one turn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Nothing revealing yet
    Idle,
    /// A reasoning reveal is in flight
    RevealingReasoning,
    /// All reasoning shown, nothing buffered
    ReasoningDoneNoPending,
    /// A snapshot is held until the reveal finishes
    WaitingForReasoningThenRelease,
    /// Terminal; further input is ignored
    TurnComplete,
}

#[derive(Debug)]
struct ActiveReveal {
    index: usize,
    id: RevealId,
    reveal: WordReveal,
}

/// The single snapshot held back while animating
#[derive(Debug, Clone, PartialEq, Eq)]
struct BufferedSnapshot {
    text: String,
    sources: Option<Vec<Source>>,
    terminal: bool,
}

/// Per-turn presentation state machine
#[derive(Debug)]
pub struct PresentationCoordinator {
    turn: TurnId,
    state: CoordinatorState,
    timing: RevealTiming,
    rng: StdRng,

    steps: Vec<ReasoningStep>,
    active: Option<ActiveReveal>,
    queue: VecDeque<usize>,
    next_reveal: u64,

    buffer: Option<BufferedSnapshot>,
    latest_content: String,

    crawling_visible: bool,
    content_rendered: bool,
    reasoning_closed: bool,
    sources_rendered: bool,
}

impl PresentationCoordinator {
    /// Fresh coordinator for `turn`
    pub fn new(turn: TurnId, timing: RevealTiming) -> Self {
        Self::with_rng(turn, timing, StdRng::from_entropy())
    }

    /// Fresh coordinator with a deterministic jitter source
    pub fn with_seed(turn: TurnId, timing: RevealTiming, seed: u64) -> Self {
        Self::with_rng(turn, timing, StdRng::seed_from_u64(seed))
    }

    fn with_rng(turn: TurnId, timing: RevealTiming, rng: StdRng) -> Self {
        Self {
            turn,
            state: CoordinatorState::Idle,
            timing,
            rng,
            steps: Vec::new(),
            active: None,
            queue: VecDeque::new(),
            next_reveal: 0,
            buffer: None,
            latest_content: String::new(),
            crawling_visible: false,
            content_rendered: false,
            reasoning_closed: false,
            sources_rendered: false,
        }
    }

    /// The turn this coordinator belongs to
    #[must_use]
    pub fn turn(&self) -> TurnId {
        self.turn
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Whether a reasoning reveal is in flight
    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.active.is_some()
    }

    /// Terminal, or idle with nothing held back
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.state == CoordinatorState::TurnComplete
            || (!self.is_animating() && self.buffer.is_none())
    }

    /// Dispatch one stream event
    pub fn handle_event<R, T>(&mut self, event: StreamEvent, sink: &mut R, scheduler: &mut T)
    where
        R: RenderSink + ?Sized,
        T: TickScheduler + ?Sized,
    {
        if self.state == CoordinatorState::TurnComplete {
            tracing::debug!(turn = %self.turn, kind = event.kind(), "Ignoring event after turn completed");
            return;
        }

        match event {
            StreamEvent::Crawling => {
                if !self.crawling_visible {
                    self.crawling_visible = true;
                    sink.on_crawling_status(true);
                }
            }

            StreamEvent::Reasoning(step) => {
                self.hide_crawling(sink);
                let index = self.steps.len();
                self.steps.push(step);

                if self.state != CoordinatorState::WaitingForReasoningThenRelease {
                    self.transition(CoordinatorState::RevealingReasoning);
                }

                if self.active.is_some() {
                    tracing::debug!(turn = %self.turn, index, "Queued reasoning step");
                    self.queue.push_back(index);
                } else {
                    self.start_reveal(index, sink, scheduler);
                    self.pump(sink, scheduler);
                }
            }

            StreamEvent::Content { text, .. } => {
                self.latest_content.clone_from(&text);
                self.deliver(
                    BufferedSnapshot {
                        text,
                        sources: None,
                        terminal: false,
                    },
                    sink,
                );
            }

            StreamEvent::Completion {
                final_text,
                sources,
            } => {
                let text = if final_text.is_empty() {
                    self.latest_content.clone()
                } else {
                    final_text
                };
                self.deliver(
                    BufferedSnapshot {
                        text,
                        sources: Some(sources),
                        terminal: true,
                    },
                    sink,
                );
            }

            StreamEvent::Error { message } => {
                tracing::warn!(turn = %self.turn, backend_message = %message, "Backend reported an error");
                self.fail(sink);
            }
        }
    }

    /// Dispatch one reveal tick
    pub fn handle_tick<R, T>(&mut self, tick: RevealTick, sink: &mut R, scheduler: &mut T)
    where
        R: RenderSink + ?Sized,
        T: TickScheduler + ?Sized,
    {
        if tick.turn != self.turn || self.state == CoordinatorState::TurnComplete {
            tracing::debug!(turn = %self.turn, stale = %tick.turn, "Ignoring stale reveal tick");
            return;
        }

        let Some(active) = self.active.as_mut() else {
            tracing::debug!(turn = %self.turn, "Ignoring tick with no reveal in flight");
            return;
        };
        if active.id != tick.reveal {
            tracing::debug!(turn = %self.turn, "Ignoring tick for a finished reveal");
            return;
        }

        let visible = active.reveal.advance();
        sink.on_reasoning_step(active.index, &self.steps[active.index], visible);

        if active.reveal.is_finished() {
            self.pump(sink, scheduler);
        } else {
            let next = RevealTick {
                turn: self.turn,
                reveal: active.id,
            };
            scheduler.schedule(next, self.timing.sample(&mut self.rng));
        }
    }

    /// Terminate the turn with the generic error
    ///
    /// Used for backend error events and for transport or HTTP failures. The
    /// in-flight reveal and every queued step show in full; only the buffered
    /// snapshot is discarded. Nothing already rendered is retracted.
    pub fn fail<R: RenderSink + ?Sized>(&mut self, sink: &mut R) {
        if self.state == CoordinatorState::TurnComplete {
            return;
        }
        self.flush_queued_steps(sink);
        self.stop_animation(sink);
        self.close_reasoning(sink);
        sink.on_error(GENERIC_ERROR_MESSAGE);
        self.transition(CoordinatorState::TurnComplete);
    }

    /// Stop the turn without rendering anything new
    ///
    /// Called when a newer turn replaces this one.
    pub fn cancel<R: RenderSink + ?Sized>(&mut self, sink: &mut R) {
        if self.state == CoordinatorState::TurnComplete {
            return;
        }
        self.stop_animation(sink);
        self.transition(CoordinatorState::TurnComplete);
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn transition(&mut self, next: CoordinatorState) {
        if self.state != next {
            tracing::debug!(turn = %self.turn, from = ?self.state, to = ?next, "Coordinator transition");
            self.state = next;
        }
    }

    /// Render a snapshot now, or hold it if a reveal is running
    fn deliver<R: RenderSink + ?Sized>(&mut self, snapshot: BufferedSnapshot, sink: &mut R) {
        if self.is_animating() {
            if self.buffer.is_some() {
                tracing::debug!(turn = %self.turn, "Replacing buffered snapshot");
            }
            self.buffer = Some(snapshot);
            self.transition(CoordinatorState::WaitingForReasoningThenRelease);
            return;
        }

        let terminal = snapshot.terminal;
        self.render_snapshot(snapshot, sink);
        if terminal {
            self.transition(CoordinatorState::TurnComplete);
        }
    }

    fn render_snapshot<R: RenderSink + ?Sized>(&mut self, snapshot: BufferedSnapshot, sink: &mut R) {
        self.hide_crawling(sink);
        if !self.content_rendered {
            self.content_rendered = true;
            self.close_reasoning(sink);
        }

        if !snapshot.text.is_empty() {
            sink.on_content(&snapshot.text);
        }

        if let Some(sources) = snapshot.sources {
            if !sources.is_empty() && !self.sources_rendered {
                self.sources_rendered = true;
                sink.on_sources(&sources);
            }
        }
    }

    /// Begin revealing step `index`; the first word shows immediately
    fn start_reveal<R, T>(&mut self, index: usize, sink: &mut R, scheduler: &mut T)
    where
        R: RenderSink + ?Sized,
        T: TickScheduler + ?Sized,
    {
        self.next_reveal += 1;
        let id = RevealId(self.next_reveal);
        let step = &self.steps[index];
        let mut reveal = WordReveal::new(&step.reveal_text());
        sink.on_reasoning_step(index, step, reveal.advance());

        if !reveal.is_finished() {
            let tick = RevealTick {
                turn: self.turn,
                reveal: id,
            };
            scheduler.schedule(tick, self.timing.sample(&mut self.rng));
        }
        self.active = Some(ActiveReveal { index, id, reveal });
    }

    /// Retire finished reveals, start queued ones, release when idle
    fn pump<R, T>(&mut self, sink: &mut R, scheduler: &mut T)
    where
        R: RenderSink + ?Sized,
        T: TickScheduler + ?Sized,
    {
        loop {
            if let Some(active) = &self.active {
                if !active.reveal.is_finished() {
                    return;
                }
                self.active = None;
            }

            if let Some(next) = self.queue.pop_front() {
                self.start_reveal(next, sink, scheduler);
                continue;
            }

            self.on_animation_idle(sink);
            return;
        }
    }

    fn on_animation_idle<R: RenderSink + ?Sized>(&mut self, sink: &mut R) {
        match self.state {
            CoordinatorState::RevealingReasoning => {
                self.transition(CoordinatorState::ReasoningDoneNoPending);
            }
            CoordinatorState::WaitingForReasoningThenRelease => {
                let Some(snapshot) = self.buffer.take() else {
                    self.transition(CoordinatorState::ReasoningDoneNoPending);
                    return;
                };
                tracing::debug!(turn = %self.turn, terminal = snapshot.terminal, "Releasing buffered snapshot");
                let terminal = snapshot.terminal;
                self.render_snapshot(snapshot, sink);
                self.transition(if terminal {
                    CoordinatorState::TurnComplete
                } else {
                    CoordinatorState::ReasoningDoneNoPending
                });
            }
            _ => {}
        }
    }

    /// Snap the active reveal, then show every queued step in full
    fn flush_queued_steps<R: RenderSink + ?Sized>(&mut self, sink: &mut R) {
        if let Some(mut active) = self.active.take() {
            let full = active.reveal.snap();
            sink.on_reasoning_step(active.index, &self.steps[active.index], full);
        }
        while let Some(index) = self.queue.pop_front() {
            let step = &self.steps[index];
            sink.on_reasoning_step(index, step, &step.reveal_text());
        }
    }

    fn stop_animation<R: RenderSink + ?Sized>(&mut self, sink: &mut R) {
        if let Some(mut active) = self.active.take() {
            let full = active.reveal.snap();
            sink.on_reasoning_step(active.index, &self.steps[active.index], full);
        }
        if !self.queue.is_empty() {
            tracing::debug!(turn = %self.turn, dropped = self.queue.len(), "Dropping queued reasoning steps");
            self.queue.clear();
        }
        self.buffer = None;
        self.hide_crawling(sink);
    }

    fn close_reasoning<R: RenderSink + ?Sized>(&mut self, sink: &mut R) {
        if !self.reasoning_closed && !self.steps.is_empty() {
            self.reasoning_closed = true;
            sink.on_reasoning_complete();
        }
    }

    fn hide_crawling<R: RenderSink + ?Sized>(&mut self, sink: &mut R) {
        if self.crawling_visible {
            self.crawling_visible = false;
            sink.on_crawling_status(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{RecordingSink, RenderOp};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    /// Collects scheduled ticks so tests decide when time passes
    #[derive(Default)]
    struct ManualScheduler {
        pending: VecDeque<(RevealTick, Duration)>,
    }

    impl TickScheduler for ManualScheduler {
        fn schedule(&mut self, tick: RevealTick, delay: Duration) {
            self.pending.push_back((tick, delay));
        }
    }

    struct Harness {
        coordinator: PresentationCoordinator,
        sink: RecordingSink,
        scheduler: ManualScheduler,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                coordinator: PresentationCoordinator::with_seed(
                    TurnId(1),
                    RevealTiming::default(),
                    42,
                ),
                sink: RecordingSink::new(),
                scheduler: ManualScheduler::default(),
            }
        }

        fn event(&mut self, event: StreamEvent) {
            self.coordinator
                .handle_event(event, &mut self.sink, &mut self.scheduler);
        }

        /// Fire one pending tick; false when none are pending
        fn tick(&mut self) -> bool {
            match self.scheduler.pending.pop_front() {
                Some((tick, _)) => {
                    self.coordinator
                        .handle_tick(tick, &mut self.sink, &mut self.scheduler);
                    true
                }
                None => false,
            }
        }

        fn run_timers(&mut self) {
            while self.tick() {}
        }
    }

    fn reasoning(title: &str, body: &str) -> StreamEvent {
        StreamEvent::Reasoning(ReasoningStep::new(title, body))
    }

    fn content(text: &str) -> StreamEvent {
        StreamEvent::Content {
            text: text.to_string(),
            is_final: false,
        }
    }

    fn completion(text: &str, urls: &[&str]) -> StreamEvent {
        StreamEvent::Completion {
            final_text: text.to_string(),
            sources: urls.iter().map(|u| Source::new(*u)).collect(),
        }
    }

    fn step_op(index: usize, title: &str, visible: &str) -> RenderOp {
        RenderOp::ReasoningStep {
            index,
            title: title.to_string(),
            visible: visible.to_string(),
        }
    }

    #[test]
    fn test_reasoning_finishes_before_buffered_completion() {
        let mut h = Harness::new();
        h.event(reasoning("Step 1", "checking docs"));
        h.event(completion("The answer is 42.", &["https://x.test"]));

        assert_eq!(
            h.coordinator.state(),
            CoordinatorState::WaitingForReasoningThenRelease
        );
        assert_eq!(h.sink.ops(), &[step_op(0, "Step 1", "Step")]);

        h.run_timers();

        assert_eq!(
            h.sink.ops(),
            &[
                step_op(0, "Step 1", "Step"),
                step_op(0, "Step 1", "Step 1:"),
                step_op(0, "Step 1", "Step 1: checking"),
                step_op(0, "Step 1", "Step 1: checking docs"),
                RenderOp::ReasoningComplete,
                RenderOp::Content {
                    text: "The answer is 42.".to_string()
                },
                RenderOp::Sources {
                    sources: vec![Source::new("https://x.test")]
                },
            ]
        );
        assert_eq!(h.coordinator.state(), CoordinatorState::TurnComplete);
        assert!(h.coordinator.is_settled());
    }

    #[test]
    fn test_completion_renders_immediately_when_not_animating() {
        let mut h = Harness::new();
        h.event(completion("Done.", &["https://a.test"]));

        assert!(h.scheduler.pending.is_empty());
        assert_eq!(
            h.sink.ops(),
            &[
                RenderOp::Content {
                    text: "Done.".to_string()
                },
                RenderOp::Sources {
                    sources: vec![Source::new("https://a.test")]
                },
            ]
        );
        assert_eq!(h.coordinator.state(), CoordinatorState::TurnComplete);
    }

    #[test]
    fn test_completion_after_reveal_finished_is_not_delayed() {
        let mut h = Harness::new();
        h.event(reasoning("Plan", "two words"));
        h.run_timers();
        assert_eq!(
            h.coordinator.state(),
            CoordinatorState::ReasoningDoneNoPending
        );

        h.sink.take();
        h.event(completion("Now.", &[]));
        assert_eq!(
            h.sink.ops(),
            &[
                RenderOp::ReasoningComplete,
                RenderOp::Content {
                    text: "Now.".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_only_latest_buffered_snapshot_is_rendered() {
        let mut h = Harness::new();
        h.event(reasoning("Step 1", "slow thinking here"));
        h.event(content("C1 partial"));
        h.event(content("C2 full snapshot"));
        h.run_timers();

        let contents: Vec<_> = h
            .sink
            .ops()
            .iter()
            .filter_map(|op| match op {
                RenderOp::Content { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(contents, vec!["C2 full snapshot"]);
        assert_eq!(
            h.coordinator.state(),
            CoordinatorState::ReasoningDoneNoPending
        );
    }

    #[test]
    fn test_answer_never_precedes_reasoning_for_any_arrival_time() {
        // Completion arrives after k ticks, for every k the reveal allows
        for ticks_before in 0..6 {
            let mut h = Harness::new();
            h.event(reasoning("Step 1", "look"));
            h.event(reasoning("Step 2", "compare sources"));
            for _ in 0..ticks_before {
                h.tick();
            }
            h.event(completion("Answer.", &[]));
            h.run_timers();

            let ops = h.sink.ops();
            let last_step = ops
                .iter()
                .rposition(|op| matches!(op, RenderOp::ReasoningStep { .. }))
                .unwrap();
            let answer = ops
                .iter()
                .position(|op| matches!(op, RenderOp::Content { .. }))
                .unwrap();
            assert!(answer > last_step, "ticks_before={ticks_before}");
            assert_eq!(
                ops[last_step],
                step_op(1, "Step 2", "Step 2: compare sources")
            );
        }
    }

    #[test]
    fn test_steps_reveal_in_arrival_order() {
        let mut h = Harness::new();
        h.event(reasoning("A", "one two"));
        h.event(reasoning("B", "three"));
        assert_eq!(h.coordinator.state(), CoordinatorState::RevealingReasoning);
        h.run_timers();

        let indices: Vec<_> = h
            .sink
            .ops()
            .iter()
            .filter_map(|op| match op {
                RenderOp::ReasoningStep { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(indices, vec![0, 0, 0, 1, 1]);
        assert_eq!(
            h.coordinator.state(),
            CoordinatorState::ReasoningDoneNoPending
        );
    }

    #[test]
    fn test_single_word_step_finishes_without_ticks() {
        let mut h = Harness::new();
        h.event(reasoning("Thinking", ""));
        assert!(h.scheduler.pending.is_empty());
        assert!(!h.coordinator.is_animating());
        assert_eq!(
            h.coordinator.state(),
            CoordinatorState::ReasoningDoneNoPending
        );
    }

    #[test]
    fn test_stale_ticks_are_ignored() {
        let mut h = Harness::new();
        h.event(reasoning("Step 1", "checking docs"));
        h.sink.take();

        h.coordinator.handle_tick(
            RevealTick {
                turn: TurnId(0),
                reveal: RevealId(1),
            },
            &mut h.sink,
            &mut h.scheduler,
        );
        h.coordinator.handle_tick(
            RevealTick {
                turn: TurnId(1),
                reveal: RevealId(99),
            },
            &mut h.sink,
            &mut h.scheduler,
        );
        assert!(h.sink.ops().is_empty());
    }

    #[test]
    fn test_error_event_renders_generic_message() {
        let mut h = Harness::new();
        h.event(StreamEvent::Error {
            message: "boom".to_string(),
        });

        assert_eq!(
            h.sink.ops(),
            &[RenderOp::Error {
                message: GENERIC_ERROR_MESSAGE.to_string()
            }]
        );
        assert_eq!(h.coordinator.state(), CoordinatorState::TurnComplete);

        h.event(content("late"));
        assert_eq!(h.sink.ops().len(), 1);
    }

    #[test]
    fn test_error_mid_reveal_shows_all_steps_and_discards_buffer() {
        let mut h = Harness::new();
        h.event(StreamEvent::Crawling);
        h.event(reasoning("Step 1", "checking docs"));
        h.event(reasoning("Step 2", "still queued"));
        h.event(content("held back"));
        h.sink.take();

        h.coordinator.fail(&mut h.sink);
        h.run_timers();

        assert_eq!(
            h.sink.ops(),
            &[
                step_op(0, "Step 1", "Step 1: checking docs"),
                step_op(1, "Step 2", "Step 2: still queued"),
                RenderOp::ReasoningComplete,
                RenderOp::Error {
                    message: GENERIC_ERROR_MESSAGE.to_string()
                },
            ]
        );
        assert!(!h.coordinator.is_animating());
    }

    #[test]
    fn test_error_event_after_queued_steps_shows_them_in_full() {
        let mut h = Harness::new();
        h.event(reasoning("Step 1", "look"));
        h.event(reasoning("Step 2", "compare"));
        h.event(StreamEvent::Error {
            message: "boom".to_string(),
        });
        h.run_timers();

        assert_eq!(
            h.sink.ops(),
            &[
                step_op(0, "Step 1", "Step"),
                step_op(0, "Step 1", "Step 1: look"),
                step_op(1, "Step 2", "Step 2: compare"),
                RenderOp::ReasoningComplete,
                RenderOp::Error {
                    message: GENERIC_ERROR_MESSAGE.to_string()
                },
            ]
        );
    }

    #[test]
    fn test_crawling_indicator_hidden_by_first_render() {
        let mut h = Harness::new();
        h.event(StreamEvent::Crawling);
        h.event(StreamEvent::Crawling);
        h.event(content("Hello"));

        assert_eq!(
            h.sink.ops(),
            &[
                RenderOp::Crawling { visible: true },
                RenderOp::Crawling { visible: false },
                RenderOp::Content {
                    text: "Hello".to_string()
                },
            ]
        );
        assert_eq!(h.coordinator.state(), CoordinatorState::Idle);
    }

    #[test]
    fn test_empty_completion_keeps_latest_content() {
        let mut h = Harness::new();
        h.event(content("Partial answer"));
        h.event(completion("", &["https://x.test"]));

        assert_eq!(
            h.sink.ops(),
            &[
                RenderOp::Content {
                    text: "Partial answer".to_string()
                },
                RenderOp::Content {
                    text: "Partial answer".to_string()
                },
                RenderOp::Sources {
                    sources: vec![Source::new("https://x.test")]
                },
            ]
        );
    }

    #[test]
    fn test_cancel_snaps_reveal_to_full_text() {
        let mut h = Harness::new();
        h.event(reasoning("Step 1", "checking docs"));
        h.event(completion("never", &[]));
        h.sink.take();

        h.coordinator.cancel(&mut h.sink);
        h.run_timers();

        assert_eq!(
            h.sink.ops(),
            &[step_op(0, "Step 1", "Step 1: checking docs")]
        );
        assert_eq!(h.coordinator.state(), CoordinatorState::TurnComplete);
    }

    #[test]
    fn test_tick_delays_use_timing_range() {
        let mut h = Harness::new();
        h.event(reasoning("Step 1", "a b c d e f"));
        while let Some((tick, delay)) = h.scheduler.pending.pop_front() {
            assert!(delay >= Duration::from_millis(80));
            assert!(delay < Duration::from_millis(120));
            h.coordinator
                .handle_tick(tick, &mut h.sink, &mut h.scheduler);
        }
    }
}
