//! Reveal Timers
//!
//! A cancellable handle over every outstanding reveal tick.
//!
//! Each scheduled tick is a tiny task that sleeps and then posts a
//! [`RevealTick`] on a channel. The owner of the receiving end (the session
//! driver) feeds ticks back into the coordinator on its own task, so all
//! coordinator mutation stays single-threaded.
//!
//! `cancel_all` aborts every task in one call. A tick that already reached
//! the channel before the abort is still delivered, which is why the
//! coordinator checks `turn` and `reveal` before acting on it.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Identifies one chat turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(pub u64);

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "turn-{}", self.0)
    }
}

/// Identifies one reveal animation within a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RevealId(pub u64);

/// "Show the next word" for a specific reveal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RevealTick {
    /// Turn the tick was scheduled for
    pub turn: TurnId,
    /// Reveal the tick was scheduled for
    pub reveal: RevealId,
}

/// Something that can deliver a tick after a delay
pub trait TickScheduler {
    /// Arrange for `tick` to be delivered after `delay`
    fn schedule(&mut self, tick: RevealTick, delay: Duration);
}

/// Tokio-backed tick scheduler
pub struct RevealTimers {
    tx: mpsc::UnboundedSender<RevealTick>,
    handles: Vec<AbortHandle>,
}

impl RevealTimers {
    /// Create the handle and the receiver ticks arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RevealTick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                handles: Vec::new(),
            },
            rx,
        )
    }

    /// Abort every outstanding tick
    pub fn cancel_all(&mut self) {
        let count = self.outstanding();
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        if count > 0 {
            tracing::debug!(count, "Cancelled reveal timers");
        }
    }

    /// Ticks scheduled but not yet fired
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }
}

impl TickScheduler for RevealTimers {
    fn schedule(&mut self, tick: RevealTick, delay: Duration) {
        self.handles.retain(|h| !h.is_finished());

        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the session is gone; nothing to do
            let _ = tx.send(tick);
        });
        self.handles.push(task.abort_handle());
    }
}

impl Drop for RevealTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

impl std::fmt::Debug for RevealTimers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevealTimers")
            .field("outstanding", &self.outstanding())
            .finish()
    }
}
