//! Session Worker
//!
//! Runs the [`ChatSession`] on its own task so the UI loop never awaits the
//! network or reveal timers.
//!
//! # Architecture
//!
//! The TUI is a thin client. The worker owns the session and its timers:
//! 1. The UI sends a [`SessionCommand`]
//! 2. The worker starts or clears a turn and keeps advancing it
//! 3. Every render callback crosses back as a [`RenderOp`]
//! 4. The UI folds ops into its display state each frame

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use navian_core::{ChannelSink, ChatSession, ChatTransport, RenderOp, SessionError};

/// What the UI can ask of the session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    /// Send a user message
    Send(String),
    /// Forget the conversation
    Clear,
}

/// The worker task is gone
#[derive(Debug, Error)]
#[error("session worker has stopped")]
pub struct WorkerStopped;

/// UI-side handle to a running session worker
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    ops: mpsc::UnboundedReceiver<RenderOp>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Move `session` onto a new task
    pub fn spawn<T>(session: ChatSession<T>) -> Self
    where
        T: ChatTransport + 'static,
    {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (sink, ops) = ChannelSink::new();
        let task = tokio::spawn(run(session, command_rx, sink));
        Self {
            commands,
            ops,
            task,
        }
    }

    /// Send a user message
    ///
    /// # Errors
    ///
    /// [`WorkerStopped`] if the worker task has ended.
    pub fn send_message(&self, content: String) -> Result<(), WorkerStopped> {
        self.commands
            .send(SessionCommand::Send(content))
            .map_err(|_| WorkerStopped)
    }

    /// Clear the conversation
    ///
    /// # Errors
    ///
    /// [`WorkerStopped`] if the worker task has ended.
    pub fn clear(&self) -> Result<(), WorkerStopped> {
        self.commands
            .send(SessionCommand::Clear)
            .map_err(|_| WorkerStopped)
    }

    /// Receive all pending ops (non-blocking)
    pub fn recv_all(&mut self) -> Vec<RenderOp> {
        let mut ops = Vec::new();
        while let Ok(op) = self.ops.try_recv() {
            ops.push(op);
        }
        ops
    }

    /// Stop the worker, cancelling any turn in flight
    pub fn shutdown(self) {
        self.task.abort();
    }
}

enum Step {
    Command(Option<SessionCommand>),
    Advanced,
}

async fn run<T>(
    mut session: ChatSession<T>,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    mut sink: ChannelSink,
) where
    T: ChatTransport,
{
    tracing::debug!(session_id = %session.session_id(), "Session worker started");

    loop {
        let step = if session.is_turn_active() {
            tokio::select! {
                biased;
                command = commands.recv() => Step::Command(command),
                _ = session.advance(&mut sink) => Step::Advanced,
            }
        } else {
            Step::Command(commands.recv().await)
        };

        match step {
            Step::Advanced => {}
            Step::Command(None) => break,
            Step::Command(Some(SessionCommand::Send(content))) => {
                match session.begin_turn(&content, &mut sink).await {
                    Ok(turn) => tracing::debug!(%turn, "Turn started"),
                    Err(SessionError::EmptyMessage) => {}
                    Err(e @ SessionError::Busy) => {
                        tracing::warn!(error = %e, "Message dropped");
                    }
                }
            }
            Step::Command(Some(SessionCommand::Clear)) => session.clear(&mut sink),
        }
    }

    tracing::debug!("Session worker stopped");
}
