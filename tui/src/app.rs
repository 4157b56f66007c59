//! Main Application
//!
//! The App struct manages the TUI lifecycle as a thin display client:
//! - Event loop (keyboard, mouse, resize)
//! - SessionHandle for the chat session running on its own task
//! - DisplayState folded from render ops
//!
//! Each frame drains pending render ops, then draws header, conversation,
//! input box and status bar.

use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind};
use futures::StreamExt;
use ratatui::backend::Backend;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::{Frame, Terminal};
use unicode_width::UnicodeWidthStr;

use crate::display::DisplayState;
use crate::session_worker::SessionHandle;
use crate::theme;
use crate::widgets::{Conversation, ConversationState};

/// Input box height (lines), including its top border
const INPUT_HEIGHT: u16 = 4;

/// ~30 FPS keeps the word reveal smooth
const FRAME_DURATION: Duration = Duration::from_millis(33);

/// Rows scrolled per mouse wheel notch
const WHEEL_ROWS: usize = 3;

/// Main application state
pub struct App {
    // === Core State ===
    /// Is the app still running?
    running: bool,

    // === Session Integration ===
    /// Handle to the session worker
    session: SessionHandle,
    /// Display state derived from render ops
    display: DisplayState,

    // === Input State ===
    /// User input buffer
    input_buffer: String,
    /// Conversation scroll state
    conversation: ConversationState,

    // === Misc State ===
    /// Frames drawn so far (drives the loading dots)
    frame: u64,
    /// Endpoint shown in the status bar
    endpoint: String,
}

impl App {
    /// Wrap a running session worker
    pub fn new(session: SessionHandle, display: DisplayState, endpoint: impl Into<String>) -> Self {
        Self {
            running: true,
            session,
            display,
            input_buffer: String::new(),
            conversation: ConversationState::default(),
            frame: 0,
            endpoint: endpoint.into(),
        }
    }

    /// Current display state
    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    /// Text typed but not yet sent
    pub fn input(&self) -> &str {
        &self.input_buffer
    }

    /// Whether the event loop should keep going
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Main event loop
    ///
    /// # Errors
    ///
    /// Terminal draw failures.
    pub async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()> {
        let mut event_stream = EventStream::new();

        self.render(terminal)?;

        while self.running {
            let frame_start = Instant::now();

            tokio::select! {
                biased;

                maybe_event = event_stream.next() => {
                    match maybe_event {
                        Some(Ok(event)) => self.handle_event(&event),
                        Some(Err(e)) => tracing::warn!(error = %e, "Terminal event error"),
                        None => self.running = false,
                    }
                }

                () = tokio::time::sleep(FRAME_DURATION) => {}
            }

            self.process_render_ops();
            self.render(terminal)?;

            let elapsed = frame_start.elapsed();
            if elapsed < FRAME_DURATION {
                tokio::time::sleep(FRAME_DURATION - elapsed).await;
            }
        }

        Ok(())
    }

    /// Fold all pending render ops into the display state
    pub fn process_render_ops(&mut self) {
        for op in self.session.recv_all() {
            self.display.apply(&op);
        }
    }

    /// Dispatch one terminal event
    pub fn handle_event(&mut self, event: &Event) {
        match event {
            // Only handle Press events (not Release or Repeat)
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(*key),
            Event::Mouse(mouse) => match mouse.kind {
                MouseEventKind::ScrollUp => self.conversation.scroll_up(WHEEL_ROWS),
                MouseEventKind::ScrollDown => self.conversation.scroll_down(WHEEL_ROWS),
                _ => {}
            },
            _ => {}
        }
    }

    /// Handle keyboard input
    pub fn handle_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            // Quit
            KeyCode::Esc => self.running = false,
            KeyCode::Char('c') if ctrl => self.running = false,

            // Chat controls
            KeyCode::Char('l') if ctrl => {
                if self.session.clear().is_err() {
                    self.running = false;
                }
                self.conversation.scroll_to_bottom();
            }
            KeyCode::Char('r') if ctrl => {
                self.display.toggle_reasoning();
            }
            KeyCode::Char('o') if ctrl => {
                self.display.toggle_sources();
            }

            // Submit message
            KeyCode::Enter => self.submit(),

            // Typing
            KeyCode::Char(c) if !ctrl => self.input_buffer.push(c),
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }

            // Conversation scrolling
            KeyCode::PageUp => {
                let page = self.conversation.page();
                self.conversation.scroll_up(page);
            }
            KeyCode::PageDown => {
                let page = self.conversation.page();
                self.conversation.scroll_down(page);
            }

            _ => {}
        }
    }

    fn submit(&mut self) {
        if self.input_buffer.trim().is_empty() || self.display.is_busy() {
            return;
        }
        let message = std::mem::take(&mut self.input_buffer);
        if self.session.send_message(message).is_err() {
            tracing::error!("Session worker stopped; exiting");
            self.running = false;
        }
        self.conversation.scroll_to_bottom();
    }

    /// Render the UI
    fn render<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()> {
        self.frame = self.frame.wrapping_add(1);
        terminal.draw(|frame| self.draw(frame))?;
        Ok(())
    }

    /// Draw one frame
    pub fn draw(&mut self, frame: &mut Frame) {
        let [header, body, input, status] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(INPUT_HEIGHT),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        self.draw_header(frame, header);

        let lines = self.display.lines(self.frame);
        let inner = Rect {
            x: body.x + 1,
            width: body.width.saturating_sub(2),
            ..body
        };
        frame.render_stateful_widget(Conversation::new(&lines), inner, &mut self.conversation);

        self.draw_input(frame, input);
        self.draw_status(frame, status);
    }

    fn draw_header(&self, frame: &mut Frame, area: Rect) {
        let title = format!(" {}", self.display.company_name);
        let hint = "Esc to quit ";
        let pad = usize::from(area.width)
            .saturating_sub(title.width() + hint.width());
        let line = Line::from(vec![
            Span::raw(title),
            Span::raw(" ".repeat(pad)),
            Span::styled(hint, Style::default().fg(theme::DIM_GRAY).bg(theme::HEADER_BG)),
        ]);
        frame.render_widget(Paragraph::new(line).style(theme::header()), area);
    }

    fn draw_input(&self, frame: &mut Frame, area: Rect) {
        let placeholder = self.input_buffer.is_empty();
        let text = if placeholder {
            "Type your message...".to_string()
        } else {
            format!("{}_", self.input_buffer)
        };
        let style = if placeholder {
            Style::default().fg(theme::DIM_GRAY)
        } else {
            Style::default().fg(theme::USER_GREEN)
        };

        // Keep the tail of long input visible
        let width = usize::from(area.width.saturating_sub(2)).max(1);
        let rows = usize::from(area.height.saturating_sub(1)).max(1);
        let wrapped = textwrap::wrap(&text, width);
        let skip = wrapped.len().saturating_sub(rows);
        let visible: Vec<Line> = wrapped
            .into_iter()
            .skip(skip)
            .map(|row| Line::styled(row.into_owned(), style))
            .collect();

        let block = Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(theme::BORDER_GRAY));
        frame.render_widget(Paragraph::new(visible).block(block), area);
    }

    fn draw_status(&self, frame: &mut Frame, area: Rect) {
        let state = if self.display.loading {
            "Waiting"
        } else if self.display.crawling {
            "Analyzing"
        } else {
            "Ready"
        };
        let scroll = if self.conversation.scroll_offset > 0 {
            format!(" [^{} rows - PgDn to scroll]", self.conversation.scroll_offset)
        } else {
            String::new()
        };
        let status = format!(
            " {state} | {} | Enter send | Ctrl-L clear | Ctrl-R reasoning | Ctrl-O sources{scroll}",
            self.endpoint
        );
        frame.render_widget(
            Paragraph::new(status).style(Style::default().fg(theme::DIM_GRAY)),
            area,
        );
    }

    /// Stop the session worker
    pub fn shutdown(self) {
        self.session.shutdown();
    }
}

/// Restore the terminal even when the loop fails
///
/// # Errors
///
/// Terminal setup and draw failures.
pub async fn run_terminal(mut app: App) -> anyhow::Result<()> {
    let mut terminal = ratatui::init();
    crossterm::execute!(io::stdout(), crossterm::event::EnableMouseCapture)?;

    let result = app.run(&mut terminal).await;

    if let Err(e) = crossterm::execute!(io::stdout(), crossterm::event::DisableMouseCapture) {
        tracing::warn!(error = %e, "Failed to disable mouse capture");
    }
    ratatui::restore();
    app.shutdown();
    result
}
