//! Headless transcript output for `navian ask`.
//!
//! Reasoning is streamed to the writer word by word as it is revealed; the
//! answer and sources are printed once the turn has settled, since content
//! may be replaced several times while it streams.

use std::io::{self, Write};

use navian_core::{ReasoningStep, RenderSink, Source, CRAWLING_STATUS_TEXT};

/// Writes a plain-text transcript of one turn
pub struct TranscriptSink<W: Write> {
    out: W,
    thinking_shown: bool,
    open_step: Option<usize>,
    printed: usize,
    crawling: bool,
    content: Option<String>,
    sources: Vec<Source>,
    error: Option<String>,
    io_error: Option<io::Error>,
}

impl<W: Write> TranscriptSink<W> {
    /// Transcript written to `out`
    pub fn new(out: W) -> Self {
        Self {
            out,
            thinking_shown: false,
            open_step: None,
            printed: 0,
            crawling: false,
            content: None,
            sources: Vec::new(),
            error: None,
            io_error: None,
        }
    }

    /// The error rendered for this turn, if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Print the answer and sources, returning the writer
    ///
    /// # Errors
    ///
    /// The first write failure seen at any point of the turn.
    pub fn finish(mut self) -> io::Result<W> {
        self.close_step();
        if let Some(e) = self.io_error.take() {
            return Err(e);
        }

        if self.thinking_shown {
            writeln!(self.out)?;
        }
        if let Some(content) = &self.content {
            writeln!(self.out, "{content}")?;
        }
        if !self.sources.is_empty() {
            writeln!(self.out)?;
            writeln!(self.out, "Sources:")?;
            for source in &self.sources {
                writeln!(self.out, "  {}", source.url)?;
            }
        }
        if let Some(error) = &self.error {
            writeln!(self.out, "{error}")?;
        }
        self.out.flush()?;
        Ok(self.out)
    }

    fn write(&mut self, text: &str) {
        if self.io_error.is_some() {
            return;
        }
        let result = self
            .out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush());
        if let Err(e) = result {
            self.io_error = Some(e);
        }
    }

    fn close_step(&mut self) {
        if self.open_step.take().is_some() {
            self.write("\n");
        }
    }
}

impl<W: Write> RenderSink for TranscriptSink<W> {
    fn on_reasoning_step(&mut self, index: usize, _step: &ReasoningStep, visible: &str) {
        if self.open_step != Some(index) {
            self.close_step();
            if !self.thinking_shown {
                self.thinking_shown = true;
                self.write("Thinking...\n");
            }
            self.write("  ");
            self.open_step = Some(index);
            self.printed = 0;
        }

        // Only the newly revealed suffix is written
        if let Some(fresh) = visible.get(self.printed..) {
            let fresh = fresh.to_string();
            self.write(&fresh);
            self.printed = visible.len();
        }
    }

    fn on_content(&mut self, text: &str) {
        self.content = Some(text.to_string());
    }

    fn on_sources(&mut self, sources: &[Source]) {
        self.sources = sources.to_vec();
    }

    fn on_error(&mut self, message: &str) {
        self.error = Some(message.to_string());
    }

    fn on_crawling_status(&mut self, visible: bool) {
        if visible && !self.crawling {
            self.close_step();
            self.write(CRAWLING_STATUS_TEXT);
            self.write("\n");
        }
        self.crawling = visible;
    }

    fn on_reasoning_complete(&mut self) {
        self.close_step();
    }
}
