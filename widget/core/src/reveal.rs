//! Word-by-word Reveal
//!
//! The artificial typing animation applied to reasoning steps. This module is
//! pure state: it knows which words are visible, never when the next one is
//! due. Scheduling lives in [`crate::timers`].

use std::time::Duration;

use rand::Rng;

/// Per-word delay range for reveal animations
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RevealTiming {
    /// Inclusive lower bound
    pub min: Duration,
    /// Exclusive upper bound
    pub max: Duration,
}

impl Default for RevealTiming {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(80),
            max: Duration::from_millis(120),
        }
    }
}

impl RevealTiming {
    /// Build from millisecond bounds
    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min: Duration::from_millis(min_ms),
            max: Duration::from_millis(max_ms),
        }
    }

    /// Draw one per-word delay uniformly from `[min, max)`
    ///
    /// Degenerate ranges (`min >= max`) always return `min`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min >= self.max {
            return self.min;
        }
        rng.gen_range(self.min..self.max)
    }
}

/// Progress of one reveal
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WordReveal {
    words: Vec<String>,
    revealed: usize,
    visible: String,
}

impl WordReveal {
    /// Split `text` on single spaces; nothing is visible yet
    pub fn new(text: &str) -> Self {
        Self {
            words: text.split(' ').map(str::to_string).collect(),
            revealed: 0,
            visible: String::new(),
        }
    }

    /// Reveal one more word and return the visible prefix
    ///
    /// Calling this once finished is a no-op.
    pub fn advance(&mut self) -> &str {
        if let Some(word) = self.words.get(self.revealed) {
            if self.revealed > 0 {
                self.visible.push(' ');
            }
            self.visible.push_str(word);
            self.revealed += 1;
        }
        &self.visible
    }

    /// Jump straight to the full text
    pub fn snap(&mut self) -> &str {
        if !self.is_finished() {
            self.revealed = self.words.len();
            self.visible = self.words.join(" ");
        }
        &self.visible
    }

    /// Currently visible prefix
    #[must_use]
    pub fn visible(&self) -> &str {
        &self.visible
    }

    /// Whether every word is visible
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.revealed >= self.words.len()
    }

    /// Words visible so far
    #[must_use]
    pub fn revealed_count(&self) -> usize {
        self.revealed
    }

    /// Total words
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// The text this reveal ends on
    #[must_use]
    pub fn full_text(&self) -> String {
        self.words.join(" ")
    }
}
