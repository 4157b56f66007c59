//! Conversation Widget
//!
//! A borderless, bottom-anchored scrollable region of styled lines. Lines are
//! wrapped to the area width at render time so resizes need no bookkeeping.
//! Inline styling (bold, code, links) rides along as byte-range marks and
//! survives wrapping.

use std::ops::Range;

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::StatefulWidget;
use textwrap::Options;

/// Style patched over part of a line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mark {
    /// Byte range within [`StyledLine::text`]
    pub range: Range<usize>,
    /// Patched over the line's base style
    pub style: Style,
}

/// One logical line before wrapping
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyledLine {
    /// Unwrapped text
    pub text: String,
    /// Style for every wrapped row
    pub style: Style,
    /// Columns of indent applied to every wrapped row
    pub indent: u16,
    /// Inline styles, in byte ranges of `text`
    pub marks: Vec<Mark>,
}

/// One wrapped row as consecutive styled segments
pub type Row = Vec<(String, Style)>;

impl StyledLine {
    /// Unindented line
    pub fn new(text: impl Into<String>, style: Style) -> Self {
        Self::indented(text, style, 0)
    }

    /// Indented line
    pub fn indented(text: impl Into<String>, style: Style, indent: u16) -> Self {
        Self {
            text: text.into(),
            style,
            indent,
            marks: Vec::new(),
        }
    }

    /// Empty spacer line
    pub fn blank() -> Self {
        Self::new(String::new(), Style::default())
    }

    /// Attach inline marks
    #[must_use]
    pub fn with_marks(mut self, marks: Vec<Mark>) -> Self {
        self.marks = marks;
        self
    }

    /// Effective style of the byte `at`
    #[must_use]
    pub fn style_at(&self, at: usize) -> Style {
        self.marks
            .iter()
            .filter(|m| m.range.contains(&at))
            .fold(self.style, |acc, m| acc.patch(m.style))
    }

    /// Split `range` of the text into runs of equal style
    fn segments(&self, range: Range<usize>) -> Row {
        let mut cuts = vec![range.start, range.end];
        for mark in &self.marks {
            for edge in [mark.range.start, mark.range.end] {
                if edge > range.start && edge < range.end {
                    cuts.push(edge);
                }
            }
        }
        cuts.sort_unstable();
        cuts.dedup();

        cuts.windows(2)
            .filter_map(|w| {
                let text = self.text.get(w[0]..w[1])?;
                (!text.is_empty()).then(|| (text.to_string(), self.style_at(w[0])))
            })
            .collect()
    }
}

/// Concatenated text of a wrapped row
#[must_use]
pub fn row_text(row: &Row) -> String {
    row.iter().map(|(text, _)| text.as_str()).collect()
}

/// Scroll state, counted in rows from the bottom (0 = latest)
#[derive(Debug, Default)]
pub struct ConversationState {
    /// Rows scrolled up from the bottom
    pub scroll_offset: usize,
    /// Wrapped rows at the last render
    pub total_rows: usize,
    /// Visible rows at the last render
    pub viewport_rows: usize,
}

impl ConversationState {
    /// Scroll towards older content
    pub fn scroll_up(&mut self, rows: usize) {
        let max = self.total_rows.saturating_sub(self.viewport_rows);
        self.scroll_offset = (self.scroll_offset + rows).min(max);
    }

    /// Scroll towards newer content
    pub fn scroll_down(&mut self, rows: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(rows);
    }

    /// Follow the latest content
    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    /// Half a viewport, at least one row
    #[must_use]
    pub fn page(&self) -> usize {
        (self.viewport_rows / 2).max(1)
    }
}

/// Wrap `lines` to `width` columns
///
/// Wrapped rows are contiguous slices of the line text, so each one is
/// located by scanning forward from the end of the previous row and cut
/// into segments at mark boundaries.
#[must_use]
pub fn wrap_lines(lines: &[StyledLine], width: usize) -> Vec<Row> {
    let mut rows = Vec::new();
    for line in lines {
        if line.text.is_empty() {
            rows.push(Vec::new());
            continue;
        }
        let indent = " ".repeat(usize::from(line.indent));
        let options = Options::new(width.max(1))
            .initial_indent(&indent)
            .subsequent_indent(&indent);

        let mut cursor = 0;
        for wrapped in textwrap::wrap(&line.text, options) {
            let body = wrapped.strip_prefix(indent.as_str()).unwrap_or(&wrapped);
            let mut row = Vec::new();
            if !indent.is_empty() {
                row.push((indent.clone(), line.style));
            }
            match line.text[cursor..].find(body) {
                Some(offset) => {
                    let start = cursor + offset;
                    cursor = start + body.len();
                    row.extend(line.segments(start..cursor));
                }
                // Hyphenation or tab expansion changed the text; keep it unmarked
                None => row.push((body.to_string(), line.style)),
            }
            rows.push(row);
        }
    }
    rows
}

/// The conversation view
pub struct Conversation<'a> {
    lines: &'a [StyledLine],
}

impl<'a> Conversation<'a> {
    /// View over pre-built lines
    pub fn new(lines: &'a [StyledLine]) -> Self {
        Self { lines }
    }
}

impl StatefulWidget for Conversation<'_> {
    type State = ConversationState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let height = usize::from(area.height);
        let rows = wrap_lines(self.lines, usize::from(area.width));

        state.total_rows = rows.len();
        state.viewport_rows = height;

        let max_scroll = state.total_rows.saturating_sub(height);
        state.scroll_offset = state.scroll_offset.min(max_scroll);

        let visible_end = state.total_rows.saturating_sub(state.scroll_offset);
        let visible_start = visible_end.saturating_sub(height);
        let more_above = visible_start > 0;
        let more_below = state.scroll_offset > 0;

        for (i, row) in rows[visible_start..visible_end].iter().enumerate() {
            // Fade the edge rows when there is more to scroll to
            let faded = if more_above && i < 2 {
                Some(Style::default().fg(fade(i)))
            } else if more_below && i + 2 >= height {
                Some(Style::default().fg(fade(height - 1 - i)))
            } else {
                None
            };

            let y = area.y + u16::try_from(i).unwrap_or(u16::MAX);
            let right = area.x.saturating_add(area.width);
            let mut x = area.x;
            for (text, style) in row {
                if x >= right {
                    break;
                }
                let remaining = usize::from(right - x);
                (x, _) = buf.set_stringn(x, y, text, remaining, faded.unwrap_or(*style));
            }
        }
    }
}

fn fade(distance_from_edge: usize) -> Color {
    if distance_from_edge == 0 {
        Color::Rgb(80, 80, 80)
    } else {
        Color::Rgb(120, 120, 120)
    }
}
