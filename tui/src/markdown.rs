//! Markdown Answers
//!
//! Answers arrive as markdown (GitHub flavored, single newlines are line
//! breaks). This module turns them into [`StyledLine`]s: inline emphasis,
//! code and links become marks, lists get bullets, tables get aligned
//! columns.
//!
//! Parsing never fails, but a snapshot that yields nothing visible (a lone
//! link reference definition, say) falls back to its raw lines so the reader
//! always sees what the backend sent.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use ratatui::style::{Modifier, Style};
use unicode_width::UnicodeWidthStr;

use crate::theme;
use crate::widgets::{Mark, StyledLine};

/// Columns of indent per list level
const LIST_INDENT: u16 = 2;

/// Width of a horizontal rule
const RULE_WIDTH: usize = 24;

/// Render answer text, falling back to plain lines
#[must_use]
pub fn render_answer(text: &str) -> Vec<StyledLine> {
    let lines = MarkdownRenderer::new(answer_style()).render(text);
    if lines.iter().all(|l| l.text.trim().is_empty()) && !text.trim().is_empty() {
        tracing::debug!("Markdown produced no visible text, showing raw answer");
        return plain_lines(text);
    }
    lines
}

/// One styled line per source line, no formatting
#[must_use]
pub fn plain_lines(text: &str) -> Vec<StyledLine> {
    text.lines()
        .map(|line| StyledLine::new(line, answer_style()))
        .collect()
}

fn answer_style() -> Style {
    Style::default().fg(theme::ANSWER_FG)
}

/// Markdown to styled lines
#[derive(Debug, Clone, Copy)]
pub struct MarkdownRenderer {
    base: Style,
}

impl MarkdownRenderer {
    /// Renderer drawing body text in `base`
    pub fn new(base: Style) -> Self {
        Self { base }
    }

    /// Render `markdown` to lines
    #[must_use]
    pub fn render(&self, markdown: &str) -> Vec<StyledLine> {
        let mut state = RenderState::new(self.base);
        for event in Parser::new_ext(markdown, Self::options()) {
            state.handle_event(event);
        }
        state.finish()
    }

    fn options() -> Options {
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS
    }
}

// ============================================================================
// Render state
// ============================================================================

#[derive(Debug)]
struct ListLevel {
    next_number: Option<u64>,
}

#[derive(Debug, Default)]
struct TableState {
    rows: Vec<Vec<String>>,
    cell: String,
    header_rows: usize,
}

struct RenderState {
    base: Style,
    lines: Vec<StyledLine>,

    text: String,
    marks: Vec<Mark>,
    line_style: Style,
    indent: u16,

    style_stack: Vec<Style>,
    list_stack: Vec<ListLevel>,
    quote_depth: u16,
    in_code_block: bool,
    link_url: Option<String>,
    table: Option<TableState>,
    needs_blank: bool,
}

impl RenderState {
    fn new(base: Style) -> Self {
        Self {
            base,
            lines: Vec::new(),
            text: String::new(),
            marks: Vec::new(),
            line_style: base,
            indent: 0,
            style_stack: Vec::new(),
            list_stack: Vec::new(),
            quote_depth: 0,
            in_code_block: false,
            link_url: None,
            table: None,
            needs_blank: false,
        }
    }

    fn handle_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.handle_text(&text),
            Event::Code(code) | Event::InlineMath(code) | Event::DisplayMath(code) => {
                self.push_styled(&code, Style::default().fg(theme::CODE_FG));
            }
            // Single newlines are line breaks in answers
            Event::SoftBreak | Event::HardBreak => self.flush_line(),
            Event::Rule => {
                self.flush_line();
                self.block_gap();
                self.lines.push(StyledLine::new(
                    "─".repeat(RULE_WIDTH),
                    Style::default().fg(theme::BORDER_GRAY),
                ));
                self.needs_blank = true;
            }
            Event::TaskListMarker(checked) => {
                self.push_plain(if checked { "[x] " } else { "[ ] " });
            }
            Event::Html(html) | Event::InlineHtml(html) => self.handle_text(&html),
            Event::FootnoteReference(_) => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if self.list_stack.is_empty() {
                    self.block_gap();
                }
            }
            Tag::Heading { .. } => {
                self.block_gap();
                self.line_style = self.base.patch(theme::markdown_heading());
            }
            Tag::CodeBlock(_) => {
                self.flush_line();
                self.block_gap();
                self.in_code_block = true;
            }
            Tag::List(start) => {
                self.flush_line();
                if self.list_stack.is_empty() {
                    self.block_gap();
                }
                self.list_stack.push(ListLevel { next_number: start });
            }
            Tag::Item => {
                self.flush_line();
                let depth = u16::try_from(self.list_stack.len().saturating_sub(1)).unwrap_or(0);
                self.indent = self.quote_indent() + depth * LIST_INDENT;
                let bullet = match self.list_stack.last_mut() {
                    Some(ListLevel {
                        next_number: Some(n),
                    }) => {
                        let bullet = format!("{n}. ");
                        *n += 1;
                        bullet
                    }
                    _ => "• ".to_string(),
                };
                self.push_plain(&bullet);
            }
            Tag::BlockQuote(_) => {
                self.flush_line();
                if self.quote_depth == 0 {
                    self.block_gap();
                }
                self.quote_depth += 1;
                self.indent = self.quote_indent();
            }
            Tag::Emphasis => self.style_stack.push(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.style_stack.push(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => self
                .style_stack
                .push(Style::default().add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link { dest_url, .. } => {
                self.link_url = Some(dest_url.to_string());
                self.style_stack.push(
                    Style::default()
                        .fg(theme::LINK_BLUE)
                        .add_modifier(Modifier::UNDERLINED),
                );
            }
            Tag::Table(_) => {
                self.flush_line();
                self.block_gap();
                self.table = Some(TableState::default());
            }
            Tag::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    table.cell.clear();
                }
            }
            Tag::TableHead | Tag::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    table.rows.push(Vec::new());
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                self.flush_line();
                if self.list_stack.is_empty() {
                    self.needs_blank = true;
                }
            }
            TagEnd::Heading(_) => {
                self.flush_line();
                self.line_style = self.base;
                self.needs_blank = true;
            }
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                self.needs_blank = true;
            }
            TagEnd::List(_) => {
                self.flush_line();
                self.list_stack.pop();
                if self.list_stack.is_empty() {
                    self.indent = self.quote_indent();
                    self.needs_blank = true;
                }
            }
            TagEnd::Item => self.flush_line(),
            TagEnd::BlockQuote(_) => {
                self.flush_line();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.indent = self.quote_indent();
                self.needs_blank = true;
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.style_stack.pop();
            }
            TagEnd::Link => {
                self.style_stack.pop();
                if let Some(url) = self.link_url.take() {
                    if !self.text.ends_with(url.as_str()) {
                        self.push_styled(&format!(" <{url}>"), Style::default().fg(theme::DIM_GRAY));
                    }
                }
            }
            TagEnd::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    let cell = std::mem::take(&mut table.cell);
                    if let Some(row) = table.rows.last_mut() {
                        row.push(cell.trim().to_string());
                    }
                }
            }
            TagEnd::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.header_rows = table.rows.len();
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    self.push_table(&table);
                }
                self.needs_blank = true;
            }
            _ => {}
        }
    }

    fn handle_text(&mut self, text: &str) {
        if let Some(table) = self.table.as_mut() {
            table.cell.push_str(text);
            return;
        }
        if self.in_code_block {
            for line in text.lines() {
                self.lines.push(StyledLine::indented(
                    line,
                    Style::default().fg(theme::CODE_FG),
                    self.indent + LIST_INDENT,
                ));
            }
            return;
        }

        // Text events may still carry newlines (HTML, breaks in tight lists)
        let mut parts = text.split('\n');
        if let Some(first) = parts.next() {
            self.push_inline(first);
        }
        for part in parts {
            self.flush_line();
            self.push_inline(part);
        }
    }

    fn push_inline(&mut self, text: &str) {
        let style = self
            .style_stack
            .iter()
            .fold(Style::default(), |acc, s| acc.patch(*s));
        self.push_styled(text, style);
    }

    fn push_plain(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn push_styled(&mut self, text: &str, style: Style) {
        if let Some(table) = self.table.as_mut() {
            table.cell.push_str(text);
            return;
        }
        let start = self.text.len();
        self.text.push_str(text);
        if style != Style::default() && !text.is_empty() {
            self.marks.push(Mark {
                range: start..self.text.len(),
                style,
            });
        }
    }

    fn flush_line(&mut self) {
        if self.text.trim().is_empty() {
            self.text.clear();
            self.marks.clear();
            return;
        }
        let line = StyledLine::indented(std::mem::take(&mut self.text), self.line_style, self.indent)
            .with_marks(std::mem::take(&mut self.marks));
        self.lines.push(line);
    }

    /// Blank line between blocks, never at the top
    fn block_gap(&mut self) {
        if self.needs_blank && !self.lines.is_empty() {
            self.lines.push(StyledLine::blank());
        }
        self.needs_blank = false;
    }

    fn quote_indent(&self) -> u16 {
        self.quote_depth * LIST_INDENT
    }

    fn push_table(&mut self, table: &TableState) {
        let columns = table.rows.iter().map(Vec::len).max().unwrap_or(0);
        let widths: Vec<usize> = (0..columns)
            .map(|c| {
                table
                    .rows
                    .iter()
                    .filter_map(|row| row.get(c))
                    .map(|cell| cell.width())
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let header = self.base.patch(theme::markdown_heading());
        for (i, row) in table.rows.iter().enumerate() {
            let cells: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(c, width)| {
                    let cell = row.get(c).map_or("", String::as_str);
                    let pad = width.saturating_sub(cell.width());
                    format!("{cell}{}", " ".repeat(pad))
                })
                .collect();
            let text = cells.join(" │ ").trim_end().to_string();
            let style = if i < table.header_rows { header } else { self.base };
            self.lines.push(StyledLine::indented(text, style, self.indent));

            if i + 1 == table.header_rows {
                let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
                self.lines.push(StyledLine::indented(
                    rule.join("─┼─"),
                    Style::default().fg(theme::BORDER_GRAY),
                    self.indent,
                ));
            }
        }
    }

    fn finish(mut self) -> Vec<StyledLine> {
        if let Some(table) = self.table.take() {
            self.push_table(&table);
        }
        self.flush_line();
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(lines: &[StyledLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    fn bold_text(line: &StyledLine) -> Vec<&str> {
        line.marks
            .iter()
            .filter(|m| m.style.add_modifier.contains(Modifier::BOLD))
            .map(|m| &line.text[m.range.clone()])
            .collect()
    }

    #[test]
    fn test_bold_becomes_a_mark() {
        let lines = render_answer("The answer is **42**.");
        assert_eq!(texts(&lines), vec!["The answer is 42."]);
        assert_eq!(bold_text(&lines[0]), vec!["42"]);
    }

    #[test]
    fn test_lists_get_bullets_and_numbers() {
        let lines = render_answer("Options:\n\n- alpha\n- beta\n  - nested\n\n1. first\n2. second");
        assert_eq!(
            texts(&lines),
            vec![
                "Options:",
                "",
                "• alpha",
                "• beta",
                "• nested",
                "",
                "1. first",
                "2. second",
            ]
        );
        assert_eq!(lines[4].indent, LIST_INDENT);
        assert_eq!(lines[2].indent, 0);
    }

    #[test]
    fn test_single_newline_is_a_break() {
        let lines = render_answer("line one\nline two");
        assert_eq!(texts(&lines), vec!["line one", "line two"]);
    }

    #[test]
    fn test_table_columns_align() {
        let lines = render_answer("| Plan | Price |\n|---|---|\n| Basic | $5 |\n| Pro | $20 |");
        assert_eq!(
            texts(&lines),
            vec![
                "Plan  │ Price",
                "──────┼──────",
                "Basic │ $5",
                "Pro   │ $20",
            ]
        );
    }

    #[test]
    fn test_heading_and_code() {
        let lines = render_answer("# Setup\n\nRun `make`:\n\n```\nmake all\n```");
        assert_eq!(texts(&lines), vec!["Setup", "", "Run make:", "", "make all"]);
        assert!(lines[0].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(lines[2].marks.len(), 1);
        assert_eq!(lines[4].indent, LIST_INDENT);
    }

    #[test]
    fn test_link_shows_target() {
        let lines = render_answer("See [docs](https://x.test).");
        assert_eq!(texts(&lines), vec!["See docs <https://x.test>."]);
    }

    #[test]
    fn test_invisible_markup_falls_back_to_raw_lines() {
        // A lone reference definition renders nothing
        let lines = render_answer("[docs]: https://x.test");
        assert_eq!(texts(&lines), vec!["[docs]: https://x.test"]);
    }
}
