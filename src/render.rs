//! Markdown rendering module.
//!
//! Converts a [`PageDocument`] into styled ratatui [`Text`] for display
//! in the content pane. Alongside the text, the renderer records which
//! line range each heading occupies so the current-header tracker can map
//! scroll positions back to headings.

use std::sync::OnceLock;

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
};
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::SyntaxSet;

use crate::page::{BlockKind, ContentBlock, PageDocument};

/// Line range one heading occupies in the rendered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadingPosition {
    /// Index into the document's heading list.
    pub heading_index: usize,
    /// First rendered line of the heading (inclusive).
    pub top_line: usize,
    /// One past the heading's last rendered line.
    pub bottom_line: usize,
}

/// A fully rendered page: styled text plus heading geometry.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub text: Text<'static>,
    pub headings: Vec<HeadingPosition>,
}

impl RenderedPage {
    /// Total rendered height in lines.
    pub fn height(&self) -> usize {
        self.text.lines.len()
    }
}

/// Render a parsed page into styled [`Text`] ready for display.
///
/// The caller is responsible for clipping to the viewport height.
pub fn render_document(doc: &PageDocument) -> RenderedPage {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut headings: Vec<HeadingPosition> = Vec::new();
    // Heading blocks appear in the same order as the document's heading
    // list, so a running counter correlates the two.
    let mut heading_index = 0usize;

    for (i, block) in doc.blocks.iter().enumerate() {
        if i > 0 {
            // Blank line between blocks
            lines.push(Line::default());
        }
        if let BlockKind::Heading(level) = block.kind {
            let top_line = lines.len();
            render_heading(level, &block.content, &mut lines);
            headings.push(HeadingPosition {
                heading_index,
                top_line,
                bottom_line: lines.len(),
            });
            heading_index += 1;
        } else {
            render_block(block, &mut lines);
        }
    }

    RenderedPage {
        text: Text::from(lines),
        headings,
    }
}

fn render_block(block: &ContentBlock, lines: &mut Vec<Line<'static>>) {
    match &block.kind {
        BlockKind::Heading(level) => render_heading(*level, &block.content, lines),
        BlockKind::Paragraph => render_paragraph(&block.content, lines),
        BlockKind::CodeBlock { language } => {
            render_code_block(&block.content, language.as_deref(), lines)
        }
        BlockKind::List => render_list(&block.content, lines),
        BlockKind::BlockQuote => render_block_quote(&block.content, lines),
        BlockKind::ThematicBreak => render_thematic_break(lines),
        BlockKind::HtmlBlock => render_paragraph(&block.content, lines),
        BlockKind::Table => render_table(&block.content, lines),
    }
}

pub fn heading_style(level: u8) -> Style {
    let base = Style::default().add_modifier(Modifier::BOLD);
    match level {
        1 => base.fg(Color::Magenta),
        2 => base.fg(Color::Cyan),
        3 => base.fg(Color::Green),
        4 => base.fg(Color::Yellow),
        _ => base.fg(Color::White),
    }
}

fn heading_prefix(level: u8) -> &'static str {
    match level {
        1 => "# ",
        2 => "## ",
        3 => "### ",
        4 => "#### ",
        5 => "##### ",
        6 => "###### ",
        _ => "# ",
    }
}

fn render_heading(level: u8, content: &str, lines: &mut Vec<Line<'static>>) {
    let style = heading_style(level);
    let prefix = heading_prefix(level);
    // Search-highlight wrappers are markup, not display text.
    let content = content.replace("<mark>", "").replace("</mark>", "");
    for text_line in content.lines() {
        lines.push(Line::from(Span::styled(
            format!("{prefix}{text_line}"),
            style,
        )));
    }
}

fn render_paragraph(content: &str, lines: &mut Vec<Line<'static>>) {
    for text_line in content.lines() {
        lines.push(Line::from(Span::raw(text_line.to_owned())));
    }
}

fn syntax_set() -> &'static SyntaxSet {
    static SET: OnceLock<SyntaxSet> = OnceLock::new();
    SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn code_theme() -> &'static Theme {
    static THEME: OnceLock<Theme> = OnceLock::new();
    THEME.get_or_init(|| {
        let mut themes = ThemeSet::load_defaults();
        themes
            .themes
            .remove("base16-ocean.dark")
            .expect("default theme set includes base16-ocean.dark")
    })
}

/// Syntax-highlight one line of code, falling back to a single plain span
/// when highlighting fails.
fn highlight_line(highlighter: &mut HighlightLines, text_line: &str) -> Vec<Span<'static>> {
    let plain = Style::default().fg(Color::Green).bg(Color::Black);
    match highlighter.highlight_line(text_line, syntax_set()) {
        Ok(regions) => regions
            .into_iter()
            .map(|(style, fragment)| {
                let fg = style.foreground;
                Span::styled(
                    fragment.to_owned(),
                    Style::default().fg(Color::Rgb(fg.r, fg.g, fg.b)),
                )
            })
            .collect(),
        Err(_) => vec![Span::styled(text_line.to_owned(), plain)],
    }
}

fn render_code_block(content: &str, language: Option<&str>, lines: &mut Vec<Line<'static>>) {
    let border_style = Style::default().fg(Color::DarkGray);
    let code_style = Style::default().fg(Color::Green).bg(Color::Black);

    let mut highlighter = language
        .and_then(|lang| syntax_set().find_syntax_by_token(lang))
        .map(|syntax| HighlightLines::new(syntax, code_theme()));

    lines.push(Line::from(Span::styled("┌───", border_style)));
    for text_line in content.lines() {
        let mut spans = vec![Span::styled("│ ", border_style)];
        match highlighter.as_mut() {
            Some(h) => spans.extend(highlight_line(h, text_line)),
            None => spans.push(Span::styled(text_line.to_owned(), code_style)),
        }
        lines.push(Line::from(spans));
    }
    lines.push(Line::from(Span::styled("└───", border_style)));
}

fn render_list(content: &str, lines: &mut Vec<Line<'static>>) {
    let bullet_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    for text_line in content.lines() {
        let trimmed = text_line.trim();
        if !trimmed.is_empty() {
            lines.push(Line::from(vec![
                Span::styled("  • ", bullet_style),
                Span::raw(trimmed.to_owned()),
            ]));
        }
    }
}

fn render_block_quote(content: &str, lines: &mut Vec<Line<'static>>) {
    let bar_style = Style::default().fg(Color::DarkGray);
    let text_style = Style::default().add_modifier(Modifier::ITALIC).fg(Color::Gray);
    for text_line in content.lines() {
        lines.push(Line::from(vec![
            Span::styled("  ▌ ", bar_style),
            Span::styled(text_line.to_owned(), text_style),
        ]));
    }
}

fn render_thematic_break(lines: &mut Vec<Line<'static>>) {
    let style = Style::default().fg(Color::DarkGray);
    lines.push(Line::from(Span::styled(
        "────────────────────────────────────────",
        style,
    )));
}

fn render_table(content: &str, lines: &mut Vec<Line<'static>>) {
    let style = Style::default().fg(Color::White);
    for text_line in content.lines() {
        let trimmed = text_line.trim();
        if !trimmed.is_empty() {
            lines.push(Line::from(Span::styled(format!("  {trimmed}"), style)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page;

    fn joined(text: &Text<'_>) -> String {
        text.lines
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn heading_levels_styled() {
        let doc = page::parse("# H1\n\n## H2\n\n### H3\n");
        let rendered = render_document(&doc);
        assert!(!rendered.text.lines.is_empty());
        let first = &rendered.text.lines[0];
        assert!(first.to_string().contains("# H1"));
    }

    #[test]
    fn heading_positions_track_line_ranges() {
        let doc = page::parse("# Top\n\npara one\npara two\n\n## Next\n");
        let rendered = render_document(&doc);
        assert_eq!(rendered.headings.len(), 2);

        let first = rendered.headings[0];
        assert_eq!(first.heading_index, 0);
        assert_eq!(first.top_line, 0);
        assert_eq!(first.bottom_line, 1);

        let second = rendered.headings[1];
        assert_eq!(second.heading_index, 1);
        assert!(rendered.text.lines[second.top_line]
            .to_string()
            .contains("## Next"));
        assert_eq!(second.bottom_line, second.top_line + 1);
    }

    #[test]
    fn code_block_has_borders() {
        let doc = page::parse("```\nhello\n```\n");
        let rendered = render_document(&doc);
        let joined = joined(&rendered.text);
        assert!(joined.contains("┌"));
        assert!(joined.contains("hello"));
        assert!(joined.contains("└"));
    }

    #[test]
    fn known_language_highlights_into_spans() {
        let doc = page::parse("```rust\nfn main() {}\n```\n");
        let rendered = render_document(&doc);
        // Border top, one code line, border bottom.
        assert_eq!(rendered.text.lines.len(), 3);
        let code_line = &rendered.text.lines[1];
        // The gutter span plus at least one highlighted fragment.
        assert!(code_line.spans.len() > 2);
        assert!(code_line.to_string().contains("fn main"));
    }

    #[test]
    fn unknown_language_falls_back_to_plain() {
        let doc = page::parse("```nosuchlang\nabc def\n```\n");
        let rendered = render_document(&doc);
        let code_line = &rendered.text.lines[1];
        assert_eq!(code_line.spans.len(), 2);
        assert!(code_line.to_string().contains("abc def"));
    }

    #[test]
    fn list_has_bullets() {
        let doc = page::parse("- alpha\n- beta\n");
        let rendered = render_document(&doc);
        let joined = joined(&rendered.text);
        assert!(joined.contains("•"));
        assert!(joined.contains("alpha"));
        assert!(joined.contains("beta"));
    }

    #[test]
    fn block_quote_has_bar() {
        let doc = page::parse("> quoted\n");
        let rendered = render_document(&doc);
        let joined = joined(&rendered.text);
        assert!(joined.contains("▌"));
        assert!(joined.contains("quoted"));
    }

    #[test]
    fn thematic_break_renders() {
        let doc = page::parse("above\n\n---\n\nbelow\n");
        let rendered = render_document(&doc);
        assert!(joined(&rendered.text).contains("────"));
    }

    #[test]
    fn highlight_marks_stripped_from_headings() {
        let doc = page::parse("## Find <mark>needle</mark> fast\n");
        let rendered = render_document(&doc);
        let joined = joined(&rendered.text);
        assert!(joined.contains("Find needle fast"));
        assert!(!joined.contains("<mark>"));
    }

    #[test]
    fn empty_document_renders() {
        let doc = page::parse("");
        let rendered = render_document(&doc);
        assert!(rendered.text.lines.is_empty());
        assert!(rendered.headings.is_empty());
        assert_eq!(rendered.height(), 0);
    }
}
