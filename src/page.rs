//! Page parsing.
//!
//! Parses a markdown page into a flat list of content blocks for the
//! content pane, plus the heading list the sidebar outline and the
//! current-heading tracker work from. Every heading gets a URL-safe
//! anchor slug, deduplicated within the page; headings whose text
//! slugifies to nothing carry an empty anchor and never appear in the
//! outline.

use std::collections::HashMap;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// The kind of a top-level content block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    Heading(u8),
    CodeBlock { language: Option<String> },
    List,
    BlockQuote,
    ThematicBreak,
    HtmlBlock,
    Table,
}

/// A top-level content block in the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlock {
    pub kind: BlockKind,
    /// Flattened text content of the block.
    pub content: String,
}

/// A heading extracted from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHeading {
    /// Heading level (1–6).
    pub level: u8,
    /// Rendered heading content; may contain search-highlight wrappers
    /// the generator's search inserted as inline markup.
    pub text: String,
    /// URL-safe anchor slug, deduplicated within the page. Empty when
    /// the heading has no sluggable text.
    pub anchor: String,
}

/// The fully parsed representation of one page.
#[derive(Debug, Clone)]
pub struct PageDocument {
    pub blocks: Vec<ContentBlock>,
    pub headings: Vec<PageHeading>,
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn heading_level_to_u8(level: &HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Convert heading text to a URL-safe anchor slug.
///
/// Lowercase, spaces/hyphens/underscores mapped to `-`, everything else
/// non-alphanumeric dropped, consecutive hyphens collapsed, leading and
/// trailing hyphens trimmed.
fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if c == ' ' || c == '-' || c == '_' {
            if !slug.ends_with('-') {
                slug.push('-');
            }
        }
    }
    slug.trim_matches('-').to_owned()
}

/// Returns `true` for block-level tags (as opposed to inline spans).
fn is_block_level(tag: &Tag) -> bool {
    !matches!(
        tag,
        Tag::Emphasis | Tag::Strong | Tag::Strikethrough | Tag::Link { .. } | Tag::Image { .. }
    )
}

fn is_block_level_end(tag: &TagEnd) -> bool {
    !matches!(
        tag,
        TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link | TagEnd::Image
    )
}

/// Map a *top-level* block tag to its [`BlockKind`].
fn tag_to_block_kind(tag: &Tag) -> Option<BlockKind> {
    match tag {
        Tag::Paragraph => Some(BlockKind::Paragraph),
        Tag::Heading { level, .. } => Some(BlockKind::Heading(heading_level_to_u8(level))),
        Tag::CodeBlock(kind) => {
            let language = match kind {
                CodeBlockKind::Fenced(info) => info
                    .split_whitespace()
                    .next()
                    .filter(|token| !token.is_empty())
                    .map(|token| token.to_owned()),
                CodeBlockKind::Indented => None,
            };
            Some(BlockKind::CodeBlock { language })
        }
        Tag::BlockQuote(..) => Some(BlockKind::BlockQuote),
        Tag::List(_) => Some(BlockKind::List),
        Tag::Table(_) => Some(BlockKind::Table),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a markdown page into a [`PageDocument`].
pub fn parse(source: &str) -> PageDocument {
    let options =
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let parser = Parser::new_ext(source, options);

    let mut blocks: Vec<ContentBlock> = Vec::new();
    let mut headings: Vec<PageHeading> = Vec::new();

    // Block tracking
    let mut block_depth: usize = 0;
    let mut current_block: Option<BlockKind> = None;
    let mut text_buf = String::new();

    // Heading tracking: `heading_text_buf` keeps inline markup so the
    // outline can see (and strip) search-highlight wrappers, while
    // `heading_plain_buf` is markup-free for the slug.
    let mut in_heading: Option<u8> = None;
    let mut heading_text_buf = String::new();
    let mut heading_plain_buf = String::new();

    // Per-page slug deduplication: base slug → occurrences seen so far.
    let mut slug_counter: HashMap<String, usize> = HashMap::new();

    for event in parser {
        match &event {
            Event::Start(tag) => {
                if is_block_level(tag) {
                    if block_depth == 0 {
                        if let Some(kind) = tag_to_block_kind(tag) {
                            current_block = Some(kind);
                            text_buf.clear();
                        }
                    }
                    // Newlines between list items / table rows keep the
                    // flattened content readable.
                    if block_depth >= 1
                        && matches!(tag, Tag::Item | Tag::TableRow)
                        && !text_buf.is_empty()
                        && !text_buf.ends_with('\n')
                    {
                        text_buf.push('\n');
                    }
                    block_depth += 1;
                }

                if let Tag::Heading { level, .. } = tag {
                    in_heading = Some(heading_level_to_u8(level));
                    heading_text_buf.clear();
                    heading_plain_buf.clear();
                }
            }

            Event::End(tag_end) => {
                if is_block_level_end(tag_end) {
                    block_depth = block_depth.saturating_sub(1);
                    if block_depth == 0 {
                        if let Some(kind) = current_block.take() {
                            blocks.push(ContentBlock {
                                kind,
                                content: text_buf.clone(),
                            });
                        }
                        text_buf.clear();
                    }
                }

                if let TagEnd::Heading(_) = tag_end {
                    if let Some(level) = in_heading.take() {
                        let base_slug = slugify(&heading_plain_buf);
                        let anchor = if base_slug.is_empty() {
                            String::new()
                        } else {
                            let count = slug_counter.entry(base_slug.clone()).or_insert(0);
                            let anchor = if *count == 0 {
                                base_slug.clone()
                            } else {
                                format!("{}-{}", base_slug, *count)
                            };
                            *count += 1;
                            anchor
                        };
                        headings.push(PageHeading {
                            level,
                            text: heading_text_buf.clone(),
                            anchor,
                        });
                    }
                }
            }

            Event::Text(text) => {
                text_buf.push_str(text);
                if in_heading.is_some() {
                    heading_text_buf.push_str(text);
                    heading_plain_buf.push_str(text);
                }
            }

            Event::Code(code) => {
                text_buf.push_str(code);
                if in_heading.is_some() {
                    heading_text_buf.push_str(code);
                    heading_plain_buf.push_str(code);
                }
            }

            Event::SoftBreak | Event::HardBreak => {
                text_buf.push('\n');
                if in_heading.is_some() {
                    heading_text_buf.push(' ');
                    heading_plain_buf.push(' ');
                }
            }

            Event::Html(html) => {
                if block_depth == 0 {
                    blocks.push(ContentBlock {
                        kind: BlockKind::HtmlBlock,
                        content: html.to_string(),
                    });
                } else {
                    text_buf.push_str(html);
                }
            }

            Event::InlineHtml(html) => {
                text_buf.push_str(html);
                if in_heading.is_some() {
                    // Kept in the display text (so highlight wrappers can
                    // be stripped downstream) but never in the slug.
                    heading_text_buf.push_str(html);
                }
            }

            Event::Rule => {
                blocks.push(ContentBlock {
                    kind: BlockKind::ThematicBreak,
                    content: String::new(),
                });
            }

            _ => {}
        }
    }

    PageDocument { blocks, headings }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
