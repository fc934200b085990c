//! Navigation-tree markup parsing and link resolution.
//!
//! The documentation generator emits the full sidebar navigation as one
//! well-formed markup string (`toc.html` in the book root): an
//! `ol.chapter` of `li.chapter-item` entries, each wrapping its link in a
//! `span.chapter-link-wrapper`, with nested `ol.section` lists for
//! sub-chapters, optional `a.chapter-fold-toggle` fold controls, and
//! `li.part-title` / `li.spacer` separators. This module parses that
//! markup into a flat item list with parent indices, and provides the
//! URL helpers the sidebar needs to mark the active page.

use std::fmt;

use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::Reader;

/// File name a trailing-slash page URL aliases to.
pub const INDEX_FILE: &str = "index.md";

/// Error produced when the navigation markup cannot be parsed.
#[derive(Debug)]
pub enum TocError {
    Markup(quick_xml::Error),
}

impl fmt::Display for TocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TocError::Markup(e) => write!(f, "malformed navigation markup: {e}"),
        }
    }
}

impl std::error::Error for TocError {}

impl From<quick_xml::Error> for TocError {
    fn from(e: quick_xml::Error) -> Self {
        TocError::Markup(e)
    }
}

/// What a navigation entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKind {
    /// A chapter link (possibly with children).
    Link,
    /// An unlinked part heading.
    PartTitle,
    /// A blank separator row.
    Spacer,
}

/// One entry of the navigation tree, in document order.
#[derive(Debug, Clone)]
pub struct NavItem {
    pub kind: NavKind,
    /// Display label with whitespace collapsed (includes any section
    /// numbering the generator emitted).
    pub label: String,
    /// The href exactly as written in the markup, for `Link` items.
    pub href: Option<String>,
    /// Root-relative resolved target (filled in by the sidebar once the
    /// href has been rewritten against the page's path-to-root).
    pub resolved: Option<String>,
    /// Nesting depth; top-level chapters are depth 0.
    pub depth: usize,
    /// Index of the enclosing chapter item, if any.
    pub parent: Option<usize>,
    /// Whether the markup carried a fold toggle for this chapter.
    pub has_toggle: bool,
}

/// The parsed navigation tree, flattened in document order.
#[derive(Debug, Clone)]
pub struct NavTree {
    pub items: Vec<NavItem>,
}

fn attr_value(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn class_contains(e: &BytesStart, token: &str) -> bool {
    attr_value(e, b"class")
        .map(|classes| classes.split_whitespace().any(|t| t == token))
        .unwrap_or(false)
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Which list item a parser frame belongs to.
enum LiFrame {
    Chapter(usize),
    PartTitle(usize),
    Other,
}

/// Which anchor the parser is currently inside.
enum AnchorKind {
    Label,
    Toggle,
}

/// Parse the generator-emitted sidebar markup into a [`NavTree`].
pub fn parse_nav_markup(markup: &str) -> Result<NavTree, TocError> {
    let mut reader = Reader::from_str(markup);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    let mut items: Vec<NavItem> = Vec::new();
    // Chapter items whose `</li>` has not been seen yet; children created
    // inside a nested `ol.section` parent to the innermost entry.
    let mut open_chapters: Vec<usize> = Vec::new();
    let mut li_stack: Vec<LiFrame> = Vec::new();
    let mut in_anchor: Option<AnchorKind> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            XmlEvent::Start(e) if e.name().as_ref() == b"li" => {
                if class_contains(&e, "chapter-item") {
                    let idx = items.len();
                    items.push(NavItem {
                        kind: NavKind::Link,
                        label: String::new(),
                        href: None,
                        resolved: None,
                        depth: open_chapters.len(),
                        parent: open_chapters.last().copied(),
                        has_toggle: false,
                    });
                    open_chapters.push(idx);
                    li_stack.push(LiFrame::Chapter(idx));
                } else if class_contains(&e, "part-title") {
                    let idx = items.len();
                    items.push(NavItem {
                        kind: NavKind::PartTitle,
                        label: String::new(),
                        href: None,
                        resolved: None,
                        depth: open_chapters.len(),
                        parent: open_chapters.last().copied(),
                        has_toggle: false,
                    });
                    li_stack.push(LiFrame::PartTitle(idx));
                } else if class_contains(&e, "spacer") {
                    items.push(NavItem {
                        kind: NavKind::Spacer,
                        label: String::new(),
                        href: None,
                        resolved: None,
                        depth: open_chapters.len(),
                        parent: open_chapters.last().copied(),
                        has_toggle: false,
                    });
                    li_stack.push(LiFrame::Other);
                } else {
                    li_stack.push(LiFrame::Other);
                }
            }
            XmlEvent::Empty(e) if e.name().as_ref() == b"li" => {
                if class_contains(&e, "spacer") {
                    items.push(NavItem {
                        kind: NavKind::Spacer,
                        label: String::new(),
                        href: None,
                        resolved: None,
                        depth: open_chapters.len(),
                        parent: open_chapters.last().copied(),
                        has_toggle: false,
                    });
                }
            }
            XmlEvent::End(e) if e.name().as_ref() == b"li" => {
                match li_stack.pop() {
                    Some(LiFrame::Chapter(_)) => {
                        open_chapters.pop();
                    }
                    Some(LiFrame::PartTitle(idx)) => {
                        items[idx].label = collapse_whitespace(&items[idx].label);
                    }
                    _ => {}
                }
            }
            XmlEvent::Start(e) if e.name().as_ref() == b"a" => {
                if class_contains(&e, "chapter-fold-toggle") {
                    in_anchor = Some(AnchorKind::Toggle);
                    if let Some(&idx) = open_chapters.last() {
                        items[idx].has_toggle = true;
                    }
                } else {
                    in_anchor = Some(AnchorKind::Label);
                    if let Some(&idx) = open_chapters.last() {
                        items[idx].href = attr_value(&e, b"href");
                    }
                }
            }
            XmlEvent::End(e) if e.name().as_ref() == b"a" => {
                if matches!(in_anchor, Some(AnchorKind::Label)) {
                    if let Some(&idx) = open_chapters.last() {
                        items[idx].label = collapse_whitespace(&items[idx].label);
                    }
                }
                in_anchor = None;
            }
            XmlEvent::Text(e) => {
                let text = e.unescape()?;
                match (&in_anchor, li_stack.last()) {
                    (Some(AnchorKind::Label), _) => {
                        if let Some(&idx) = open_chapters.last() {
                            items[idx].label.push_str(&text);
                        }
                    }
                    (Some(AnchorKind::Toggle), _) => {
                        // Fold-toggle glyph, not part of any label.
                    }
                    (None, Some(LiFrame::PartTitle(idx))) => {
                        items[*idx].label.push_str(&text);
                    }
                    _ => {}
                }
            }
            XmlEvent::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(NavTree { items })
}

// ---------------------------------------------------------------------------
// URL helpers
// ---------------------------------------------------------------------------

/// Canonicalize a page URL for active-link comparison.
///
/// Strips any fragment and query string; a trailing slash aliases the
/// directory's index document. The result always carries a leading slash.
pub fn canonical_page_url(raw: &str) -> String {
    let mut page = raw
        .split('#')
        .next()
        .unwrap_or("")
        .split('?')
        .next()
        .unwrap_or("")
        .to_owned();
    if page.ends_with('/') {
        page.push_str(INDEX_FILE);
    }
    if !page.starts_with('/') {
        page.insert(0, '/');
    }
    page
}

/// An href counts as absolute when it is protocol-relative (`//…`) or
/// starts with a `scheme://` prefix whose scheme matches `[a-z+]+`.
pub fn is_absolute_url(href: &str) -> bool {
    if href.starts_with("//") {
        return true;
    }
    match href.find("://") {
        Some(i) if i > 0 => href[..i]
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b == b'+'),
        _ => false,
    }
}

/// Relative hrefs are everything except fragments and absolute URLs.
pub fn is_relative_href(href: &str) -> bool {
    !href.starts_with('#') && !is_absolute_url(href)
}

/// Prefix a relative href with the page's path-to-root so it resolves
/// correctly regardless of the current page's depth. Fragment and
/// absolute hrefs pass through untouched.
pub fn rewrite_href(href: &str, path_to_root: &str) -> String {
    if is_relative_href(href) {
        format!("{path_to_root}{href}")
    } else {
        href.to_owned()
    }
}

/// Resolve a (rewritten) relative href against the directory of
/// `current_page`, folding `.` and `..` components.
///
/// Returns the root-relative target with a leading slash, or `None` for
/// non-relative hrefs and for paths that would escape the book root.
pub fn resolve_href(current_page: &str, href: &str) -> Option<String> {
    if !is_relative_href(href) {
        return None;
    }
    let path_part = href.split('#').next()?.split('?').next()?;

    // Start from the current page's directory.
    let mut parts: Vec<&str> = current_page
        .trim_start_matches('/')
        .split('/')
        .collect();
    parts.pop();

    for component in path_part.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return None;
                }
            }
            name => parts.push(name),
        }
    }
    Some(format!("/{}", parts.join("/")))
}

/// Relative path from `current_page` back to the book root, e.g. `../../`
/// for a page two directories deep.
pub fn path_to_root(current_page: &str) -> String {
    let depth = current_page.trim_start_matches('/').matches('/').count();
    "../".repeat(depth)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MARKUP: &str = r#"<ol class="chapter">
        <li class="chapter-item expanded"><span class="chapter-link-wrapper"><a href="getting-started.md">Getting Started</a></span></li>
        <li class="part-title">Guide</li>
        <li class="chapter-item "><span class="chapter-link-wrapper"><a href="guide/index.md"><strong aria-hidden="true">1.</strong> The Guide</a><a class="chapter-fold-toggle"><div>&#10097;</div></a></span>
            <ol class="section">
                <li class="chapter-item "><span class="chapter-link-wrapper"><a href="guide/install.md"><strong aria-hidden="true">1.1.</strong> Installation</a></span></li>
                <li class="chapter-item "><span class="chapter-link-wrapper"><a href="guide/usage.md"><strong aria-hidden="true">1.2.</strong> Usage</a></span></li>
            </ol>
        </li>
        <li class="spacer"></li>
        <li class="chapter-item "><span class="chapter-link-wrapper"><a href="https://example.com/ref">External Reference</a></span></li>
    </ol>"#;

    #[test]
    fn parses_flat_and_nested_chapters() {
        let tree = parse_nav_markup(MARKUP).unwrap();
        assert_eq!(tree.items.len(), 7);

        assert_eq!(tree.items[0].kind, NavKind::Link);
        assert_eq!(tree.items[0].label, "Getting Started");
        assert_eq!(tree.items[0].href.as_deref(), Some("getting-started.md"));
        assert_eq!(tree.items[0].depth, 0);
        assert_eq!(tree.items[0].parent, None);

        assert_eq!(tree.items[1].kind, NavKind::PartTitle);
        assert_eq!(tree.items[1].label, "Guide");

        assert_eq!(tree.items[2].label, "1. The Guide");
        assert!(tree.items[2].has_toggle);

        assert_eq!(tree.items[3].label, "1.1. Installation");
        assert_eq!(tree.items[3].depth, 1);
        assert_eq!(tree.items[3].parent, Some(2));

        assert_eq!(tree.items[4].label, "1.2. Usage");
        assert_eq!(tree.items[4].parent, Some(2));

        assert_eq!(tree.items[5].kind, NavKind::Spacer);

        assert_eq!(tree.items[6].href.as_deref(), Some("https://example.com/ref"));
        assert_eq!(tree.items[6].depth, 0);
    }

    #[test]
    fn toggle_glyph_not_in_label() {
        let tree = parse_nav_markup(MARKUP).unwrap();
        assert!(!tree.items[2].label.contains('\u{276F}'));
    }

    #[test]
    fn malformed_markup_is_an_error() {
        assert!(parse_nav_markup("<ol class=\"chapter\"><li></ol>").is_err());
    }

    #[test]
    fn canonical_url_strips_fragment_and_query() {
        assert_eq!(canonical_page_url("/guide/usage.md#setup"), "/guide/usage.md");
        assert_eq!(canonical_page_url("/guide/usage.md?hl=x"), "/guide/usage.md");
        assert_eq!(
            canonical_page_url("/guide/usage.md?hl=x#setup"),
            "/guide/usage.md"
        );
    }

    #[test]
    fn canonical_url_trailing_slash_aliases_index() {
        assert_eq!(canonical_page_url("/guide/"), "/guide/index.md");
        assert_eq!(canonical_page_url("/"), "/index.md");
    }

    #[test]
    fn canonical_url_adds_leading_slash() {
        assert_eq!(canonical_page_url("index.md"), "/index.md");
    }

    #[test]
    fn absolute_url_detection() {
        assert!(is_absolute_url("https://example.com"));
        assert!(is_absolute_url("http://example.com"));
        assert!(is_absolute_url("git+ssh://example.com"));
        assert!(is_absolute_url("//cdn.example.com/x.css"));
        assert!(!is_absolute_url("guide/usage.md"));
        assert!(!is_absolute_url("../index.md"));
        assert!(!is_absolute_url("a/b://c"));
    }

    #[test]
    fn rewrite_only_touches_relative_hrefs() {
        assert_eq!(rewrite_href("guide/usage.md", "../"), "../guide/usage.md");
        assert_eq!(rewrite_href("#anchor", "../"), "#anchor");
        assert_eq!(
            rewrite_href("https://example.com", "../"),
            "https://example.com"
        );
        assert_eq!(rewrite_href("index.md", ""), "index.md");
    }

    #[test]
    fn resolve_relative_href_against_page_dir() {
        assert_eq!(
            resolve_href("/guide/usage.md", "../getting-started.md").as_deref(),
            Some("/getting-started.md")
        );
        assert_eq!(
            resolve_href("/guide/usage.md", "install.md").as_deref(),
            Some("/guide/install.md")
        );
        assert_eq!(
            resolve_href("/index.md", "guide/./usage.md").as_deref(),
            Some("/guide/usage.md")
        );
    }

    #[test]
    fn resolve_drops_fragment_and_query() {
        assert_eq!(
            resolve_href("/index.md", "guide/usage.md#setup").as_deref(),
            Some("/guide/usage.md")
        );
    }

    #[test]
    fn resolve_rejects_escape_above_root() {
        assert_eq!(resolve_href("/index.md", "../../outside.md"), None);
    }

    #[test]
    fn resolve_rejects_non_relative() {
        assert_eq!(resolve_href("/index.md", "#frag"), None);
        assert_eq!(resolve_href("/index.md", "https://example.com"), None);
    }

    #[test]
    fn path_to_root_per_depth() {
        assert_eq!(path_to_root("/index.md"), "");
        assert_eq!(path_to_root("/guide/usage.md"), "../");
        assert_eq!(path_to_root("/guide/advanced/tips.md"), "../../");
    }
}
