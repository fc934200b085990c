//! Sidebar controller.
//!
//! Owns the parsed navigation tree for the current page: resolves every
//! chapter href against the page's location, marks the active chapter,
//! expands its ancestry, restores the sidebar scroll position from the
//! session store, and grafts the page's sub-outline in under the active
//! link. The TUI renders whatever [`Sidebar::rows`] returns.

use crate::outline::Outline;
use crate::session::{SessionStore, SIDEBAR_SCROLL_OFFSET};
use crate::toc::{
    self, canonical_page_url, parse_nav_markup, path_to_root, resolve_href, rewrite_href, NavItem,
    NavKind, NavTree, TocError,
};

/// One visible row of the sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidebarRow {
    /// Index into the navigation tree's item list.
    Nav(usize),
    /// Index into the grafted outline's node list.
    OutlineEntry(usize),
}

pub struct Sidebar {
    tree: NavTree,
    /// Canonical root-relative URL of the page being viewed.
    current_url: String,
    /// Relative prefix from the current page back to the book root.
    path_to_root: String,
    /// Index of the active chapter link, if any resolved to the page.
    active: Option<usize>,
    /// Per-item fold state; items without a fold toggle are always open.
    expanded: Vec<bool>,
    /// Sub-outline grafted directly below the active link.
    outline: Option<Outline>,
    /// Scroll position of the sidebar viewport, in rows.
    pub scroll_top: f64,
    viewport_height: f64,
}

impl Sidebar {
    /// Parse the navigation markup and wire it up for `current_url`.
    ///
    /// Runs the full activation sequence: resolve hrefs, mark the active
    /// link (with the root-index fallback), expand the active ancestry,
    /// then position the scroll either from the session-stored click
    /// offset (consumed here) or by centering the active link.
    pub fn attach(
        markup: &str,
        current_url: &str,
        viewport_height: f64,
        session: &mut SessionStore,
    ) -> Result<Self, TocError> {
        let mut tree = parse_nav_markup(markup)?;
        let current_url = canonical_page_url(current_url);
        let path_to_root = path_to_root(&current_url);

        for item in &mut tree.items {
            if let Some(href) = &item.href {
                let rewritten = rewrite_href(href, &path_to_root);
                item.resolved = resolve_href(&current_url, &rewritten);
            }
        }

        let mut active = tree
            .items
            .iter()
            .position(|item| item.resolved.as_deref() == Some(current_url.as_str()));
        if active.is_none()
            && path_to_root.is_empty()
            && current_url.ends_with(&format!("/{}", toc::INDEX_FILE))
        {
            // Landing on the book root without an exact match falls back
            // to the first chapter link.
            active = tree
                .items
                .iter()
                .position(|item| item.kind == NavKind::Link && item.href.is_some());
        }

        let mut expanded: Vec<bool> = tree.items.iter().map(|item| !item.has_toggle).collect();
        if let Some(active) = active {
            expanded[active] = true;
            let mut parent = tree.items[active].parent;
            while let Some(p) = parent {
                expanded[p] = true;
                parent = tree.items[p].parent;
            }
        }

        let mut sidebar = Self {
            tree,
            current_url,
            path_to_root,
            active,
            expanded,
            outline: None,
            scroll_top: 0.0,
            viewport_height,
        };

        if let Some(active) = sidebar.active {
            if let Some(active_row) = sidebar.row_of_nav(active) {
                let stored = session
                    .take(SIDEBAR_SCROLL_OFFSET)
                    .and_then(|s| s.parse::<f64>().ok());
                sidebar.scroll_top = match stored {
                    // Keep the clicked link at the same viewport offset it
                    // had on the previous page.
                    Some(offset) => active_row as f64 - offset,
                    None => active_row as f64 - viewport_height / 2.0,
                };
                sidebar.clamp_scroll();
            }
        }

        Ok(sidebar)
    }

    pub fn items(&self) -> &[NavItem] {
        &self.tree.items
    }

    pub fn item(&self, index: usize) -> &NavItem {
        &self.tree.items[index]
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    pub fn path_to_root(&self) -> &str {
        &self.path_to_root
    }

    pub fn outline(&self) -> Option<&Outline> {
        self.outline.as_ref()
    }

    /// Graft (or remove) the page's sub-outline below the active link.
    /// Without an active link there is nowhere to graft, so the outline
    /// is dropped.
    pub fn graft_outline(&mut self, outline: Option<Outline>) {
        self.outline = if self.active.is_some() { outline } else { None };
    }

    /// Move the current-heading mark on the grafted outline.
    ///
    /// `heading_index` refers to the page's heading list; `None` clears
    /// the mark and re-collapses the outline's fold groups.
    pub fn set_current_heading(&mut self, heading_index: Option<usize>) {
        if let Some(outline) = &mut self.outline {
            let node = heading_index.and_then(|h| {
                outline
                    .nodes
                    .iter()
                    .position(|node| node.heading_index == h)
            });
            outline.set_current(node);
        }
    }

    /// Flip a grafted outline node's fold state.
    pub fn toggle_outline(&mut self, index: usize) {
        if let Some(outline) = &mut self.outline {
            outline.toggle(index);
        }
    }

    /// Whether a navigation item's children are unfolded.
    pub fn is_expanded(&self, index: usize) -> bool {
        self.expanded[index]
    }

    /// Flip a chapter's fold state. No-op for items without a toggle.
    pub fn toggle(&mut self, index: usize) {
        if self.tree.items[index].has_toggle {
            self.expanded[index] = !self.expanded[index];
        }
    }

    /// A nav item is visible when every ancestor chapter is expanded.
    fn nav_visible(&self, index: usize) -> bool {
        let mut parent = self.tree.items[index].parent;
        while let Some(p) = parent {
            if !self.expanded[p] {
                return false;
            }
            parent = self.tree.items[p].parent;
        }
        true
    }

    /// The sidebar's visible rows in display order: the navigation tree
    /// with the outline's visible nodes spliced in right after the active
    /// link.
    pub fn rows(&self) -> Vec<SidebarRow> {
        let mut rows = Vec::new();
        for index in 0..self.tree.items.len() {
            if !self.nav_visible(index) {
                continue;
            }
            rows.push(SidebarRow::Nav(index));
            if Some(index) == self.active {
                if let Some(outline) = &self.outline {
                    for (n, _) in outline.nodes.iter().enumerate() {
                        if outline.is_visible(n) {
                            rows.push(SidebarRow::OutlineEntry(n));
                        }
                    }
                }
            }
        }
        rows
    }

    /// Row index of a nav item in the current flattening, if visible.
    pub fn row_of_nav(&self, index: usize) -> Option<usize> {
        self.rows()
            .iter()
            .position(|row| *row == SidebarRow::Nav(index))
    }

    /// Record the clicked link's viewport offset so the next page's
    /// sidebar can restore it. Invisible items are ignored.
    pub fn record_link_click(&self, index: usize, session: &mut SessionStore) {
        if let Some(row) = self.row_of_nav(index) {
            let offset = row as f64 - self.scroll_top;
            session.set(SIDEBAR_SCROLL_OFFSET, &offset.to_string());
        }
    }

    pub fn scroll_by(&mut self, delta: f64) {
        self.scroll_top += delta;
        self.clamp_scroll();
    }

    pub fn resize(&mut self, viewport_height: f64) {
        self.viewport_height = viewport_height;
        self.clamp_scroll();
    }

    fn clamp_scroll(&mut self) {
        let max = (self.rows().len() as f64 - self.viewport_height).max(0.0);
        self.scroll_top = self.scroll_top.clamp(0.0, max);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
