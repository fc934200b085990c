//! The "on this page" sub-outline grafted into the sidebar.
//!
//! Mirrors the page's heading structure (levels 2–6) as a nested list.
//! Construction uses an explicit stack of (level, container) frames so
//! arbitrary jumps in heading depth nest the same way the generator's
//! markup would. At most one node is `current` at any time, and every
//! ancestor of the current node is expanded.

use crate::page::PageHeading;

/// Heading depth at and beyond which outline entries are collapsible.
pub const FOLD_LEVEL: u8 = 3;

/// One entry of the sub-outline.
#[derive(Debug, Clone)]
pub struct OutlineNode {
    /// Index into the heading list this node was built from.
    pub heading_index: usize,
    pub level: u8,
    /// Copy of the heading label with search-highlight wrappers stripped.
    pub label: String,
    /// Anchor slug the node links to (without the leading `#`).
    pub anchor: String,
    /// Index of the enclosing outline node, if any.
    pub parent: Option<usize>,
    /// Whether this node carries a fold toggle.
    pub has_toggle: bool,
    pub expanded: bool,
    pub current: bool,
}

/// The completed sub-outline, flattened in document order.
#[derive(Debug, Clone)]
pub struct Outline {
    pub nodes: Vec<OutlineNode>,
    /// Nodes with fold toggles; re-collapsed on every current-header
    /// update before the current node's ancestry is re-expanded.
    toggles: Vec<usize>,
}

/// Replace search-highlight wrappers with their text content.
fn strip_highlight_marks(text: &str) -> String {
    text.replace("<mark>", "").replace("</mark>", "")
}

/// A nesting level under construction.
struct LevelFrame {
    level: u8,
    /// Last node appended at this level, if any.
    last_item: Option<usize>,
    /// The node enclosing this level's container (the parent for nodes
    /// appended here). `None` at the outermost levels.
    parent_item: Option<usize>,
}

impl Outline {
    /// Build the outline from a page's heading list.
    ///
    /// Only headings of levels 2–6 with a non-empty anchor qualify.
    /// Returns `None` when no heading qualifies, in which case the
    /// sidebar grafts nothing.
    pub fn build(headings: &[PageHeading]) -> Option<Self> {
        let qualifying: Vec<usize> = headings
            .iter()
            .enumerate()
            .filter(|(_, h)| (2..=6).contains(&h.level) && !h.anchor.is_empty())
            .map(|(i, _)| i)
            .collect();
        if qualifying.is_empty() {
            return None;
        }

        let mut nodes: Vec<OutlineNode> = Vec::new();
        let mut toggles: Vec<usize> = Vec::new();
        let mut stack: Vec<LevelFrame> = Vec::new();

        // The first heading's level defines how many wrapper levels to
        // synthesize before any node exists.
        let first_level = headings[qualifying[0]].level;
        for i in 1..first_level {
            let parent_item = stack
                .last()
                .and_then(|f| f.last_item.or(f.parent_item));
            stack.push(LevelFrame {
                level: i + 1,
                last_item: None,
                parent_item,
            });
        }

        for (pos, &heading_index) in qualifying.iter().enumerate() {
            let heading = &headings[heading_index];
            let level = heading.level;

            let current_level = stack.last().map(|f| f.level).unwrap_or(first_level);
            if level > current_level {
                // Begin nesting down to this level, one container per
                // step. A container attaches under the previous level's
                // last item when one exists, otherwise directly under the
                // container itself (multi-level jumps).
                for next_level in current_level + 1..=level {
                    let parent_item = stack
                        .last()
                        .and_then(|f| f.last_item.or(f.parent_item));
                    stack.push(LevelFrame {
                        level: next_level,
                        last_item: None,
                        parent_item,
                    });
                }
            } else if level < current_level {
                while stack.len() > 1 && stack.last().map(|f| f.level) > Some(level) {
                    stack.pop();
                }
            }

            let has_toggle = qualifying
                .get(pos + 1)
                .map(|&next| headings[next].level > level && level >= FOLD_LEVEL)
                .unwrap_or(false);

            let node_index = nodes.len();
            let frame = stack.last_mut().expect("outline stack is never empty");
            nodes.push(OutlineNode {
                heading_index,
                level,
                label: strip_highlight_marks(&heading.text),
                anchor: heading.anchor.clone(),
                parent: frame.parent_item,
                has_toggle,
                expanded: true,
                current: false,
            });
            if has_toggle {
                toggles.push(node_index);
            }
            frame.last_item = Some(node_index);
        }

        Some(Self { nodes, toggles })
    }

    /// The currently marked node, if any.
    pub fn current(&self) -> Option<usize> {
        self.nodes.iter().position(|n| n.current)
    }

    /// Re-mark which node is current.
    ///
    /// Clears every existing mark, re-collapses all toggle-carrying
    /// nodes, then marks `index` current and expands it along with all
    /// of its ancestors. Passing `None` leaves the toggles collapsed and
    /// nothing current. Idempotent for a given input.
    pub fn set_current(&mut self, index: Option<usize>) {
        for node in &mut self.nodes {
            node.current = false;
        }
        for &t in &self.toggles {
            self.nodes[t].expanded = false;
        }
        let Some(index) = index else {
            return;
        };
        if index >= self.nodes.len() {
            return;
        }
        self.nodes[index].current = true;
        self.nodes[index].expanded = true;
        let mut parent = self.nodes[index].parent;
        while let Some(p) = parent {
            self.nodes[p].expanded = true;
            parent = self.nodes[p].parent;
        }
    }

    /// Flip a node's fold state.
    pub fn toggle(&mut self, index: usize) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.expanded = !node.expanded;
        }
    }

    /// A node is visible when every ancestor is expanded.
    pub fn is_visible(&self, index: usize) -> bool {
        let mut parent = self.nodes[index].parent;
        while let Some(p) = parent {
            if !self.nodes[p].expanded {
                return false;
            }
            parent = self.nodes[p].parent;
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
