//! mdnav: a TUI navigator for generated documentation books.
//!
//! A "book" is a directory produced by a static documentation generator:
//! markdown pages plus a `toc.html` file holding the sidebar navigation
//! markup. mdnav renders one page at a time next to a live sidebar that
//! marks the active page, grafts an "on this page" outline of the page's
//! headings under it, and tracks the "current" heading with a
//! direction-aware scroll threshold.

pub mod outline;
pub mod page;
pub mod render;
pub mod session;
pub mod sidebar;
pub mod toc;
pub mod tracker;
