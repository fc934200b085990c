use std::{
    collections::hash_map::DefaultHasher,
    fs,
    hash::{Hash, Hasher},
    io,
    path::{Path, PathBuf},
    process,
    time::{Duration, Instant},
};

use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    DefaultTerminal, Frame,
};

use mdnav::outline::Outline;
use mdnav::page;
use mdnav::render::{self, RenderedPage};
use mdnav::session::SessionStore;
use mdnav::sidebar::{Sidebar, SidebarRow};
use mdnav::toc::{canonical_page_url, NavKind, TocError, INDEX_FILE};
use mdnav::tracker::{HeaderTracker, ThresholdConfig, ThresholdDebug, ViewMetrics};

/// File the generator writes the sidebar navigation markup to, at the
/// book root.
const NAV_MARKUP_FILE: &str = "toc.html";

/// Width of the sidebar pane in columns.
const SIDEBAR_WIDTH: u16 = 34;

/// Threshold tuning in rows rather than pixels.
fn row_threshold_config() -> ThresholdConfig {
    ThresholdConfig {
        down_threshold: 5.0,
        up_threshold: 10.0,
        ..ThresholdConfig::default()
    }
}

/// Explicit subcommands.
#[derive(Subcommand)]
enum Commands {
    /// View a generated book in TUI mode (equivalent to legacy positional form)
    View {
        /// Path to the book root (the directory containing toc.html)
        book: String,
        /// Page to open, relative to the book root
        page: Option<String>,
        /// Overlay the current-heading threshold line and its inputs
        #[arg(long)]
        debug_threshold: bool,
    },
}

/// Full CLI with explicit subcommands.
#[derive(Parser)]
#[command(
    name = "mdnav",
    version,
    about = "A TUI navigator for generated documentation books",
    after_help = "INVOCATION FORMS:\n  mdnav <book> [page]              View book in TUI mode (legacy)\n  mdnav view [OPTIONS] <book> [page]\n                                   View book in TUI mode"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Legacy positional form: mdnav <book> [page]
#[derive(Parser)]
#[command(
    name = "mdnav",
    version,
    about = "A TUI navigator for generated documentation books"
)]
struct LegacyCli {
    /// Path to the book root
    book: String,
    /// Page to open, relative to the book root
    page: Option<String>,
}

/// Resolved dispatch mode after CLI argument parsing.
enum DispatchMode {
    Legacy {
        book: String,
        page: Option<String>,
    },
    View {
        book: String,
        page: Option<String>,
        debug_threshold: bool,
    },
}

fn resolve_dispatch_mode() -> DispatchMode {
    match Cli::try_parse() {
        Ok(cli) => match cli.command {
            Commands::View {
                book,
                page,
                debug_threshold,
            } => DispatchMode::View {
                book,
                page,
                debug_threshold,
            },
        },
        Err(clap_err) => {
            // Pass --help, --version, and subcommand-level help through to the full Cli handler.
            use clap::error::ErrorKind;
            if matches!(
                clap_err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ) {
                clap_err.exit();
            }
            // Fall back to legacy positional parse: mdnav <book> [page]
            match LegacyCli::try_parse() {
                Ok(legacy) => DispatchMode::Legacy {
                    book: legacy.book,
                    page: legacy.page,
                },
                Err(legacy_err) => legacy_err.exit(),
            }
        }
    }
}

fn main() -> io::Result<()> {
    match resolve_dispatch_mode() {
        DispatchMode::Legacy { book, page } => {
            eprintln!("[legacy] TUI navigator dispatched for: {book}");
            run_tui_book(&book, page.as_deref(), false)
        }
        DispatchMode::View {
            book,
            page,
            debug_threshold,
        } => {
            eprintln!("[view] TUI navigator dispatched for: {book}");
            run_tui_book(&book, page.as_deref(), debug_threshold)
        }
    }
}

fn run_tui_book(book_arg: &str, page_arg: Option<&str>, debug_threshold: bool) -> io::Result<()> {
    let book_root = Path::new(book_arg);
    if !book_root.is_dir() {
        eprintln!("Error: '{book_arg}' is not a directory.");
        eprintln!("Expected the root of a generated book (the directory containing {NAV_MARKUP_FILE}).");
        process::exit(1);
    }

    let nav_markup = fs::read_to_string(book_root.join(NAV_MARKUP_FILE)).unwrap_or_else(|e| {
        match e.kind() {
            io::ErrorKind::NotFound => {
                eprintln!("Error: no {NAV_MARKUP_FILE} found in '{book_arg}'.");
            }
            io::ErrorKind::PermissionDenied => {
                eprintln!("Error: permission denied: {book_arg}");
            }
            _ => {
                eprintln!("Error reading '{book_arg}': {e}");
            }
        }
        process::exit(1);
    });

    let start_url = canonical_page_url(page_arg.unwrap_or(INDEX_FILE));
    let start_path = page_path(book_root, &start_url);
    if !start_path.is_file() {
        eprintln!("Error: page not found: {}", start_path.display());
        process::exit(1);
    }

    let canonical_root = fs::canonicalize(book_root).unwrap_or_else(|_| book_root.to_path_buf());

    ratatui::run(|terminal| {
        run(
            terminal,
            &canonical_root,
            &nav_markup,
            &start_url,
            debug_threshold,
        )
    })
}

/// Filesystem location of a root-relative page URL.
fn page_path(book_root: &Path, url: &str) -> PathBuf {
    book_root.join(url.trim_start_matches('/'))
}

/// Session file in the system temp directory, keyed by the book root so
/// concurrent sessions on different books stay independent.
fn session_path(book_root: &Path) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    book_root.hash(&mut hasher);
    std::env::temp_dir().join(format!("mdnav-session-{:016x}.json", hasher.finish()))
}

/// Which pane owns keyboard input.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Pane {
    Sidebar,
    Content,
}

/// Everything tied to the page currently on screen. Navigating to
/// another chapter replaces the whole bundle.
struct PageView {
    url: String,
    rendered: RenderedPage,
    sidebar: Sidebar,
    tracker: HeaderTracker,
}

fn attach_error(e: TocError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

/// Load, parse, and render a page, attach the sidebar to it, and run the
/// initial current-heading pass.
fn open_page(
    book_root: &Path,
    nav_markup: &str,
    url: &str,
    viewport_height: f64,
    session: &mut SessionStore,
) -> io::Result<PageView> {
    let source = fs::read_to_string(page_path(book_root, url))?;
    let doc = page::parse(&source);
    let rendered = render::render_document(&doc);

    let mut sidebar =
        Sidebar::attach(nav_markup, url, viewport_height, session).map_err(attach_error)?;
    sidebar.graft_outline(Outline::build(&doc.headings));

    let mut tracker = HeaderTracker::new(row_threshold_config());
    tracker.update_threshold(&ViewMetrics {
        scroll_top: 0.0,
        viewport_height,
        document_height: rendered.height() as f64,
    });

    let url = sidebar.current_url().to_owned();
    let mut view = PageView {
        url,
        rendered,
        sidebar,
        tracker,
    };
    refresh_current_heading(
        &view.tracker,
        &mut view.sidebar,
        &view.rendered,
        0,
        viewport_height as usize,
    );
    Ok(view)
}

/// Recompute which heading is current from the threshold line and push
/// the result into the sidebar outline.
fn refresh_current_heading(
    tracker: &HeaderTracker,
    sidebar: &mut Sidebar,
    rendered: &RenderedPage,
    scroll_offset: usize,
    viewport_height: usize,
) {
    let tops: Vec<f64> = rendered
        .headings
        .iter()
        .map(|h| h.top_line as f64 - scroll_offset as f64)
        .collect();
    let current = tracker
        .current_heading(&tops, viewport_height as f64)
        .map(|i| rendered.headings[i].heading_index);
    sidebar.set_current_heading(current);
}

/// Root-relative target of the chapter link before/after the active one.
fn chapter_neighbor(sidebar: &Sidebar, forward: bool) -> Option<String> {
    let links: Vec<(usize, &str)> = sidebar
        .items()
        .iter()
        .enumerate()
        .filter_map(|(i, item)| item.resolved.as_deref().map(|r| (i, r)))
        .collect();
    let active = sidebar.active()?;
    let pos = links.iter().position(|(i, _)| *i == active)?;
    let neighbor = if forward {
        pos + 1
    } else {
        pos.checked_sub(1)?
    };
    links.get(neighbor).map(|(_, r)| (*r).to_owned())
}

/// Keep the sidebar cursor inside its viewport.
fn ensure_selected_visible(sidebar: &mut Sidebar, selected: usize, viewport_height: usize) {
    let vh = viewport_height as f64;
    if (selected as f64) < sidebar.scroll_top {
        sidebar.scroll_top = selected as f64;
    } else if selected as f64 >= sidebar.scroll_top + vh {
        sidebar.scroll_top = selected as f64 - vh + 1.0;
    }
}

fn run(
    terminal: &mut DefaultTerminal,
    book_root: &Path,
    nav_markup: &str,
    start_url: &str,
    debug_threshold: bool,
) -> io::Result<()> {
    let mut session = SessionStore::load(session_path(book_root));
    let initial_viewport = terminal.size()?.height.saturating_sub(1) as f64;

    let mut view = open_page(book_root, nav_markup, start_url, initial_viewport, &mut session)?;
    let mut scroll_offset: usize = 0;
    let mut selected: usize = view
        .sidebar
        .active()
        .and_then(|a| view.sidebar.row_of_nav(a))
        .unwrap_or(0);
    let mut focus = Pane::Content;
    let mut debug_overlay = debug_threshold;

    loop {
        terminal.draw(|frame| {
            ui(frame, &view, scroll_offset, selected, focus, debug_overlay);
        })?;

        // While a click reposition waits for frames, poll with a short
        // timeout so the settle ticks arrive without user input.
        let event = if view.tracker.has_pending_frames() {
            if event::poll(Duration::from_millis(16))? {
                Some(event::read()?)
            } else {
                None
            }
        } else {
            Some(event::read()?)
        };

        // Recalculate bounds and clamp scroll offsets on every event,
        // including Event::Resize, so the view stays valid after terminal resize.
        let viewport_height = terminal.size()?.height.saturating_sub(1) as usize;
        let total_lines = view.rendered.height();
        let max_scroll = total_lines.saturating_sub(viewport_height);
        scroll_offset = scroll_offset.min(max_scroll);
        view.sidebar.resize(viewport_height as f64);

        // Frame tick: when the settle counter runs out the threshold
        // jumps to the clicked heading's bottom edge.
        if view.tracker.on_frame().is_some() {
            refresh_current_heading(
                &view.tracker,
                &mut view.sidebar,
                &view.rendered,
                scroll_offset,
                viewport_height,
            );
        }

        let Some(event) = event else {
            continue;
        };
        let Event::Key(key) = event else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match key.code {
            KeyCode::Char('q') => return Ok(()),

            KeyCode::Tab | KeyCode::BackTab => {
                focus = match focus {
                    Pane::Sidebar => Pane::Content,
                    Pane::Content => Pane::Sidebar,
                };
            }

            KeyCode::Char('D') => {
                debug_overlay = !debug_overlay;
            }

            // Previous / next chapter, directly from the content pane.
            // No click offset is recorded, so the new page centers its
            // active link instead.
            KeyCode::Char('[') | KeyCode::Char(']') => {
                let forward = key.code == KeyCode::Char(']');
                if let Some(target) = chapter_neighbor(&view.sidebar, forward) {
                    if let Ok(new_view) = open_page(
                        book_root,
                        nav_markup,
                        &target,
                        viewport_height as f64,
                        &mut session,
                    ) {
                        view = new_view;
                        scroll_offset = 0;
                        selected = view
                            .sidebar
                            .active()
                            .and_then(|a| view.sidebar.row_of_nav(a))
                            .unwrap_or(0);
                    }
                }
            }

            _ => match focus {
                Pane::Content => {
                    let mut scrolled = false;
                    match key.code {
                        KeyCode::Char('j') | KeyCode::Down => {
                            scroll_offset = (scroll_offset + 1).min(max_scroll);
                            scrolled = true;
                        }
                        KeyCode::Char('k') | KeyCode::Up => {
                            scroll_offset = scroll_offset.saturating_sub(1);
                            scrolled = true;
                        }
                        KeyCode::Char('d')
                            if key.modifiers.contains(KeyModifiers::CONTROL) =>
                        {
                            scroll_offset = (scroll_offset + viewport_height / 2).min(max_scroll);
                            scrolled = true;
                        }
                        KeyCode::PageDown => {
                            scroll_offset = (scroll_offset + viewport_height / 2).min(max_scroll);
                            scrolled = true;
                        }
                        KeyCode::Char('u')
                            if key.modifiers.contains(KeyModifiers::CONTROL) =>
                        {
                            scroll_offset = scroll_offset.saturating_sub(viewport_height / 2);
                            scrolled = true;
                        }
                        KeyCode::PageUp => {
                            scroll_offset = scroll_offset.saturating_sub(viewport_height / 2);
                            scrolled = true;
                        }
                        KeyCode::Char('g') | KeyCode::Home => {
                            scroll_offset = 0;
                            scrolled = true;
                        }
                        KeyCode::Char('G') | KeyCode::End => {
                            scroll_offset = max_scroll;
                            scrolled = true;
                        }
                        _ => {}
                    }
                    if scrolled {
                        let m = ViewMetrics {
                            scroll_top: scroll_offset as f64,
                            viewport_height: viewport_height as f64,
                            document_height: total_lines as f64,
                        };
                        if view.tracker.on_scroll(&m, Instant::now()) {
                            refresh_current_heading(
                                &view.tracker,
                                &mut view.sidebar,
                                &view.rendered,
                                scroll_offset,
                                viewport_height,
                            );
                        }
                    }
                }

                Pane::Sidebar => {
                    let rows = view.sidebar.rows();
                    if rows.is_empty() {
                        continue;
                    }
                    selected = selected.min(rows.len() - 1);
                    match key.code {
                        KeyCode::Char('j') | KeyCode::Down => {
                            selected = (selected + 1).min(rows.len() - 1);
                            ensure_selected_visible(&mut view.sidebar, selected, viewport_height);
                        }
                        KeyCode::Char('k') | KeyCode::Up => {
                            selected = selected.saturating_sub(1);
                            ensure_selected_visible(&mut view.sidebar, selected, viewport_height);
                        }
                        KeyCode::Char('g') | KeyCode::Home => {
                            selected = 0;
                            ensure_selected_visible(&mut view.sidebar, selected, viewport_height);
                        }
                        KeyCode::Char('G') | KeyCode::End => {
                            selected = rows.len() - 1;
                            ensure_selected_visible(&mut view.sidebar, selected, viewport_height);
                        }

                        // Fold/unfold the selected chapter or outline group.
                        KeyCode::Char('t') => {
                            match rows[selected] {
                                SidebarRow::Nav(i) => view.sidebar.toggle(i),
                                SidebarRow::OutlineEntry(n) => view.sidebar.toggle_outline(n),
                            }
                            selected = selected.min(view.sidebar.rows().len().saturating_sub(1));
                        }

                        KeyCode::Enter => match rows[selected] {
                            SidebarRow::Nav(i) => {
                                let item = view.sidebar.item(i);
                                if item.kind != NavKind::Link {
                                    continue;
                                }
                                let target = item.resolved.clone();
                                let has_toggle = item.has_toggle;
                                if let Some(target) = target {
                                    if !page_path(book_root, &target).is_file() {
                                        continue;
                                    }
                                    // Remember where the clicked link sat in
                                    // the viewport before leaving the page.
                                    view.sidebar.record_link_click(i, &mut session);
                                    if let Ok(new_view) = open_page(
                                        book_root,
                                        nav_markup,
                                        &target,
                                        viewport_height as f64,
                                        &mut session,
                                    ) {
                                        view = new_view;
                                        scroll_offset = 0;
                                        selected = view
                                            .sidebar
                                            .active()
                                            .and_then(|a| view.sidebar.row_of_nav(a))
                                            .unwrap_or(0);
                                    }
                                } else if has_toggle {
                                    view.sidebar.toggle(i);
                                }
                            }
                            SidebarRow::OutlineEntry(n) => {
                                // Jump the content to the heading, then let
                                // the settle frames plant the threshold on
                                // its bottom edge.
                                let pos = view.sidebar.outline().and_then(|outline| {
                                    let h = outline.nodes[n].heading_index;
                                    view.rendered
                                        .headings
                                        .iter()
                                        .find(|p| p.heading_index == h)
                                        .copied()
                                });
                                if let Some(pos) = pos {
                                    scroll_offset = pos.top_line.min(max_scroll);
                                    let target_bottom =
                                        pos.bottom_line as f64 - scroll_offset as f64;
                                    view.tracker.begin_reposition(target_bottom, Instant::now());
                                }
                            }
                        },
                        _ => {}
                    }
                }
            },
        }
    }
}

fn ui(
    frame: &mut Frame,
    view: &PageView,
    scroll_offset: usize,
    selected: usize,
    focus: Pane,
    debug_overlay: bool,
) {
    let area = frame.area();

    // Minimum usable terminal size: sidebar + content + status bar.
    const MIN_WIDTH: u16 = 40;
    const MIN_HEIGHT: u16 = 5;
    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = "Terminal too small";
        let msg_len = msg.len() as u16;
        let x = area.x + area.width.saturating_sub(msg_len) / 2;
        let y = area.y + area.height / 2;
        let w = msg_len.min(area.width);
        if w > 0 && area.height > 0 {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    msg,
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                Rect::new(x, y, w, 1),
            );
        }
        return;
    }

    let chunks = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(area);
    let panes = Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(1)])
        .split(chunks[0]);

    render_sidebar(frame, view, selected, focus, panes[0]);

    let content = Paragraph::new(view.rendered.text.clone()).scroll((scroll_offset as u16, 0));
    frame.render_widget(content, panes[1]);

    if debug_overlay {
        render_threshold_overlay(frame, view.tracker.debug(), panes[1]);
    }

    // Status bar with scroll position indicator.
    let viewport_height = chunks[0].height as usize;
    let total_lines = view.rendered.height();
    let position = if total_lines == 0 {
        "Empty".to_owned()
    } else if total_lines <= viewport_height {
        "All".to_owned()
    } else if scroll_offset == 0 {
        "Top".to_owned()
    } else if scroll_offset >= total_lines.saturating_sub(viewport_height) {
        "Bot".to_owned()
    } else {
        let pct = (scroll_offset * 100) / total_lines;
        format!("{pct}%")
    };

    let heading_ctx = view
        .sidebar
        .outline()
        .and_then(|o| {
            o.current()
                .map(|i| format!("  \u{00A7} {}", o.nodes[i].label))
        })
        .unwrap_or_default();

    let focus_info = match focus {
        Pane::Sidebar => "  [sidebar]",
        Pane::Content => "",
    };

    let status = format!(
        " {} \u{2014} Line {}/{} \u{2014} {}{}{}",
        view.url,
        scroll_offset + 1,
        total_lines,
        position,
        heading_ctx,
        focus_info,
    );
    let status_bar = Paragraph::new(Span::styled(
        status,
        Style::default().fg(Color::Black).bg(Color::White),
    ))
    .style(Style::default().bg(Color::White));
    frame.render_widget(status_bar, chunks[1]);
}

fn render_sidebar(frame: &mut Frame, view: &PageView, selected: usize, focus: Pane, area: Rect) {
    let sidebar = &view.sidebar;
    let rows = sidebar.rows();
    let scroll = sidebar.scroll_top.max(0.0) as usize;

    let mut lines: Vec<Line<'static>> = Vec::new();
    for (row_idx, row) in rows
        .iter()
        .enumerate()
        .skip(scroll)
        .take(area.height as usize)
    {
        let mut line = match *row {
            SidebarRow::Nav(i) => nav_line(sidebar, i),
            SidebarRow::OutlineEntry(n) => match sidebar.outline() {
                Some(outline) => outline_line(outline, n),
                None => Line::default(),
            },
        };
        if focus == Pane::Sidebar && row_idx == selected {
            line = line.style(Style::default().add_modifier(Modifier::REVERSED));
        }
        lines.push(line);
    }

    let block = Block::new()
        .borders(Borders::RIGHT)
        .border_style(Style::default().fg(Color::DarkGray));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn nav_line(sidebar: &Sidebar, index: usize) -> Line<'static> {
    let item = sidebar.item(index);
    let indent = "  ".repeat(item.depth);
    match item.kind {
        NavKind::Spacer => Line::default(),
        NavKind::PartTitle => Line::from(Span::styled(
            format!("{indent}{}", item.label),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )),
        NavKind::Link => {
            let marker = if item.has_toggle {
                if sidebar.is_expanded(index) {
                    "\u{25BE} "
                } else {
                    "\u{25B8} "
                }
            } else {
                ""
            };
            let style = if sidebar.active() == Some(index) {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else if item.resolved.is_none() {
                // External or unresolvable targets.
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default().fg(Color::White)
            };
            Line::from(Span::styled(
                format!("{indent}{marker}{}", item.label),
                style,
            ))
        }
    }
}

fn outline_line(outline: &Outline, index: usize) -> Line<'static> {
    let node = &outline.nodes[index];
    let indent = "  ".repeat(node.level as usize);
    let marker = if node.has_toggle {
        if node.expanded {
            "\u{25BE} "
        } else {
            "\u{25B8} "
        }
    } else {
        ""
    };
    let style = if node.current {
        Style::default().fg(Color::Black).bg(Color::Cyan)
    } else {
        Style::default().fg(Color::Gray)
    };
    Line::from(Span::styled(
        format!("{indent}{marker}{}", node.label),
        style,
    ))
}

/// Red guideline at the threshold row plus the tracker's intermediate
/// quantities in the content pane's top-right corner.
fn render_threshold_overlay(frame: &mut Frame, debug: &ThresholdDebug, area: Rect) {
    let style = Style::default().fg(Color::Red);

    let row = debug.threshold.round();
    if row >= 0.0 && (row as u16) < area.height {
        let y = area.y + row as u16;
        let guideline = "\u{2500}".repeat(area.width as usize);
        frame.render_widget(
            Paragraph::new(Span::styled(guideline, style)),
            Rect::new(area.x, y, area.width, 1),
        );
    }

    let entries = vec![
        format!("threshold      {:>8.1}", debug.threshold),
        format!("scroll_top     {:>8.1}", debug.scroll_top),
        format!("doc_height     {:>8.1}", debug.document_height),
        format!("view_height    {:>8.1}", debug.viewport_height),
        format!("pixels_above   {:>8.1}", debug.pixels_above),
        format!("pixels_below   {:>8.1}", debug.pixels_below),
        format!("bottom_add     {:>8.1}", debug.adjusted_bottom_add),
        format!("scrolling_down {:>8}", debug.scrolling_down),
    ];
    let width = 26u16.min(area.width);
    let height = (entries.len() as u16).min(area.height);
    if width == 0 || height == 0 {
        return;
    }
    let rect = Rect::new(area.x + area.width - width, area.y, width, height);
    frame.render_widget(Clear, rect);
    let text: Vec<Line<'static>> = entries
        .into_iter()
        .map(|entry| Line::from(Span::styled(entry, style)))
        .collect();
    frame.render_widget(Paragraph::new(text), rect);
}
