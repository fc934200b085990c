//! Current-heading tracking with a moving scroll threshold.
//!
//! The "current" heading is decided by a virtual horizontal line (the
//! threshold): the last heading whose top edge sits at or above that
//! line is current. The line moves with scroll direction so the
//! behavior feels natural scrolling either way, and it is pulled toward
//! the viewport bottom near the end of the document so the final
//! headings can still become current.
//!
//! All geometry is injected as f64 [`ViewMetrics`], so the same state
//! machine serves browser-like pixel units and terminal rows alike, and
//! tests can drive it deterministically.

use std::time::{Duration, Instant};

/// Tuning knobs for the tracker. Defaults match the heuristic's
/// original pixel values; the TUI wires row-scaled values through the
/// same type.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdConfig {
    /// Threshold resting position while scrolling down.
    pub down_threshold: f64,
    /// Threshold resting position while scrolling up.
    pub up_threshold: f64,
    /// How long scroll updates stay suppressed after a click reposition.
    pub suppress_window: Duration,
    /// How many frames to wait for layout to settle before a click
    /// reposition takes effect.
    pub settle_frames: u32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            down_threshold: 150.0,
            up_threshold: 300.0,
            suppress_window: Duration::from_millis(100),
            settle_frames: 2,
        }
    }
}

/// A snapshot of viewport geometry, in whatever unit the host uses.
#[derive(Debug, Clone, Copy)]
pub struct ViewMetrics {
    /// Scroll offset from the top of the document.
    pub scroll_top: f64,
    /// Visible height of the viewport.
    pub viewport_height: f64,
    /// Full height of the document.
    pub document_height: f64,
}

/// Intermediate quantities of the last threshold update, for the debug
/// overlay.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdDebug {
    pub document_height: f64,
    pub viewport_height: f64,
    pub scroll_top: f64,
    pub pixels_above: f64,
    pub pixels_below: f64,
    pub bottom_add: f64,
    pub adjusted_bottom_add: f64,
    pub scrolling_down: bool,
    pub threshold: f64,
}

/// An armed click reposition waiting for layout to settle.
#[derive(Debug, Clone, Copy)]
struct PendingReposition {
    frames_left: u32,
    target_bottom: f64,
}

/// Tracks the threshold line and which heading is current.
pub struct HeaderTracker {
    config: ThresholdConfig,
    threshold: f64,
    last_known_scroll: f64,
    suppressed_until: Option<Instant>,
    pending: Option<PendingReposition>,
    last_debug: ThresholdDebug,
}

impl HeaderTracker {
    pub fn new(config: ThresholdConfig) -> Self {
        Self {
            threshold: config.down_threshold,
            config,
            last_known_scroll: 0.0,
            suppressed_until: None,
            pending: None,
            last_debug: ThresholdDebug::default(),
        }
    }

    /// The threshold line's distance from the viewport top.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Quantities from the most recent threshold update.
    pub fn debug(&self) -> &ThresholdDebug {
        &self.last_debug
    }

    /// Recompute the threshold from the latest geometry.
    ///
    /// Each call is self-contained: dropped or coalesced scroll events
    /// only coarsen the update cadence, never corrupt state.
    pub fn update_threshold(&mut self, m: &ViewMetrics) {
        // Remaining scrollable distance below the viewport. Used to pull
        // the threshold toward the bottom as the end of the document
        // approaches.
        let pixels_below = (m.document_height - (m.scroll_top + m.viewport_height)).max(0.0);
        // How far the page is from being able to reach the default
        // downward threshold; nonzero only very near the top.
        let pixels_above = (self.config.down_threshold - m.scroll_top).max(0.0);
        // Offset applied once the threshold gets close to the document's
        // end.
        let bottom_add = (m.viewport_height - pixels_below - self.config.down_threshold).max(0.0);
        let mut adjusted_bottom_add = bottom_add;

        // The bottom_add calculation assumes the document is at least
        // twice the viewport height; for shorter documents, fade it in
        // proportionally to how close the scroll is to its maximum.
        if m.document_height < m.viewport_height * 2.0 {
            let max_pixels_below = m.document_height - m.viewport_height;
            let t = 1.0 - pixels_below / max_pixels_below.max(1.0);
            adjusted_bottom_add *= t.clamp(0.0, 1.0);
        }

        let scrolling_down = m.scroll_top >= self.last_known_scroll;

        if scrolling_down {
            // Track up toward the downward resting position by the
            // distance scrolled, never rising above it.
            let amount_scrolled_down = m.scroll_top - self.last_known_scroll;
            let adjusted_default = self.config.down_threshold + adjusted_bottom_add;
            self.threshold = adjusted_default.max(self.threshold - amount_scrolled_down);
        } else {
            // Track down toward the upward resting position, with the
            // top-of-page and bottom-of-page adjustments applied.
            let amount_scrolled_up = self.last_known_scroll - m.scroll_top;
            let adjusted_default = self.config.up_threshold - pixels_above
                + (adjusted_bottom_add - self.config.down_threshold).max(0.0);
            self.threshold = adjusted_default.min(self.threshold + amount_scrolled_up);
        }

        // A document that fits in one viewport needs no moving line.
        if m.document_height <= m.viewport_height {
            self.threshold = 0.0;
        }

        self.last_debug = ThresholdDebug {
            document_height: m.document_height,
            viewport_height: m.viewport_height,
            scroll_top: m.scroll_top,
            pixels_above,
            pixels_below,
            bottom_add,
            adjusted_bottom_add,
            scrolling_down,
            threshold: self.threshold,
        };

        self.last_known_scroll = m.scroll_top;
    }

    /// Scroll event entry point: recompute the threshold unless a click
    /// reposition recently suppressed updates. Returns whether an update
    /// happened.
    pub fn on_scroll(&mut self, m: &ViewMetrics, now: Instant) -> bool {
        if self.is_suppressed(now) {
            return false;
        }
        self.update_threshold(m);
        true
    }

    fn is_suppressed(&mut self, now: Instant) -> bool {
        match self.suppressed_until {
            Some(until) if now < until => true,
            Some(_) => {
                // Cleared unconditionally once the window has elapsed.
                self.suppressed_until = None;
                false
            }
            None => false,
        }
    }

    /// Select the current heading.
    ///
    /// `tops` are the heading top edges relative to the viewport top, in
    /// document order. The last heading at or above the threshold wins;
    /// if none qualifies, the first heading is current only while its
    /// top edge is still above the viewport's bottom edge.
    pub fn current_heading(&self, tops: &[f64], viewport_height: f64) -> Option<usize> {
        let mut last: Option<usize> = None;
        for (i, &top) in tops.iter().enumerate() {
            if top <= self.threshold {
                last = Some(i);
            } else {
                break;
            }
        }
        if last.is_some() {
            return last;
        }
        match tops.first() {
            Some(&top) if top < viewport_height => Some(0),
            _ => None,
        }
    }

    /// Begin a click-driven reposition: suppress scroll updates for the
    /// configured window and arm the settle counter. After
    /// [`ThresholdConfig::settle_frames`] calls to [`Self::on_frame`],
    /// the threshold jumps to `target_bottom` (the clicked heading's
    /// bottom edge, viewport-relative, measured post-scroll).
    pub fn begin_reposition(&mut self, target_bottom: f64, now: Instant) {
        self.suppressed_until = Some(now + self.config.suppress_window);
        self.pending = Some(PendingReposition {
            frames_left: self.config.settle_frames,
            target_bottom,
        });
    }

    /// Whether a reposition is waiting on frame ticks.
    pub fn has_pending_frames(&self) -> bool {
        self.pending.is_some()
    }

    /// One rendering-pipeline tick. When the armed reposition's frames
    /// run out, the threshold is set and returned so the caller can
    /// recompute the current heading immediately.
    pub fn on_frame(&mut self) -> Option<f64> {
        let mut pending = self.pending?;
        pending.frames_left = pending.frames_left.saturating_sub(1);
        if pending.frames_left == 0 {
            self.pending = None;
            self.threshold = pending.target_bottom;
            Some(self.threshold)
        } else {
            self.pending = Some(pending);
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> HeaderTracker {
        HeaderTracker::new(ThresholdConfig::default())
    }

    fn metrics(scroll_top: f64) -> ViewMetrics {
        // A long document so edge adjustments stay out of the way.
        ViewMetrics {
            scroll_top,
            viewport_height: 800.0,
            document_height: 10_000.0,
        }
    }

    #[test]
    fn starts_at_down_threshold() {
        assert_eq!(tracker().threshold(), 150.0);
    }

    #[test]
    fn scrolling_down_never_raises_above_down_default() {
        let mut t = tracker();
        t.update_threshold(&metrics(0.0));
        let mut prev = t.threshold();
        for step in 1..20 {
            t.update_threshold(&metrics(step as f64 * 100.0));
            assert!(t.threshold() <= prev, "threshold must not rise while scrolling down");
            assert!(t.threshold() >= 150.0);
            prev = t.threshold();
        }
        assert_eq!(t.threshold(), 150.0);
    }

    #[test]
    fn scrolling_up_tracks_toward_up_default() {
        let mut t = tracker();
        // Scroll deep into the document first.
        t.update_threshold(&metrics(5_000.0));
        assert_eq!(t.threshold(), 150.0);

        // Scrolling up moves the line down by the scrolled distance,
        // clamped at the upward default.
        t.update_threshold(&metrics(4_950.0));
        assert_eq!(t.threshold(), 200.0);
        t.update_threshold(&metrics(4_800.0));
        assert_eq!(t.threshold(), 300.0);

        let mut prev = t.threshold();
        for step in 1..10 {
            t.update_threshold(&metrics(4_800.0 - step as f64 * 200.0));
            assert!(t.threshold() >= prev, "threshold must not fall while scrolling up");
            assert!(t.threshold() <= 300.0);
            prev = t.threshold();
        }
    }

    #[test]
    fn up_default_shrinks_near_top_of_page() {
        let mut t = tracker();
        t.update_threshold(&metrics(1_000.0));
        // Jump near the top while scrolling up: pixels_above kicks in.
        t.update_threshold(&metrics(50.0));
        // adjusted default = 300 - (150 - 50) = 200.
        assert_eq!(t.threshold(), 200.0);
    }

    #[test]
    fn bottom_add_pulls_threshold_down_near_document_end() {
        let mut t = tracker();
        let m = ViewMetrics {
            scroll_top: 9_200.0,
            viewport_height: 800.0,
            document_height: 10_000.0,
        };
        // Fully scrolled: pixels_below = 0, bottom_add = 800 - 150 = 650.
        t.update_threshold(&m);
        assert_eq!(t.threshold(), 150.0 + 650.0);
    }

    #[test]
    fn short_document_fades_bottom_add() {
        let mut t = tracker();
        // documentHeight < 2 × viewport: at the very top of the page the
        // fade factor is 0, so no bottom pull despite pixels_below being
        // small.
        let m = ViewMetrics {
            scroll_top: 0.0,
            viewport_height: 800.0,
            document_height: 1_200.0,
        };
        t.update_threshold(&m);
        assert_eq!(t.threshold(), 150.0);

        // Fully scrolled, the fade factor is 1 and the pull applies.
        let m = ViewMetrics {
            scroll_top: 400.0,
            viewport_height: 800.0,
            document_height: 1_200.0,
        };
        t.update_threshold(&m);
        assert_eq!(t.threshold(), 150.0 + (800.0 - 0.0 - 150.0));
    }

    #[test]
    fn document_fitting_viewport_forces_zero() {
        let mut t = tracker();
        let m = ViewMetrics {
            scroll_top: 0.0,
            viewport_height: 800.0,
            document_height: 600.0,
        };
        t.update_threshold(&m);
        assert_eq!(t.threshold(), 0.0);

        let equal = ViewMetrics {
            scroll_top: 0.0,
            viewport_height: 800.0,
            document_height: 800.0,
        };
        t.update_threshold(&equal);
        assert_eq!(t.threshold(), 0.0);
    }

    #[test]
    fn current_heading_is_last_at_or_above_threshold() {
        let t = tracker();
        // Threshold is 150; headings at -300, 100, 150, 400.
        assert_eq!(
            t.current_heading(&[-300.0, 100.0, 150.0, 400.0], 800.0),
            Some(2)
        );
    }

    #[test]
    fn current_heading_fallback_to_first_within_viewport() {
        let t = tracker();
        // All below the line, but the first is inside the viewport.
        assert_eq!(t.current_heading(&[500.0, 700.0], 800.0), Some(0));
        // First heading below the viewport's bottom edge: nothing current.
        assert_eq!(t.current_heading(&[900.0, 1_200.0], 800.0), None);
        assert_eq!(t.current_heading(&[800.0], 800.0), None);
        assert_eq!(t.current_heading(&[], 800.0), None);
    }

    #[test]
    fn current_heading_is_idempotent() {
        let mut t = tracker();
        t.update_threshold(&metrics(2_000.0));
        let tops = [-50.0, 120.0, 600.0];
        let first = t.current_heading(&tops, 800.0);
        let second = t.current_heading(&tops, 800.0);
        assert_eq!(first, second);
    }

    #[test]
    fn suppression_skips_scroll_updates_until_window_elapses() {
        let mut t = tracker();
        let start = Instant::now();
        t.begin_reposition(420.0, start);

        assert!(!t.on_scroll(&metrics(100.0), start + Duration::from_millis(50)));
        // Window elapsed: updates resume and the flag clears.
        assert!(t.on_scroll(&metrics(100.0), start + Duration::from_millis(150)));
        assert!(t.on_scroll(&metrics(200.0), start + Duration::from_millis(160)));
    }

    #[test]
    fn reposition_applies_after_two_frames() {
        let mut t = tracker();
        t.begin_reposition(420.0, Instant::now());
        assert!(t.has_pending_frames());

        assert_eq!(t.on_frame(), None);
        assert_eq!(t.on_frame(), Some(420.0));
        assert_eq!(t.threshold(), 420.0);
        assert!(!t.has_pending_frames());
        assert_eq!(t.on_frame(), None);

        // The clicked heading (bottom edge 420, so top above it) is now
        // current.
        assert_eq!(t.current_heading(&[-10.0, 400.0, 500.0], 800.0), Some(1));
    }

    #[test]
    fn debug_snapshot_reflects_last_update() {
        let mut t = tracker();
        t.update_threshold(&metrics(1_000.0));
        let d = t.debug();
        assert_eq!(d.scroll_top, 1_000.0);
        assert_eq!(d.viewport_height, 800.0);
        assert!(d.scrolling_down);
        assert_eq!(d.threshold, t.threshold());
    }
}
