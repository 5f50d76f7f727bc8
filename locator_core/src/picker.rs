//! Screen-space nearest-point picker.
//!
//! Projects recent history entries into viewport pixels and returns the one
//! closest to the pointer, if it lies within the pixel tolerance.
//!
//! Only the most recent `scan_limit` entries are scanned, newest first. On a
//! long trail an older point can be missed even when it is visually closer;
//! recency wins for an operator scrubbing a live feed.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::camera::{ViewProjection, Viewport};
use crate::config::SessionConfig;
use crate::history::{HistoryEntry, HistoryStore};

/// Default hover tolerance in pixels.
pub const DEFAULT_TOLERANCE_PX: f64 = 18.0;
/// Default number of recent entries scanned per pick.
pub const DEFAULT_SCAN_LIMIT: usize = 1500;

/// Result of a successful pick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickHit {
    /// The picked history entry
    pub entry: HistoryEntry,
    /// Where the entry projected on screen
    pub screen: Point2<f64>,
    /// Pixel distance from the pointer
    pub distance_px: f64,
    /// Render-ready hover text
    pub tooltip: String,
}

impl PickHit {
    /// Raw (unscaled) coordinate triple for clipboard copy.
    pub fn raw_coords(&self) -> [f64; 3] {
        [self.entry.raw.x, self.entry.raw.y, self.entry.raw.z]
    }
}

/// Nearest-neighbor search in pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPicker {
    tolerance_px: f64,
    scan_limit: usize,
}

impl Default for ScreenPicker {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE_PX, DEFAULT_SCAN_LIMIT)
    }
}

impl ScreenPicker {
    pub fn new(tolerance_px: f64, scan_limit: usize) -> Self {
        Self {
            tolerance_px,
            scan_limit,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.pick_tolerance_px, config.pick_scan_limit)
    }

    pub fn tolerance_px(&self) -> f64 {
        self.tolerance_px
    }

    pub fn scan_limit(&self) -> usize {
        self.scan_limit
    }

    /// Finds the history entry nearest to `pointer` on screen.
    ///
    /// Returns `None` when the viewport is unusable, history is empty, or the
    /// nearest projected point is farther than the tolerance.
    pub fn pick(
        &self,
        history: &HistoryStore,
        projection: &ViewProjection,
        pointer: Point2<f64>,
        viewport: &Viewport,
    ) -> Option<PickHit> {
        if !viewport.is_available() {
            return None;
        }

        let mut nearest: Option<(&HistoryEntry, Point2<f64>, f64)> = None;
        for entry in history.recent(self.scan_limit) {
            let Some(screen) = projection.project_to_pixels(&entry.scene.point(), viewport) else {
                continue;
            };
            let d2 = (screen - pointer).norm_squared();
            if !d2.is_finite() {
                continue;
            }
            // Strict comparison keeps the most recent entry on ties
            if nearest.map_or(true, |(_, _, best)| d2 < best) {
                nearest = Some((entry, screen, d2));
            }
        }

        let (entry, screen, d2) = nearest?;
        let distance_px = d2.sqrt();
        if distance_px > self.tolerance_px {
            return None;
        }

        Some(PickHit {
            entry: *entry,
            screen,
            distance_px,
            tooltip: entry.tooltip(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{RawSample, SceneSample};
    use approx::assert_relative_eq;
    use chrono::{DateTime, Utc};
    use nalgebra::Matrix4;

    // Identity transform: scene (x, y) is NDC directly
    fn flat() -> ViewProjection {
        ViewProjection::from_matrix(Matrix4::identity())
    }

    fn viewport() -> Viewport {
        Viewport::new(200.0, 200.0)
    }

    /// History entry whose scene point lands on pixel (px, py) under `flat()`.
    fn at_pixel(px: f64, py: f64, raw_x: f64) -> HistoryEntry {
        let raw = RawSample::new(raw_x, 0.0, 0.0, DateTime::<Utc>::from_timestamp(0, 0).unwrap());
        let scene = SceneSample::new(px / 100.0 - 1.0, 1.0 - py / 100.0, 0.0);
        HistoryEntry::new(raw, scene)
    }

    #[test]
    fn test_picks_nearest_within_tolerance() {
        let mut history = HistoryStore::new(100);
        history.append(at_pixel(105.0, 103.0, 1.0));
        history.append(at_pixel(140.0, 140.0, 2.0));

        let hit = ScreenPicker::default()
            .pick(&history, &flat(), Point2::new(100.0, 100.0), &viewport())
            .unwrap();

        assert_eq!(hit.entry.raw.x, 1.0);
        assert_relative_eq!(hit.distance_px, 34.0f64.sqrt(), epsilon = 1e-9);
        assert_relative_eq!(hit.screen.x, 105.0, epsilon = 1e-9);
        assert_relative_eq!(hit.screen.y, 103.0, epsilon = 1e-9);
        assert_eq!(hit.tooltip, "x:1.000, y:0.000, z:0.000");
        assert_eq!(hit.raw_coords(), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_nothing_within_tolerance() {
        let mut history = HistoryStore::new(100);
        history.append(at_pixel(130.0, 100.0, 1.0));

        let picker = ScreenPicker::default();
        assert!(picker.pick(&history, &flat(), Point2::new(100.0, 100.0), &viewport()).is_none());

        let hit = picker.pick(&history, &flat(), Point2::new(113.0, 100.0), &viewport()).unwrap();
        assert_relative_eq!(hit.distance_px, 17.0, epsilon = 1e-9);
    }

    #[test]
    fn test_scan_limit_skips_old_entries() {
        let mut history = HistoryStore::new(100);
        history.append(at_pixel(100.0, 100.0, 1.0)); // exact hit, but old
        for i in 0..3 {
            history.append(at_pixel(10.0, 10.0 + i as f64, 10.0 + i as f64));
        }

        let picker = ScreenPicker::new(DEFAULT_TOLERANCE_PX, 3);
        assert!(picker.pick(&history, &flat(), Point2::new(100.0, 100.0), &viewport()).is_none());

        let picker = ScreenPicker::new(DEFAULT_TOLERANCE_PX, 4);
        let hit = picker.pick(&history, &flat(), Point2::new(100.0, 100.0), &viewport()).unwrap();
        assert_eq!(hit.entry.raw.x, 1.0);
    }

    #[test]
    fn test_tie_prefers_most_recent() {
        let mut history = HistoryStore::new(100);
        history.append(at_pixel(100.0, 125.0, 1.0));
        history.append(at_pixel(100.0, 75.0, 2.0));

        let hit = ScreenPicker::new(30.0, DEFAULT_SCAN_LIMIT)
            .pick(&history, &flat(), Point2::new(100.0, 100.0), &viewport())
            .unwrap();
        assert_eq!(hit.entry.raw.x, 2.0);
    }

    #[test]
    fn test_zero_viewport_and_empty_history() {
        let mut history = HistoryStore::new(100);
        let picker = ScreenPicker::default();
        assert!(picker.pick(&history, &flat(), Point2::new(0.0, 0.0), &viewport()).is_none());

        history.append(at_pixel(0.0, 0.0, 1.0));
        assert!(picker
            .pick(&history, &flat(), Point2::new(0.0, 0.0), &Viewport::new(0.0, 0.0))
            .is_none());
    }
}
