//! Zoom state and auto-fit calculation
//!
//! Manages the zoom level, whether it tracks the viewport automatically,
//! and the fit computation used when it does.

use crate::document::PageSize;

/// Fixed padding and safety margin applied when fitting a page
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitParams {
    /// Padding subtracted from both viewport dimensions
    pub padding: f32,
    /// Multiplier applied to the tighter ratio
    pub margin: f32,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            padding: 64.0,
            margin: 0.95,
        }
    }
}

/// Visible area the page has to fit into
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitViewport {
    pub width: f32,
    pub height: f32,
    /// Width taken by a visible side panel
    pub reserved_width: f32,
}

/// Zoom that fits `page` entirely into `viewport`, clamped to
/// [`Zoom::MIN_LEVEL`]..=[`Zoom::MAX_LEVEL`].
pub fn compute_fit(page: PageSize, viewport: FitViewport, params: FitParams) -> f32 {
    if !(page.width > 0.0 && page.height > 0.0) {
        return Zoom::clamp_level(1.0);
    }

    let available_w = viewport.width - params.padding - viewport.reserved_width;
    let available_h = viewport.height - params.padding;

    let width_zoom = available_w / page.width;
    let height_zoom = available_h / page.height;

    Zoom::clamp_level(width_zoom.min(height_zoom) * params.margin)
}

/// Zoom level for the current page
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Zoom {
    /// Current zoom factor (1.0 = 100%)
    level: f32,
    /// Recompute the level whenever the viewport or page changes
    auto_fit: bool,
}

impl Default for Zoom {
    fn default() -> Self {
        Self {
            level: 1.0,
            auto_fit: true,
        }
    }
}

impl Zoom {
    pub const MIN_LEVEL: f32 = 0.1;
    pub const MAX_LEVEL: f32 = 3.0;
    /// Default manual zoom step
    pub const STEP: f32 = 0.2;

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn auto_fit(&self) -> bool {
        self.auto_fit
    }

    /// Level as a rounded percentage for display
    pub fn percent(&self) -> u16 {
        (self.level * 100.0).round() as u16
    }

    /// Manual zoom in; turns auto-fit off
    pub fn zoom_in(&mut self, step: f32) {
        self.set_level(self.level + step);
    }

    /// Manual zoom out; turns auto-fit off
    pub fn zoom_out(&mut self, step: f32) {
        self.set_level(self.level - step);
    }

    /// Explicit level; turns auto-fit off
    pub fn set_level(&mut self, level: f32) {
        self.auto_fit = false;
        self.level = Self::clamp_level(level);
    }

    /// Turns auto-fit back on. The caller recomputes the fit level.
    pub fn enable_fit(&mut self) {
        self.auto_fit = true;
    }

    /// Stores a computed fit level without touching the mode.
    /// Returns true if the level changed.
    pub fn apply_fit(&mut self, level: f32) -> bool {
        let level = Self::clamp_level(level);
        let changed = (self.level - level).abs() > f32::EPSILON;
        self.level = level;
        changed
    }

    /// Clamp to the valid range, handling NaN/Inf
    pub fn clamp_level(level: f32) -> f32 {
        if !level.is_finite() {
            1.0
        } else {
            level.clamp(Self::MIN_LEVEL, Self::MAX_LEVEL)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(width: f32, height: f32) -> FitViewport {
        FitViewport {
            width,
            height,
            reserved_width: 0.0,
        }
    }

    #[test]
    fn portrait_page_fits_by_height() {
        let zoom = compute_fit(
            PageSize::new(400.0, 800.0),
            viewport(800.0, 600.0),
            FitParams::default(),
        );
        // min((800-64)/400, (600-64)/800) * 0.95 = 0.67 * 0.95
        assert!((zoom - 0.6365).abs() < 1e-4, "got {zoom}");
    }

    #[test]
    fn reserved_panel_width_shrinks_available_space() {
        let page = PageSize::new(600.0, 400.0);
        let open = compute_fit(
            page,
            FitViewport {
                width: 1000.0,
                height: 2000.0,
                reserved_width: 320.0,
            },
            FitParams::default(),
        );
        let closed = compute_fit(page, viewport(1000.0, 2000.0), FitParams::default());
        assert!(open < closed);
        assert!((open - (1000.0 - 64.0 - 320.0) / 600.0 * 0.95).abs() < 1e-4);
    }

    #[test]
    fn fit_stays_within_bounds() {
        let params = FitParams::default();
        let sizes = [0.5_f32, 1.0, 10.0, 64.0, 300.0, 5_000.0, 1e6];
        for &pw in &sizes {
            for &ph in &sizes {
                for &vw in &sizes {
                    for &vh in &sizes {
                        let z = compute_fit(PageSize::new(pw, ph), viewport(vw, vh), params);
                        assert!(
                            (Zoom::MIN_LEVEL..=Zoom::MAX_LEVEL).contains(&z),
                            "{pw}x{ph} in {vw}x{vh} -> {z}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn manual_zoom_disables_auto_fit_and_clamps() {
        let mut zoom = Zoom::default();
        assert!(zoom.auto_fit());

        zoom.zoom_in(Zoom::STEP);
        assert!(!zoom.auto_fit());
        assert!((zoom.level() - 1.2).abs() < 1e-6);

        for _ in 0..20 {
            zoom.zoom_in(Zoom::STEP);
        }
        assert_eq!(zoom.level(), Zoom::MAX_LEVEL);

        for _ in 0..40 {
            zoom.zoom_out(Zoom::STEP);
        }
        assert_eq!(zoom.level(), Zoom::MIN_LEVEL);
    }

    #[test]
    fn apply_fit_keeps_mode_and_reports_change() {
        let mut zoom = Zoom::default();
        assert!(zoom.apply_fit(0.5));
        assert!(zoom.auto_fit());
        assert!(!zoom.apply_fit(0.5));
        assert_eq!(zoom.percent(), 50);
    }

    #[test]
    fn clamp_handles_non_finite() {
        assert_eq!(Zoom::clamp_level(f32::NAN), 1.0);
        assert_eq!(Zoom::clamp_level(f32::INFINITY), 1.0);
        assert_eq!(Zoom::clamp_level(-4.0), Zoom::MIN_LEVEL);
    }
}
