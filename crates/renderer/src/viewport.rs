//! Keeps the drawable surface size in step with the window and its pixel density.

use winit::dpi::PhysicalSize;

/// Window dimensions as reported by the host, before pixel-density scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowMetrics {
    pub logical_width: f64,
    pub logical_height: f64,
    pub device_pixel_ratio: f64,
}

impl WindowMetrics {
    pub fn new(logical_width: f64, logical_height: f64, device_pixel_ratio: f64) -> Self {
        Self {
            logical_width,
            logical_height,
            device_pixel_ratio,
        }
    }

    /// Derives logical metrics from a physical size and the window scale factor.
    pub fn from_physical(size: PhysicalSize<u32>, scale_factor: f64) -> Self {
        let ratio = normalize_ratio(scale_factor);
        Self {
            logical_width: f64::from(size.width) / ratio,
            logical_height: f64::from(size.height) / ratio,
            device_pixel_ratio: ratio,
        }
    }
}

/// Drawable size in physical pixels plus the ratio used to derive it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportDimensions {
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: f64,
}

impl ViewportDimensions {
    pub fn from_metrics(metrics: WindowMetrics) -> Self {
        let ratio = normalize_ratio(metrics.device_pixel_ratio);
        Self {
            width: scale_to_pixels(metrics.logical_width, ratio),
            height: scale_to_pixels(metrics.logical_height, ratio),
            device_pixel_ratio: ratio,
        }
    }

    /// Value for the `resolution` uniform.
    pub fn resolution(&self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }

    /// Rasterizer viewport rectangle `[x, y, width, height]`.
    pub fn rect(&self) -> [f32; 4] {
        [0.0, 0.0, self.width as f32, self.height as f32]
    }

    pub fn physical_size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Default for ViewportDimensions {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            device_pixel_ratio: 1.0,
        }
    }
}

/// What a [`ViewportManager::resize`] call did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportChange {
    /// Same physical size and ratio as before; nothing to reconfigure.
    Unchanged,
    /// New dimensions the surface and rasterizer viewport must adopt.
    Resized(ViewportDimensions),
}

/// Tracks the current drawable size; starts empty until the first resize.
#[derive(Debug, Clone, Default)]
pub struct ViewportManager {
    current: ViewportDimensions,
}

impl ViewportManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dimensions(&self) -> ViewportDimensions {
        self.current
    }

    /// Recomputes the physical drawable size from the window metrics.
    ///
    /// Repeated calls with unchanged metrics report [`ViewportChange::Unchanged`]
    /// so callers can skip reconfiguring the surface.
    pub fn resize(&mut self, metrics: WindowMetrics) -> ViewportChange {
        let next = ViewportDimensions::from_metrics(metrics);
        if next == self.current {
            return ViewportChange::Unchanged;
        }
        tracing::debug!(
            width = next.width,
            height = next.height,
            device_pixel_ratio = next.device_pixel_ratio,
            "viewport resized"
        );
        self.current = next;
        ViewportChange::Resized(next)
    }
}

fn normalize_ratio(ratio: f64) -> f64 {
    if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        1.0
    }
}

fn scale_to_pixels(logical: f64, ratio: f64) -> u32 {
    let physical = logical * ratio;
    if !physical.is_finite() || physical <= 0.0 {
        return 0;
    }
    // Truncate like a canvas size assignment, absorbing float noise from the
    // physical -> logical -> physical round trip.
    (physical + 1e-6).floor().min(f64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_scales_logical_size_by_pixel_ratio() {
        let sizes = [(1.0, 1.0), (500.0, 500.0), (1280.0, 720.0), (333.0, 1999.0)];
        let ratios = [1.0, 1.5, 2.0, 3.0];
        for (w, h) in sizes {
            for r in ratios {
                let mut manager = ViewportManager::new();
                manager.resize(WindowMetrics::new(w, h, r));
                let dims = manager.dimensions();
                assert_eq!(dims.width, (w * r) as u32, "width for {w}x{h}@{r}");
                assert_eq!(dims.height, (h * r) as u32, "height for {w}x{h}@{r}");
            }
        }
    }

    #[test]
    fn resize_is_idempotent_for_unchanged_metrics() {
        let mut manager = ViewportManager::new();
        let metrics = WindowMetrics::new(800.0, 600.0, 2.0);
        assert!(matches!(manager.resize(metrics), ViewportChange::Resized(_)));
        let first = manager.dimensions();
        assert_eq!(manager.resize(metrics), ViewportChange::Unchanged);
        assert_eq!(manager.resize(metrics), ViewportChange::Unchanged);
        assert_eq!(manager.dimensions(), first);
    }

    #[test]
    fn physical_round_trip_matches_window_size() {
        for (width, height, scale) in [(1001, 667, 1.5), (1000, 1000, 3.0), (2560, 1440, 1.25)] {
            let metrics = WindowMetrics::from_physical(PhysicalSize::new(width, height), scale);
            let dims = ViewportDimensions::from_metrics(metrics);
            assert_eq!((dims.width, dims.height), (width, height));
        }
    }

    #[test]
    fn viewport_rect_and_resolution_follow_dimensions() {
        let dims = ViewportDimensions::from_metrics(WindowMetrics::new(640.0, 480.0, 2.0));
        assert_eq!(dims.resolution(), [1280.0, 960.0]);
        assert_eq!(dims.rect(), [0.0, 0.0, 1280.0, 960.0]);
    }

    #[test]
    fn invalid_pixel_ratio_falls_back_to_one() {
        let dims = ViewportDimensions::from_metrics(WindowMetrics::new(100.0, 50.0, f64::NAN));
        assert_eq!((dims.width, dims.height), (100, 50));
        assert_eq!(dims.device_pixel_ratio, 1.0);
        let zero = ViewportDimensions::from_metrics(WindowMetrics::new(0.0, 50.0, 1.0));
        assert!(zero.is_empty());
    }
}
