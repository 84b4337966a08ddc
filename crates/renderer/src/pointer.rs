//! Active pointer positions fed to the `pointers` uniform array.
//!
//! Touch and cursor input arrive in window (logical, top-left origin)
//! coordinates and are stored in framebuffer space: scaled by the device pixel
//! ratio with Y flipped so the origin sits bottom-left like `gl_FragCoord`.
//! Every event that changes the active set replaces it wholesale; there is no
//! accumulation across events.

use crate::viewport::ViewportDimensions;

/// Maximum number of simultaneous points the `pointers` uniform array holds.
pub const POINTER_CAPACITY: usize = 10;

/// A single input point in window coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    /// Logical pixels from the left edge.
    pub x: f64,
    /// Logical pixels from the top edge.
    pub y: f64,
}

impl TouchPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Converts to framebuffer coordinates for the given viewport.
    pub fn to_framebuffer(self, viewport: &ViewportDimensions) -> [f32; 2] {
        let ratio = viewport.device_pixel_ratio;
        let x = self.x * ratio;
        let y = f64::from(viewport.height) - self.y * ratio;
        [x as f32, y as f32]
    }
}

/// Class of the primary pointing device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerDevice {
    /// Resolve from the host; a desktop window resolves to [`PointerDevice::Fine`].
    #[default]
    Auto,
    /// Mouse-like device: cursor movement is tracked as a synthetic touch.
    Fine,
    /// Touch-primary device: cursor events are ignored.
    Coarse,
}

impl PointerDevice {
    pub fn resolve(self) -> Self {
        match self {
            PointerDevice::Auto => PointerDevice::Fine,
            other => other,
        }
    }

    pub fn tracks_cursor(self) -> bool {
        matches!(self.resolve(), PointerDevice::Fine)
    }
}

/// Whether any pointer is currently down or hovering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    /// Every slot reads as the zero vector.
    Idle,
    /// At least one slot holds a live position.
    Active,
}

/// Fixed-capacity pointer set in framebuffer coordinates.
///
/// Unused slots always hold `[0.0, 0.0]`, so the whole array can be pushed
/// to the shader every frame.
#[derive(Debug, Clone)]
pub struct PointerTracker {
    slots: [[f32; 2]; POINTER_CAPACITY],
    active: usize,
    stored: Vec<TouchPoint>,
    device: PointerDevice,
}

impl PointerTracker {
    pub fn new(device: PointerDevice) -> Self {
        Self {
            slots: [[0.0; 2]; POINTER_CAPACITY],
            active: 0,
            stored: Vec::new(),
            device: device.resolve(),
        }
    }

    pub fn device(&self) -> PointerDevice {
        self.device
    }

    pub fn phase(&self) -> PointerPhase {
        if self.active == 0 {
            PointerPhase::Idle
        } else {
            PointerPhase::Active
        }
    }

    /// Positions currently in use, in traversal order.
    pub fn active(&self) -> &[[f32; 2]] {
        &self.slots[..self.active]
    }

    /// Every slot, with unused ones reading as the zero vector.
    pub fn slots(&self) -> &[[f32; 2]; POINTER_CAPACITY] {
        &self.slots
    }

    /// Resets every slot to zero; capacity is unchanged.
    pub fn clear(&mut self) {
        self.slots = [[0.0; 2]; POINTER_CAPACITY];
        self.active = 0;
    }

    /// Replaces the active set with `touches`, in order.
    ///
    /// Touches beyond [`POINTER_CAPACITY`] are dropped; the first ones win.
    pub fn set_from_touches(&mut self, touches: &[TouchPoint], viewport: &ViewportDimensions) {
        self.clear();
        if touches.len() > POINTER_CAPACITY {
            tracing::trace!(
                received = touches.len(),
                capacity = POINTER_CAPACITY,
                "dropping pointers beyond capacity"
            );
        }
        for (slot, touch) in self.slots.iter_mut().zip(touches) {
            *slot = touch.to_framebuffer(viewport);
        }
        self.active = touches.len().min(POINTER_CAPACITY);
    }

    /// Prepends the stored points to `extra`, forming a synthetic touch list.
    pub fn merge_with_synthetic_mouse(&self, extra: &[TouchPoint]) -> Vec<TouchPoint> {
        self.stored.iter().chain(extra).copied().collect()
    }

    /// Adds a persistent point that is merged into every cursor update.
    pub fn store_point(&mut self, point: TouchPoint) {
        self.stored.push(point);
    }

    /// Drops every stored point.
    pub fn clear_stored(&mut self) {
        self.stored.clear();
    }

    /// Cursor movement replaces the set with the cursor (plus stored points).
    ///
    /// Returns `false` when the device class ignores cursor input.
    pub fn handle_mouse_move(&mut self, point: TouchPoint, viewport: &ViewportDimensions) -> bool {
        if !self.device.tracks_cursor() {
            return false;
        }
        let touches = self.merge_with_synthetic_mouse(&[point]);
        self.set_from_touches(&touches, viewport);
        true
    }

    /// Cursor leaving the surface clears the set, then restores stored points.
    pub fn handle_mouse_leave(&mut self, viewport: &ViewportDimensions) -> bool {
        if !self.device.tracks_cursor() {
            return false;
        }
        self.clear();
        let touches = self.merge_with_synthetic_mouse(&[]);
        self.set_from_touches(&touches, viewport);
        true
    }

    /// A lifted finger ends the whole gesture.
    pub fn handle_touch_end(&mut self) {
        self.clear();
    }
}

impl Default for PointerTracker {
    fn default() -> Self {
        Self::new(PointerDevice::default())
    }
}

/// Fingers currently on the surface, in first-contact order.
///
/// The host reports one finger per event; this folds them back into the
/// ordered touch list a multi-point event carries.
#[derive(Debug, Clone, Default)]
pub struct ActiveTouches {
    fingers: Vec<(u64, TouchPoint)>,
}

impl ActiveTouches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or moves a finger and returns the full ordered list.
    pub fn update(&mut self, id: u64, point: TouchPoint) -> Vec<TouchPoint> {
        match self.fingers.iter_mut().find(|(finger, _)| *finger == id) {
            Some((_, existing)) => *existing = point,
            None => self.fingers.push((id, point)),
        }
        self.points()
    }

    pub fn remove(&mut self, id: u64) {
        self.fingers.retain(|(finger, _)| *finger != id);
    }

    pub fn points(&self) -> Vec<TouchPoint> {
        self.fingers.iter().map(|(_, point)| *point).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fingers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::WindowMetrics;

    fn viewport(width: f64, height: f64, ratio: f64) -> ViewportDimensions {
        ViewportDimensions::from_metrics(WindowMetrics::new(width, height, ratio))
    }

    #[test]
    fn touch_is_scaled_and_flipped() {
        let vp = viewport(500.0, 500.0, 2.0);
        let mut tracker = PointerTracker::new(PointerDevice::Coarse);
        tracker.set_from_touches(&[TouchPoint::new(100.0, 200.0)], &vp);
        assert_eq!(tracker.active(), &[[200.0, 600.0]]);
        assert_eq!(tracker.phase(), PointerPhase::Active);
    }

    #[test]
    fn move_events_replace_rather_than_accumulate() {
        let vp = viewport(400.0, 300.0, 1.5);
        let mut tracker = PointerTracker::default();
        let events: [&[TouchPoint]; 3] = [
            &[TouchPoint::new(1.0, 2.0), TouchPoint::new(3.0, 4.0), TouchPoint::new(5.0, 6.0)],
            &[TouchPoint::new(10.0, 20.0), TouchPoint::new(30.0, 40.0)],
            &[TouchPoint::new(7.0, 8.0)],
        ];
        for touches in events {
            tracker.set_from_touches(touches, &vp);
        }
        let h = f64::from(vp.height);
        assert_eq!(tracker.active(), &[[(7.0 * 1.5) as f32, (h - 8.0 * 1.5) as f32]]);
        assert!(tracker.slots()[1..].iter().all(|slot| *slot == [0.0, 0.0]));
    }

    #[test]
    fn touch_end_and_mouse_leave_zero_every_slot() {
        let vp = viewport(300.0, 300.0, 1.0);
        let mut tracker = PointerTracker::new(PointerDevice::Fine);
        let many: Vec<_> = (0..4).map(|i| TouchPoint::new(i as f64, i as f64)).collect();
        tracker.set_from_touches(&many, &vp);
        tracker.handle_touch_end();
        assert!(tracker.slots().iter().all(|slot| *slot == [0.0, 0.0]));
        assert_eq!(tracker.phase(), PointerPhase::Idle);

        tracker.handle_mouse_move(TouchPoint::new(12.0, 34.0), &vp);
        assert_eq!(tracker.phase(), PointerPhase::Active);
        tracker.handle_mouse_leave(&vp);
        assert!(tracker.slots().iter().all(|slot| *slot == [0.0, 0.0]));
        assert_eq!(tracker.phase(), PointerPhase::Idle);
    }

    #[test]
    fn excess_pointers_keep_the_first_n() {
        let vp = viewport(100.0, 100.0, 1.0);
        let mut tracker = PointerTracker::default();
        let touches: Vec<_> = (0..POINTER_CAPACITY + 5)
            .map(|i| TouchPoint::new(i as f64, 0.0))
            .collect();
        tracker.set_from_touches(&touches, &vp);
        assert_eq!(tracker.active().len(), POINTER_CAPACITY);
        for (i, slot) in tracker.active().iter().enumerate() {
            assert_eq!(slot[0], i as f32);
        }
    }

    #[test]
    fn coarse_device_ignores_cursor() {
        let vp = viewport(100.0, 100.0, 1.0);
        let mut tracker = PointerTracker::new(PointerDevice::Coarse);
        assert!(!tracker.handle_mouse_move(TouchPoint::new(5.0, 5.0), &vp));
        assert_eq!(tracker.phase(), PointerPhase::Idle);
        tracker.set_from_touches(&[TouchPoint::new(1.0, 1.0)], &vp);
        assert!(!tracker.handle_mouse_leave(&vp));
        assert_eq!(tracker.active().len(), 1);
    }

    #[test]
    fn stored_points_lead_the_synthetic_stream() {
        let vp = viewport(200.0, 100.0, 1.0);
        let mut tracker = PointerTracker::new(PointerDevice::Auto);
        assert_eq!(tracker.device(), PointerDevice::Fine);
        tracker.store_point(TouchPoint::new(1.0, 1.0));
        tracker.handle_mouse_move(TouchPoint::new(50.0, 25.0), &vp);
        assert_eq!(tracker.active(), &[[1.0, 99.0], [50.0, 75.0]]);

        tracker.handle_mouse_leave(&vp);
        assert_eq!(tracker.active(), &[[1.0, 99.0]]);

        tracker.clear_stored();
        tracker.handle_mouse_leave(&vp);
        assert_eq!(tracker.phase(), PointerPhase::Idle);
    }

    #[test]
    fn active_touches_keep_first_contact_order() {
        let mut touches = ActiveTouches::new();
        touches.update(7, TouchPoint::new(1.0, 1.0));
        touches.update(3, TouchPoint::new(2.0, 2.0));
        let points = touches.update(7, TouchPoint::new(9.0, 9.0));
        assert_eq!(points, vec![TouchPoint::new(9.0, 9.0), TouchPoint::new(2.0, 2.0)]);
        touches.remove(7);
        assert_eq!(touches.points(), vec![TouchPoint::new(2.0, 2.0)]);
        touches.remove(3);
        assert!(touches.is_empty());
    }
}
