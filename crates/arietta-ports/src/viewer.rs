use crate::types::{ImagePoint, ImageRect};

/// Deep-zoom viewer showing the roll facsimile. All methods must be safe to
/// call while the view is hidden; the engine checks `is_visible` first and
/// skips projections for a hidden view.
pub trait RollViewerPort: Send {
    fn open(&mut self, url: &str);
    fn is_visible(&self) -> bool;

    /// Current viewport bounds in viewport coordinates.
    fn bounds(&self) -> ImageRect;
    fn image_to_viewport(&self, point: ImagePoint) -> ImagePoint;
    fn viewport_to_image(&self, point: ImagePoint) -> ImagePoint;

    fn pan_to(&mut self, point: ImagePoint);
    fn zoom(&self) -> f64;
    fn set_zoom(&mut self, zoom: f64);

    fn add_overlay(&mut self, id: &str, rect: ImageRect);
    fn remove_overlay(&mut self, id: &str);
    fn clear_overlays(&mut self);
}
