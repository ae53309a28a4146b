use arietta_ports::types::{Pixel, Tick};
use serde::{Deserialize, Serialize};

/// Scalar constants derived from the roll's textual metadata. Immutable once
/// built for a recording; `first_hole_px` is already corrected for scroll
/// direction, so rendering code never re-applies the inversion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RollGeometry {
    pub first_hole_px: Pixel,
    pub last_hole_px: Pixel,
    pub avg_hole_width_px: Pixel,
    pub hole_separation_px: Pixel,
    pub roll_width_px: Pixel,
    pub image_width_px: Pixel,
    pub image_length_px: Pixel,
    /// Scroll-up rolls image the performance bottom-to-top.
    pub scroll_up: bool,
    pub pixels_per_inch: f64,
    /// Length of roll consumed per acceleration quantum, in inches.
    pub accel_quantum_inches: f64,
    /// Fractional tempo growth applied per quantum.
    pub accel_rate_per_quantum: f64,
}

impl Default for RollGeometry {
    fn default() -> Self {
        Self {
            first_hole_px: 0,
            last_hole_px: 0,
            avg_hole_width_px: 0,
            hole_separation_px: 0,
            roll_width_px: 0,
            image_width_px: 0,
            image_length_px: 0,
            scroll_up: false,
            pixels_per_inch: 300.0,
            accel_quantum_inches: 12.0,
            accel_rate_per_quantum: 0.0022,
        }
    }
}

impl RollGeometry {
    /// Tick numbers correspond to pixels from the first hole of the roll.
    pub fn tick_to_pixel(&self, tick: Tick) -> Pixel {
        if self.scroll_up {
            self.first_hole_px - tick
        } else {
            self.first_hole_px + tick
        }
    }

    pub fn pixel_to_tick(&self, pixel: Pixel) -> Tick {
        if self.scroll_up {
            self.first_hole_px - pixel
        } else {
            pixel - self.first_hole_px
        }
    }

    /// Approximate image column for a note's perforation, used when no
    /// analysis report supplies the real hole rectangle. Tracker bars lay 88
    /// key columns evenly across the roll width.
    pub fn note_column_px(&self, note: u8) -> Pixel {
        let margin = (self.image_width_px - self.roll_width_px).max(0) / 2;
        let lowest_key = 21i64; // A0
        let position = (note as i64 - lowest_key).clamp(0, 87);
        margin + position * self.roll_width_px / 88
    }
}
