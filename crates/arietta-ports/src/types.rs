use serde::{Deserialize, Serialize};
use std::fmt;

pub type Tick = i64; // stream time, numerically equal to a pixel offset on the roll image
pub type Pixel = i64; // vertical pixel position on the roll facsimile

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordingId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

/// Delivered note gain after all expression modifiers, clamped to [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct Gain01(pub f64);

impl Gain01 {
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    pub fn get(self) -> f64 {
        self.0
    }

    pub fn is_audible(self) -> bool {
        self.0 > 0.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImagePoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Which tempo curve governs playback when both are available.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TempoSource {
    /// Tempo events encoded in the recording's event stream.
    #[default]
    Midi,
    /// Synthetic curve derived from the physical roll geometry.
    Acceleration,
}

/// Which hole overlays stay drawn on the image surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OverlayPolicy {
    /// Only overlays whose note is sounding at the current tick.
    #[default]
    ActiveOnly,
    /// Every overlay inside the currently visible pixel window.
    Windowed,
}

impl fmt::Display for RecordingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
