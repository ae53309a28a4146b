use arietta_ports::catalog::PlayerSettings;
use arietta_ports::types::Gain01;

/// Dynamics configuration, shared by roll playback, manual key clicks, and
/// external controller input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExpressionParams {
    pub volume_ratio: f64,
    pub left_volume_ratio: f64,
    pub right_volume_ratio: f64,
    pub soft_pedal_ratio: f64,
    /// Notes below this number take the left-hand ratio, at/above the right.
    pub pan_boundary: u8,
    pub accent_bump: f64,
    /// Velocity assumed for gestures that carry none (manual clicks).
    pub default_velocity: f64,
    /// How far a held secondary modifier key pulls the soft ratio toward 1.0
    /// and tempers the accent bump, in [0, 1].
    pub secondary_blend: f64,
}

impl From<&PlayerSettings> for ExpressionParams {
    fn from(settings: &PlayerSettings) -> Self {
        Self {
            volume_ratio: settings.volume_ratio,
            left_volume_ratio: settings.left_volume_ratio,
            right_volume_ratio: settings.right_volume_ratio,
            soft_pedal_ratio: settings.soft_pedal_ratio,
            pan_boundary: settings.pan_boundary,
            accent_bump: settings.accent_bump,
            default_velocity: settings.default_note_velocity,
            secondary_blend: 0.5,
        }
    }
}

/// Modifiers active at the moment a note triggers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModifierState {
    pub soft_on: bool,
    pub accent_on: bool,
    pub secondary_held: bool,
}

/// Raw velocity plus active modifiers to a delivered gain in [0, 1].
///
/// Modifier order is fixed: velocity, global volume, soft pedal, pan ratio,
/// accent. A non-positive result means the caller suppresses the audio call
/// but still reflects the gesture visually and on any MIDI echo.
pub fn gain(params: &ExpressionParams, note: u8, raw_velocity: f64, m: &ModifierState) -> Gain01 {
    let mut value = (raw_velocity / 128.0).max(0.0);
    value *= params.volume_ratio;

    if m.soft_on {
        let mut ratio = params.soft_pedal_ratio;
        if m.secondary_held {
            // half-pedal: secondary key interpolates the soft ratio toward 1.0
            ratio += (1.0 - ratio) * params.secondary_blend;
        }
        value *= ratio;
    }

    if note < params.pan_boundary {
        value *= params.left_volume_ratio;
    } else {
        value *= params.right_volume_ratio;
    }

    if m.accent_on {
        let mut bump = params.accent_bump;
        if m.secondary_held {
            bump = 1.0 + (bump - 1.0) * params.secondary_blend;
        }
        value *= bump;
    }

    Gain01::new(value)
}
