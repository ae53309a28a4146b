use crate::types::{OverlayPolicy, RecordingId, TempoSource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_volume_ratio() -> f64 {
    1.0
}

fn default_slider_bpm() -> f64 {
    60.0
}

fn default_soft_pedal_ratio() -> f64 {
    0.67
}

fn default_pan_boundary() -> u8 {
    66 // F# above middle C divides the keyboard into bass and treble pans
}

fn default_note_velocity() -> f64 {
    33.0
}

fn default_accent_bump() -> f64 {
    1.5
}

fn default_sustain_level() -> u8 {
    127
}

fn default_home_zoom() -> f64 {
    1.0
}

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordingEntry {
    pub slug: String,
    pub title: String,
    pub image_url: String,
    pub score_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogDto {
    pub recordings: BTreeMap<RecordingId, RecordingEntry>,
}

impl CatalogDto {
    pub fn first_id(&self) -> Option<&RecordingId> {
        self.recordings.keys().next()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    #[serde(default = "default_volume_ratio")]
    pub volume_ratio: f64,
    #[serde(default = "default_volume_ratio")]
    pub left_volume_ratio: f64,
    #[serde(default = "default_volume_ratio")]
    pub right_volume_ratio: f64,
    #[serde(default = "default_slider_bpm")]
    pub slider_bpm: f64,
    #[serde(default = "default_soft_pedal_ratio")]
    pub soft_pedal_ratio: f64,
    #[serde(default = "default_pan_boundary")]
    pub pan_boundary: u8,
    #[serde(default = "default_note_velocity")]
    pub default_note_velocity: f64,
    #[serde(default = "default_accent_bump")]
    pub accent_bump: f64,
    #[serde(default = "default_sustain_level")]
    pub sustain_level: u8,
    #[serde(default = "default_home_zoom")]
    pub home_zoom: f64,
    pub tempo_source: TempoSource,
    pub overlay_policy: OverlayPolicy,
    pub overlays_enabled: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            volume_ratio: 1.0,
            left_volume_ratio: 1.0,
            right_volume_ratio: 1.0,
            slider_bpm: 60.0,
            soft_pedal_ratio: 0.67,
            pan_boundary: 66,
            default_note_velocity: 33.0,
            accent_bump: 1.5,
            sustain_level: 127,
            home_zoom: 1.0,
            tempo_source: TempoSource::Midi,
            overlay_policy: OverlayPolicy::ActiveOnly,
            overlays_enabled: false,
        }
    }
}

pub trait CatalogPort: Send + Sync {
    fn load_catalog(&self) -> Result<CatalogDto, CatalogError>;
    fn load_settings(&self) -> Result<PlayerSettings, CatalogError>;
    fn save_settings(&self, s: &PlayerSettings) -> Result<(), CatalogError>;
}
