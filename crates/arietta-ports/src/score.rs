use crate::sequencer::TrackEvent;
use crate::types::Tick;
use serde::{Deserialize, Serialize};

/// Page and highlighted glyphs at one moment of score time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreMoment {
    pub page: u32,
    pub note_ids: Vec<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ScoreError {
    #[error("no score for source: {0}")]
    NotFound(String),
    #[error("render failed: {0}")]
    Render(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Engraving toolkit. The score keeps its own internal time base; the engine
/// relates roll ticks to it only through wall-clock proportion, never through
/// tick equality.
pub trait ScorePort: Send {
    fn load(&mut self, source_id: &str) -> Result<(), ScoreError>;
    fn is_loaded(&self) -> bool;
    fn is_visible(&self) -> bool;

    fn page_count(&self) -> u32;
    fn render_page(&mut self, page: u32) -> Result<String, ScoreError>;

    /// The score rendered as its own playable event stream.
    fn render_events(&mut self) -> Result<Vec<Vec<TrackEvent>>, ScoreError>;
    fn stream_total_ticks(&self) -> Tick;
    fn song_time_ms(&self) -> f64;

    /// Time cursor query, `millis` in the score's own wall-clock time.
    fn elements_at(&self, millis: f64) -> ScoreMoment;
}

/// Pedal-usage chart alongside the image; only its visible X window is driven
/// by the engine.
pub trait PedalChartPort: Send {
    fn is_visible(&self) -> bool;
    fn set_window(&mut self, start_px: f64, end_px: f64);
}
