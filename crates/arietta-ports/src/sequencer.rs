use crate::types::Tick;
use serde::{Deserialize, Serialize};

/// One decoded event from the recording's stream. Events are temporally
/// ordered within a track; no ordering is promised across tracks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RollEvent {
    /// velocity 0 is a note-off, per MIDI running-status convention
    NoteOn { note: u8, velocity: u8 },
    ControlChange { controller: u8, value: u8 },
    TempoChange { bpm: f64 },
    Text { text: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackEvent {
    pub tick: Tick,
    pub track: usize,
    pub event: RollEvent,
}

pub const SUSTAIN_CONTROLLER: u8 = 64;
pub const SOFT_CONTROLLER: u8 = 67;

#[derive(thiserror::Error, Debug)]
pub enum SequencerError {
    #[error("no event stream loaded")]
    NotLoaded,
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Event-stream decoder and clock. Decoding the binary source is the
/// implementation's problem; the engine only ever sees `TrackEvent`s.
///
/// While playing, the implementation fires due events synchronously into the
/// engine's `handle_stream_event`; the engine additionally samples
/// `current_tick` on a fixed-period poll.
pub trait SequencerPort: Send {
    fn load(&mut self, data: &[u8]) -> Result<(), SequencerError>;

    fn total_ticks(&self) -> Tick;
    /// Ordered per-track event sequences, used once per recording to build
    /// the temporal indexes.
    fn tracks(&self) -> Vec<Vec<TrackEvent>>;

    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn is_playing(&self) -> bool;

    fn current_tick(&self) -> Tick;
    fn skip_to_tick(&mut self, tick: Tick);
    fn set_tempo(&mut self, bpm: f64);
    fn set_track_enabled(&mut self, track: usize, enabled: bool);
}
