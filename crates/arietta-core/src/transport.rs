use arietta_domain_roll::model::{PedalMap, TempoMap};
use arietta_ports::types::Tick;
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Stopped,
    Playing,
    Paused,
}

/// What the engine must do to the collaborator ports after a transition.
/// The transport itself never touches a port: it only reconstructs state and
/// reports what changed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReleasePlan {
    pub notes_to_release: Vec<u8>,
    pub release_sustain: bool,
    pub release_soft: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlayOutcome {
    /// `stale_notes` are leftovers from a previous run that must be
    /// un-highlighted before the clock starts.
    Started { stale_notes: Vec<u8> },
    /// play() from Playing is a no-op, not an error.
    AlreadyPlaying,
}

/// Everything a seek must re-apply so that the instrument state matches what
/// a sequential play-through to `tick` would have produced.
#[derive(Clone, Debug, PartialEq)]
pub struct SeekPlan {
    pub tick: Tick,
    pub playback_bpm: f64,
    pub notes_to_release: Vec<u8>,
    pub sustain_on: bool,
    pub soft_on: bool,
    /// Playback was running and must resume after the jump.
    pub resume: bool,
}

/// Tick clock and play/pause/stop state machine. The tick itself is sampled
/// from the underlying event engine; the transport tracks held notes, pedal
/// levels, and the tempo ratio so they can be reconstructed at any seek
/// point.
#[derive(Clone, Debug)]
pub struct Transport {
    phase: Phase,
    tick: Tick,
    total_ticks: Tick,
    active_notes: BTreeSet<u8>,
    sustain_on: bool,
    soft_on: bool,
    sustain_locked: bool,
    soft_locked: bool,
    sustain_level: u8,
    base_bpm: f64,
    tempo_ratio: f64,
    slider_bpm: f64,
}

impl Transport {
    pub fn new(slider_bpm: f64) -> Self {
        Self {
            phase: Phase::Stopped,
            tick: 0,
            total_ticks: 0,
            active_notes: BTreeSet::new(),
            sustain_on: false,
            soft_on: false,
            sustain_locked: false,
            soft_locked: false,
            sustain_level: 127,
            base_bpm: 60.0,
            tempo_ratio: 1.0,
            slider_bpm,
        }
    }

    /// Reset for a freshly loaded recording: tick 0, no notes, no pedal,
    /// phase Stopped.
    pub fn reset(&mut self, total_ticks: Tick, base_bpm: f64) -> ReleasePlan {
        let plan = self.release_everything();
        self.phase = Phase::Stopped;
        self.tick = 0;
        self.total_ticks = total_ticks;
        self.base_bpm = base_bpm;
        self.tempo_ratio = 1.0;
        plan
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn total_ticks(&self) -> Tick {
        self.total_ticks
    }

    pub fn set_tick(&mut self, tick: Tick) {
        self.tick = tick.clamp(0, self.total_ticks);
    }

    pub fn progress(&self) -> f64 {
        if self.total_ticks <= 0 {
            return 0.0;
        }
        (self.tick as f64 / self.total_ticks as f64).min(1.0)
    }

    pub fn play(&mut self) -> PlayOutcome {
        if self.phase == Phase::Playing {
            return PlayOutcome::AlreadyPlaying;
        }
        // stale held notes from before a pause/stop never resume sounding
        let stale_notes = if self.phase == Phase::Stopped {
            self.active_notes.iter().copied().collect()
        } else {
            Vec::new()
        };
        if self.phase == Phase::Stopped {
            self.active_notes.clear();
        }
        debug!(from = ?self.phase, "transport: play");
        self.phase = Phase::Playing;
        PlayOutcome::Started { stale_notes }
    }

    /// Only legal from Playing. Held notes are kept so they resume silently.
    pub fn pause(&mut self) -> bool {
        if self.phase != Phase::Playing {
            return false;
        }
        debug!("transport: pause");
        self.phase = Phase::Paused;
        true
    }

    /// Legal from any phase; stopping an already stopped transport is an
    /// idempotent teardown.
    pub fn stop(&mut self) -> ReleasePlan {
        debug!(from = ?self.phase, "transport: stop");
        let plan = self.release_everything();
        self.phase = Phase::Stopped;
        self.tick = 0;
        plan
    }

    /// Reconstructs instrument state at `target` from the temporal indexes.
    pub fn seek(&mut self, target: Tick, tempo: &TempoMap, pedals: &PedalMap) -> SeekPlan {
        let tick = target.clamp(0, self.total_ticks);
        let bpm = tempo.bpm_at(tick);
        self.tempo_ratio = tempo_ratio(self.base_bpm, bpm);

        let map_state = pedals.active_at(tick);
        self.sustain_on = self.sustain_locked || map_state.sustain;
        self.soft_on = self.soft_locked || map_state.soft;

        // active notes cannot be un-sounded by rewinding: release them all
        let notes_to_release: Vec<u8> = self.active_notes.iter().copied().collect();
        self.active_notes.clear();

        self.tick = tick;
        SeekPlan {
            tick,
            playback_bpm: self.playback_bpm(),
            notes_to_release,
            sustain_on: self.sustain_on,
            soft_on: self.soft_on,
            resume: self.phase == Phase::Playing,
        }
    }

    /// Tempo change met during forward playback; no seek involved.
    /// Returns the new effective playback bpm to push to the event engine.
    pub fn apply_stream_tempo(&mut self, bpm: f64) -> f64 {
        self.tempo_ratio = tempo_ratio(self.base_bpm, bpm);
        self.playback_bpm()
    }

    pub fn set_slider_bpm(&mut self, bpm: f64) -> f64 {
        self.slider_bpm = bpm;
        self.playback_bpm()
    }

    pub fn slider_bpm(&self) -> f64 {
        self.slider_bpm
    }

    pub fn playback_bpm(&self) -> f64 {
        self.slider_bpm * self.tempo_ratio
    }

    pub fn tempo_ratio(&self) -> f64 {
        self.tempo_ratio
    }

    pub fn note_started(&mut self, note: u8) {
        self.active_notes.insert(note);
    }

    pub fn note_stopped(&mut self, note: u8) {
        self.active_notes.remove(&note);
    }

    pub fn active_notes(&self) -> impl Iterator<Item = u8> + '_ {
        self.active_notes.iter().copied()
    }

    pub fn has_active_notes(&self) -> bool {
        !self.active_notes.is_empty()
    }

    pub fn sustain_on(&self) -> bool {
        self.sustain_on
    }

    pub fn soft_on(&self) -> bool {
        self.soft_on
    }

    pub fn sustain_level(&self) -> u8 {
        self.sustain_level
    }

    pub fn set_sustain(&mut self, on: bool, level: u8) {
        self.sustain_on = on;
        if on {
            self.sustain_level = level;
        }
    }

    pub fn set_soft(&mut self, on: bool) {
        self.soft_on = on;
    }

    pub fn sustain_locked(&self) -> bool {
        self.sustain_locked
    }

    pub fn soft_locked(&self) -> bool {
        self.soft_locked
    }

    /// Returns the new locked state.
    pub fn toggle_sustain_lock(&mut self) -> bool {
        self.sustain_locked = !self.sustain_locked;
        self.sustain_locked
    }

    pub fn toggle_soft_lock(&mut self) -> bool {
        self.soft_locked = !self.soft_locked;
        self.soft_locked
    }

    fn release_everything(&mut self) -> ReleasePlan {
        let plan = ReleasePlan {
            notes_to_release: self.active_notes.iter().copied().collect(),
            release_sustain: self.sustain_on,
            release_soft: self.soft_on,
        };
        self.active_notes.clear();
        self.sustain_on = false;
        self.soft_on = false;
        plan
    }
}

/// `1 + (new - base) / base`, the stream tempo expressed relative to the
/// recording's base tempo.
fn tempo_ratio(base_bpm: f64, bpm: f64) -> f64 {
    if base_bpm <= 0.0 {
        return 1.0;
    }
    1.0 + (bpm - base_bpm) / base_bpm
}
