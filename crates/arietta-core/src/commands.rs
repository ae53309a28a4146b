use arietta_domain_roll::builder::BuildReport;
use arietta_domain_roll::model::{PedalKind, RollMetadata};
use arietta_ports::types::{DeviceId, OverlayPolicy, Pixel, RecordingId, TempoSource, Tick};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeChannel {
    Master,
    Left,
    Right,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Command {
    LoadRecording { id: RecordingId },
    Play,
    Pause,
    Stop,
    Seek { tick: Tick },
    SeekToPixel { pixel: Pixel },
    SeekToProgress { progress: f64 },
    SetTempoSlider { bpm: f64 },
    SetVolume { channel: VolumeChannel, ratio: f64 },
    TogglePedalLock { pedal: PedalKind },
    SetTempoSource { source: TempoSource },
    SetOverlayPolicy { policy: OverlayPolicy },
    SetOverlaysEnabled { enabled: bool },
    SetTrackEnabled { track: usize, enabled: bool },
    ManualNote { note: u8, on: bool },
    SetAccent { on: bool },
    SetSecondaryModifier { held: bool },
    SelectMidiInput { device_id: DeviceId },
    PlayScore,
    StopScore,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseDto {
    Stopped,
    Playing,
    Paused,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EngineEvent {
    RecordingLoaded {
        id: RecordingId,
        title: String,
        metadata: RollMetadata,
        total_ticks: Tick,
        report: BuildReport,
    },
    /// Both source variants failed; controls for this recording stay
    /// disabled.
    PlaybackUnavailable { id: RecordingId },
    TransportUpdated {
        tick: Tick,
        progress: f64,
        phase: PhaseDto,
        playback_bpm: f64,
    },
    /// The key gesture, reported even when the computed gain suppressed the
    /// audio call.
    NoteHighlight { note: u8, on: bool },
    PedalChanged { pedal: PedalKind, on: bool },
    PedalLockChanged { pedal: PedalKind, locked: bool },
    ScorePageChanged { page: u32 },
    ScoreHighlights { note_ids: Vec<String> },
    ScorePlayStateChanged { playing: bool },
}
