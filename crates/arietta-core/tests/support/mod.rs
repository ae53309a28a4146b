#![allow(dead_code)]

use arietta_core::{Engine, EnginePorts};
use arietta_ports::analysis::{AnalysisError, AnalysisPort, HoleDescriptor};
use arietta_ports::catalog::{
    CatalogDto, CatalogError, CatalogPort, PlayerSettings, RecordingEntry,
};
use arietta_ports::midi::{
    InputEventCallback, MidiError, MidiInputDevice, MidiInputPort, MidiInputStream, MidiMessage,
    MidiOutputPort,
};
use arietta_ports::sampler::SamplerPort;
use arietta_ports::score::{PedalChartPort, ScoreError, ScoreMoment, ScorePort};
use arietta_ports::sequencer::{RollEvent, SequencerError, SequencerPort, TrackEvent};
use arietta_ports::source::{SourceError, SourcePort, SourceVariant};
use arietta_ports::types::{DeviceId, Gain01, ImagePoint, ImageRect, RecordingId, Tick};
use arietta_ports::viewer::RollViewerPort;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

// ---- event stream helpers ----

pub fn note_on(tick: Tick, track: usize, note: u8, velocity: u8) -> TrackEvent {
    TrackEvent {
        tick,
        track,
        event: RollEvent::NoteOn { note, velocity },
    }
}

pub fn control(tick: Tick, track: usize, controller: u8, value: u8) -> TrackEvent {
    TrackEvent {
        tick,
        track,
        event: RollEvent::ControlChange { controller, value },
    }
}

pub fn tempo(tick: Tick, track: usize, bpm: f64) -> TrackEvent {
    TrackEvent {
        tick,
        track,
        event: RollEvent::TempoChange { bpm },
    }
}

pub fn text(tick: Tick, track: usize, line: &str) -> TrackEvent {
    TrackEvent {
        tick,
        track,
        event: RollEvent::Text {
            text: line.to_string(),
        },
    }
}

pub fn rec_id() -> RecordingId {
    RecordingId("rec-1".to_string())
}

// ---- sequencer ----

#[derive(Clone, Debug, PartialEq)]
pub enum SeqCall {
    Load,
    Play,
    Pause,
    Stop,
    SetTempo(f64),
    SkipTo(Tick),
    SetTrackEnabled(usize, bool),
}

#[derive(Default)]
pub struct SeqState {
    pub calls: Vec<SeqCall>,
    pub playing: bool,
    pub tick: Tick,
}

impl SeqState {
    pub fn tempo_calls(&self) -> Vec<f64> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                SeqCall::SetTempo(bpm) => Some(*bpm),
                _ => None,
            })
            .collect()
    }
}

pub struct FakeSequencer {
    state: Arc<Mutex<SeqState>>,
    tracks: Vec<Vec<TrackEvent>>,
    total: Tick,
}

impl FakeSequencer {
    pub fn new(tracks: Vec<Vec<TrackEvent>>, total: Tick) -> (Self, Arc<Mutex<SeqState>>) {
        let state = Arc::new(Mutex::new(SeqState::default()));
        (
            Self {
                state: Arc::clone(&state),
                tracks,
                total,
            },
            state,
        )
    }
}

impl SequencerPort for FakeSequencer {
    fn load(&mut self, _data: &[u8]) -> Result<(), SequencerError> {
        self.state.lock().calls.push(SeqCall::Load);
        Ok(())
    }

    fn total_ticks(&self) -> Tick {
        self.total
    }

    fn tracks(&self) -> Vec<Vec<TrackEvent>> {
        self.tracks.clone()
    }

    fn play(&mut self) {
        let mut state = self.state.lock();
        state.playing = true;
        state.calls.push(SeqCall::Play);
    }

    fn pause(&mut self) {
        let mut state = self.state.lock();
        state.playing = false;
        state.calls.push(SeqCall::Pause);
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        state.playing = false;
        state.tick = 0;
        state.calls.push(SeqCall::Stop);
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn current_tick(&self) -> Tick {
        self.state.lock().tick
    }

    fn skip_to_tick(&mut self, tick: Tick) {
        let mut state = self.state.lock();
        state.tick = tick;
        state.calls.push(SeqCall::SkipTo(tick));
    }

    fn set_tempo(&mut self, bpm: f64) {
        self.state.lock().calls.push(SeqCall::SetTempo(bpm));
    }

    fn set_track_enabled(&mut self, track: usize, enabled: bool) {
        self.state
            .lock()
            .calls
            .push(SeqCall::SetTrackEnabled(track, enabled));
    }
}

// ---- sampler ----

#[derive(Clone, Debug, PartialEq)]
pub enum SamplerCall {
    NoteOn(u8, f64),
    NoteOff(u8),
    PedalDown(Option<u8>),
    PedalUp,
}

pub struct FakeSampler {
    calls: Arc<Mutex<Vec<SamplerCall>>>,
}

impl FakeSampler {
    pub fn new() -> (Self, Arc<Mutex<Vec<SamplerCall>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl SamplerPort for FakeSampler {
    fn note_on(&mut self, note: u8, gain: Gain01) {
        self.calls.lock().push(SamplerCall::NoteOn(note, gain.get()));
    }

    fn note_off(&mut self, note: u8) {
        self.calls.lock().push(SamplerCall::NoteOff(note));
    }

    fn pedal_down(&mut self, level: Option<u8>) {
        self.calls.lock().push(SamplerCall::PedalDown(level));
    }

    fn pedal_up(&mut self) {
        self.calls.lock().push(SamplerCall::PedalUp);
    }
}

// ---- viewer ----

pub struct ViewerState {
    pub visible: bool,
    pub bounds: ImageRect,
    pub zoom: f64,
    pub opened: Vec<String>,
    pub pans: Vec<ImagePoint>,
    pub overlays: BTreeMap<String, ImageRect>,
    pub adds: usize,
    pub removes: usize,
    pub clears: usize,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self {
            visible: true,
            bounds: ImageRect {
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 400.0,
            },
            zoom: 1.0,
            opened: Vec::new(),
            pans: Vec::new(),
            overlays: BTreeMap::new(),
            adds: 0,
            removes: 0,
            clears: 0,
        }
    }
}

/// Viewport and image coordinates are identical in the fake: transforms are
/// the identity.
pub struct FakeViewer {
    state: Arc<Mutex<ViewerState>>,
}

impl FakeViewer {
    pub fn new() -> (Self, Arc<Mutex<ViewerState>>) {
        let state = Arc::new(Mutex::new(ViewerState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

impl RollViewerPort for FakeViewer {
    fn open(&mut self, url: &str) {
        self.state.lock().opened.push(url.to_string());
    }

    fn is_visible(&self) -> bool {
        self.state.lock().visible
    }

    fn bounds(&self) -> ImageRect {
        self.state.lock().bounds
    }

    fn image_to_viewport(&self, point: ImagePoint) -> ImagePoint {
        point
    }

    fn viewport_to_image(&self, point: ImagePoint) -> ImagePoint {
        point
    }

    fn pan_to(&mut self, point: ImagePoint) {
        self.state.lock().pans.push(point);
    }

    fn zoom(&self) -> f64 {
        self.state.lock().zoom
    }

    fn set_zoom(&mut self, zoom: f64) {
        self.state.lock().zoom = zoom;
    }

    fn add_overlay(&mut self, id: &str, rect: ImageRect) {
        let mut state = self.state.lock();
        state.adds += 1;
        state.overlays.insert(id.to_string(), rect);
    }

    fn remove_overlay(&mut self, id: &str) {
        let mut state = self.state.lock();
        state.removes += 1;
        state.overlays.remove(id);
    }

    fn clear_overlays(&mut self) {
        let mut state = self.state.lock();
        state.clears += 1;
        state.overlays.clear();
    }
}

// ---- score ----

pub struct ScoreState {
    pub loaded: bool,
    pub visible: bool,
    pub load_calls: Vec<String>,
    pub queried_millis: Vec<f64>,
    pub song_time_ms: f64,
    pub stream_total: Tick,
    pub page_count: u32,
}

impl Default for ScoreState {
    fn default() -> Self {
        Self {
            loaded: false,
            visible: true,
            load_calls: Vec::new(),
            queried_millis: Vec::new(),
            song_time_ms: 10_000.0,
            stream_total: 1_000,
            page_count: 4,
        }
    }
}

/// `elements_at` derives the page from whole seconds so tests can steer page
/// turns with the queried time alone.
pub struct FakeScore {
    state: Arc<Mutex<ScoreState>>,
}

impl FakeScore {
    pub fn new() -> (Self, Arc<Mutex<ScoreState>>) {
        let state = Arc::new(Mutex::new(ScoreState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

impl ScorePort for FakeScore {
    fn load(&mut self, source_id: &str) -> Result<(), ScoreError> {
        let mut state = self.state.lock();
        state.load_calls.push(source_id.to_string());
        state.loaded = true;
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.state.lock().loaded
    }

    fn is_visible(&self) -> bool {
        self.state.lock().visible
    }

    fn page_count(&self) -> u32 {
        self.state.lock().page_count
    }

    fn render_page(&mut self, page: u32) -> Result<String, ScoreError> {
        Ok(format!("<svg data-page=\"{page}\"/>"))
    }

    fn render_events(&mut self) -> Result<Vec<Vec<TrackEvent>>, ScoreError> {
        Ok(Vec::new())
    }

    fn stream_total_ticks(&self) -> Tick {
        self.state.lock().stream_total
    }

    fn song_time_ms(&self) -> f64 {
        self.state.lock().song_time_ms
    }

    fn elements_at(&self, millis: f64) -> ScoreMoment {
        let mut state = self.state.lock();
        state.queried_millis.push(millis);
        ScoreMoment {
            page: (millis / 1000.0) as u32,
            note_ids: vec![format!("m{}", millis as i64)],
        }
    }
}

// ---- pedal chart ----

pub struct ChartState {
    pub visible: bool,
    pub windows: Vec<(f64, f64)>,
}

impl Default for ChartState {
    fn default() -> Self {
        Self {
            visible: true,
            windows: Vec::new(),
        }
    }
}

pub struct FakeChart {
    state: Arc<Mutex<ChartState>>,
}

impl FakeChart {
    pub fn new() -> (Self, Arc<Mutex<ChartState>>) {
        let state = Arc::new(Mutex::new(ChartState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

impl PedalChartPort for FakeChart {
    fn is_visible(&self) -> bool {
        self.state.lock().visible
    }

    fn set_window(&mut self, start_px: f64, end_px: f64) {
        self.state.lock().windows.push((start_px, end_px));
    }
}

// ---- analysis ----

pub struct FakeAnalysis {
    pub holes: Vec<HoleDescriptor>,
    pub fail: bool,
}

impl AnalysisPort for FakeAnalysis {
    fn decode(&self, _data: &[u8]) -> Result<Vec<HoleDescriptor>, AnalysisError> {
        if self.fail {
            Err(AnalysisError::Parse("bad report".to_string()))
        } else {
            Ok(self.holes.clone())
        }
    }
}

// ---- source ----

pub struct SourceState {
    pub primary: Option<Vec<u8>>,
    pub secondary: Option<Vec<u8>>,
    pub analysis: Option<Vec<u8>>,
    pub fetches: Vec<(String, SourceVariant)>,
}

impl Default for SourceState {
    fn default() -> Self {
        Self {
            primary: Some(vec![0x4d, 0x54, 0x68, 0x64]),
            secondary: None,
            analysis: None,
            fetches: Vec::new(),
        }
    }
}

pub struct FakeSource {
    state: Arc<Mutex<SourceState>>,
}

impl FakeSource {
    pub fn new() -> (Self, Arc<Mutex<SourceState>>) {
        let state = Arc::new(Mutex::new(SourceState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

impl SourcePort for FakeSource {
    fn fetch(&self, slug: &str, variant: SourceVariant) -> Result<Vec<u8>, SourceError> {
        let mut state = self.state.lock();
        state.fetches.push((slug.to_string(), variant));
        let data = match variant {
            SourceVariant::Primary => state.primary.clone(),
            SourceVariant::Secondary => state.secondary.clone(),
        };
        data.ok_or_else(|| SourceError::Network(format!("{slug}: unreachable")))
    }

    fn fetch_analysis(&self, _slug: &str) -> Result<Option<Vec<u8>>, SourceError> {
        Ok(self.state.lock().analysis.clone())
    }
}

// ---- midi ----

#[derive(Default)]
pub struct MidiInState {
    pub callback: Option<InputEventCallback>,
    pub closed: usize,
}

pub struct FakeMidiIn {
    state: Arc<Mutex<MidiInState>>,
}

impl FakeMidiIn {
    pub fn new() -> (Self, Arc<Mutex<MidiInState>>) {
        let state = Arc::new(Mutex::new(MidiInState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

impl MidiInputPort for FakeMidiIn {
    fn list_inputs(&self) -> Result<Vec<MidiInputDevice>, MidiError> {
        Ok(vec![MidiInputDevice {
            id: DeviceId("dev-0".to_string()),
            name: "Fake Controller".to_string(),
            is_available: true,
        }])
    }

    fn open_input(
        &self,
        _device_id: &DeviceId,
        cb: InputEventCallback,
    ) -> Result<Box<dyn MidiInputStream>, MidiError> {
        self.state.lock().callback = Some(cb);
        Ok(Box::new(FakeMidiStream {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeMidiStream {
    state: Arc<Mutex<MidiInState>>,
}

impl MidiInputStream for FakeMidiStream {
    fn close(self: Box<Self>) {
        self.state.lock().closed += 1;
    }
}

pub struct FakeMidiOut {
    sent: Arc<Mutex<Vec<MidiMessage>>>,
}

impl FakeMidiOut {
    pub fn new() -> (Self, Arc<Mutex<Vec<MidiMessage>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                sent: Arc::clone(&sent),
            },
            sent,
        )
    }
}

impl MidiOutputPort for FakeMidiOut {
    fn send(&mut self, message: MidiMessage) -> Result<(), MidiError> {
        self.sent.lock().push(message);
        Ok(())
    }
}

// ---- catalog ----

pub struct CatalogState {
    pub catalog: CatalogDto,
    pub settings: PlayerSettings,
    pub saved: Vec<PlayerSettings>,
}

pub struct FakeCatalog {
    state: Arc<Mutex<CatalogState>>,
}

impl FakeCatalog {
    pub fn new(catalog: CatalogDto, settings: PlayerSettings) -> (Self, Arc<Mutex<CatalogState>>) {
        let state = Arc::new(Mutex::new(CatalogState {
            catalog,
            settings,
            saved: Vec::new(),
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

impl CatalogPort for FakeCatalog {
    fn load_catalog(&self) -> Result<CatalogDto, CatalogError> {
        Ok(self.state.lock().catalog.clone())
    }

    fn load_settings(&self) -> Result<PlayerSettings, CatalogError> {
        Ok(self.state.lock().settings.clone())
    }

    fn save_settings(&self, s: &PlayerSettings) -> Result<(), CatalogError> {
        self.state.lock().saved.push(s.clone());
        Ok(())
    }
}

// ---- harness ----

pub struct Handles {
    pub seq: Arc<Mutex<SeqState>>,
    pub sampler: Arc<Mutex<Vec<SamplerCall>>>,
    pub viewer: Arc<Mutex<ViewerState>>,
    pub score: Arc<Mutex<ScoreState>>,
    pub chart: Arc<Mutex<ChartState>>,
    pub source: Arc<Mutex<SourceState>>,
    pub midi_in: Arc<Mutex<MidiInState>>,
    pub midi_out: Arc<Mutex<Vec<MidiMessage>>>,
    pub catalog: Arc<Mutex<CatalogState>>,
}

pub fn one_entry_catalog(score_id: Option<&str>) -> CatalogDto {
    let mut recordings = BTreeMap::new();
    recordings.insert(
        rec_id(),
        RecordingEntry {
            slug: "test-roll".to_string(),
            title: "Test Roll".to_string(),
            image_url: "https://img.test/roll.tif".to_string(),
            score_id: score_id.map(str::to_string),
        },
    );
    CatalogDto { recordings }
}

pub fn engine_with(
    tracks: Vec<Vec<TrackEvent>>,
    total: Tick,
    settings: PlayerSettings,
    score_id: Option<&str>,
) -> (Engine, Handles) {
    engine_with_analysis(tracks, total, settings, score_id, Vec::new())
}

pub fn engine_with_analysis(
    tracks: Vec<Vec<TrackEvent>>,
    total: Tick,
    settings: PlayerSettings,
    score_id: Option<&str>,
    holes: Vec<HoleDescriptor>,
) -> (Engine, Handles) {
    let (sequencer, seq) = FakeSequencer::new(tracks, total);
    let (sampler, sampler_calls) = FakeSampler::new();
    let (viewer, viewer_state) = FakeViewer::new();
    let (score, score_state) = FakeScore::new();
    let (chart, chart_state) = FakeChart::new();
    let (source, source_state) = FakeSource::new();
    let (midi_in, midi_in_state) = FakeMidiIn::new();
    let (midi_out, midi_out_sent) = FakeMidiOut::new();
    let (catalog, catalog_state) = FakeCatalog::new(one_entry_catalog(score_id), settings);

    let engine = Engine::new(EnginePorts {
        sequencer: Box::new(sequencer),
        sampler: Box::new(sampler),
        viewer: Box::new(viewer),
        score: Box::new(score),
        chart: Box::new(chart),
        analysis: Box::new(FakeAnalysis { holes, fail: false }),
        source: Box::new(source),
        midi_in: Box::new(midi_in),
        midi_out: Some(Box::new(midi_out)),
        catalog: Box::new(catalog),
    })
    .expect("engine construction");

    (
        engine,
        Handles {
            seq,
            sampler: sampler_calls,
            viewer: viewer_state,
            score: score_state,
            chart: chart_state,
            source: source_state,
            midi_in: midi_in_state,
            midi_out: midi_out_sent,
            catalog: catalog_state,
        },
    )
}
