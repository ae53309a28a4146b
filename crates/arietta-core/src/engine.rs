use crate::commands::{Command, EngineEvent, PhaseDto, VolumeChannel};
use crate::expression::{self, ExpressionParams, ModifierState};
use crate::sync::ViewSync;
use crate::transport::{Phase, PlayOutcome, Transport};
use arietta_domain_roll::builder::{build_indexes, BuildConfig, PEDAL_ON_THRESHOLD};
use arietta_domain_roll::model::{HoleIndex, PedalKind, RollIndexes};
use arietta_ports::analysis::AnalysisPort;
use arietta_ports::catalog::{CatalogDto, CatalogError, CatalogPort, PlayerSettings, RecordingEntry};
use arietta_ports::midi::{
    InputEvent, InputEventCallback, MidiError, MidiInputDevice, MidiInputPort, MidiInputStream,
    MidiMessage, MidiOutputPort,
};
use arietta_ports::sampler::SamplerPort;
use arietta_ports::score::{PedalChartPort, ScoreError, ScoreMoment, ScorePort};
use arietta_ports::sequencer::{
    RollEvent, SequencerError, SequencerPort, TrackEvent, SOFT_CONTROLLER, SUSTAIN_CONTROLLER,
};
use arietta_ports::source::{SourceError, SourcePort, SourceVariant};
use arietta_ports::types::{DeviceId, OverlayPolicy, Pixel, RecordingId, TempoSource, Tick};
use arietta_ports::viewer::RollViewerPort;
use parking_lot::Mutex;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Host poll period. Projections and the transport readout are refreshed at
/// this rate; note/pedal events arrive synchronously from the stream decoder
/// in between.
pub const UPDATE_INTERVAL_MS: u64 = 100;

const MIDI_QUEUE_CAPACITY: usize = 256;

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("unknown recording: {0}")]
    UnknownRecording(RecordingId),
    #[error("no score attached to the current recording")]
    NoScoreLoaded,
    #[error(transparent)]
    Sequencer(#[from] SequencerError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Midi(#[from] MidiError),
    #[error(transparent)]
    Score(#[from] ScoreError),
}

/// Collaborator adapters, bundled so construction sites stay readable.
pub struct EnginePorts {
    pub sequencer: Box<dyn SequencerPort>,
    pub sampler: Box<dyn SamplerPort>,
    pub viewer: Box<dyn RollViewerPort>,
    pub score: Box<dyn ScorePort>,
    pub chart: Box<dyn PedalChartPort>,
    pub analysis: Box<dyn AnalysisPort>,
    pub source: Box<dyn SourcePort>,
    pub midi_in: Box<dyn MidiInputPort>,
    pub midi_out: Option<Box<dyn MidiOutputPort>>,
    pub catalog: Box<dyn CatalogPort>,
}

/// Single-threaded application core. The host owns the thread: it forwards
/// decoded stream events into `handle_stream_event`, calls `poll` every
/// `UPDATE_INTERVAL_MS`, and drains `EngineEvent`s for its UI after each call.
pub struct Engine {
    sequencer: Box<dyn SequencerPort>,
    sampler: Box<dyn SamplerPort>,
    viewer: Box<dyn RollViewerPort>,
    score: Box<dyn ScorePort>,
    chart: Box<dyn PedalChartPort>,
    analysis: Box<dyn AnalysisPort>,
    source: Box<dyn SourcePort>,
    midi_in: Box<dyn MidiInputPort>,
    midi_out: Option<Box<dyn MidiOutputPort>>,
    midi_stream: Option<Box<dyn MidiInputStream>>,
    midi_rx: Option<rtrb::Consumer<InputEvent>>,
    catalog: Box<dyn CatalogPort>,
    catalog_dto: CatalogDto,
    settings: PlayerSettings,
    expression: ExpressionParams,
    transport: Transport,
    sync: ViewSync,
    indexes: Option<RollIndexes>,
    current: Option<RecordingId>,
    /// Bumped on every load teardown; async results carrying an older value
    /// are discarded.
    generation: u64,
    /// True while a load or seek is rewiring the stream; poll and stream
    /// events are ignored until the transition completes.
    poll_suspended: bool,
    accent_on: bool,
    secondary_held: bool,
    score_playing: bool,
    score_notes: BTreeSet<u8>,
    last_score_moment: ScoreMoment,
    last_accel_bpm: Option<f64>,
    events: VecDeque<EngineEvent>,
}

impl Engine {
    pub fn new(ports: EnginePorts) -> Result<Self, EngineError> {
        let catalog_dto = ports.catalog.load_catalog()?;
        let settings = match ports.catalog.load_settings() {
            Ok(settings) => settings,
            Err(err) => {
                warn!(%err, "stored settings unreadable, starting from defaults");
                PlayerSettings::default()
            }
        };
        let expression = ExpressionParams::from(&settings);
        let transport = Transport::new(settings.slider_bpm);
        let sync = ViewSync::new(settings.overlay_policy, settings.overlays_enabled);

        Ok(Self {
            sequencer: ports.sequencer,
            sampler: ports.sampler,
            viewer: ports.viewer,
            score: ports.score,
            chart: ports.chart,
            analysis: ports.analysis,
            source: ports.source,
            midi_in: ports.midi_in,
            midi_out: ports.midi_out,
            midi_stream: None,
            midi_rx: None,
            catalog: ports.catalog,
            catalog_dto,
            settings,
            expression,
            transport,
            sync,
            indexes: None,
            current: None,
            generation: 0,
            poll_suspended: false,
            accent_on: false,
            secondary_held: false,
            score_playing: false,
            score_notes: BTreeSet::new(),
            last_score_moment: ScoreMoment::default(),
            last_accel_bpm: None,
            events: VecDeque::new(),
        })
    }

    pub fn handle_command(&mut self, command: Command) -> Result<(), EngineError> {
        match command {
            Command::LoadRecording { id } => self.load_recording(id),
            Command::Play => {
                self.play();
                Ok(())
            }
            Command::Pause => {
                self.pause();
                Ok(())
            }
            Command::Stop => {
                self.stop();
                Ok(())
            }
            Command::Seek { tick } => {
                self.seek(tick);
                Ok(())
            }
            Command::SeekToPixel { pixel } => {
                self.seek_to_pixel(pixel);
                Ok(())
            }
            Command::SeekToProgress { progress } => {
                self.seek_to_progress(progress);
                Ok(())
            }
            Command::SetTempoSlider { bpm } => {
                self.set_tempo_slider(bpm);
                Ok(())
            }
            Command::SetVolume { channel, ratio } => {
                self.set_volume(channel, ratio);
                Ok(())
            }
            Command::TogglePedalLock { pedal } => {
                self.toggle_pedal_lock(pedal);
                Ok(())
            }
            Command::SetTempoSource { source } => {
                self.set_tempo_source(source);
                Ok(())
            }
            Command::SetOverlayPolicy { policy } => {
                self.set_overlay_policy(policy);
                Ok(())
            }
            Command::SetOverlaysEnabled { enabled } => {
                self.set_overlays_enabled(enabled);
                Ok(())
            }
            Command::SetTrackEnabled { track, enabled } => {
                self.sequencer.set_track_enabled(track, enabled);
                Ok(())
            }
            Command::ManualNote { note, on } => {
                self.manual_note(note, on);
                Ok(())
            }
            Command::SetAccent { on } => {
                self.accent_on = on;
                Ok(())
            }
            Command::SetSecondaryModifier { held } => {
                self.secondary_held = held;
                Ok(())
            }
            Command::SelectMidiInput { device_id } => self.open_midi_input(&device_id),
            Command::PlayScore => self.play_score(),
            Command::StopScore => {
                self.stop_score();
                Ok(())
            }
        }
    }

    // ---- loading ----

    /// Full load pipeline: teardown, fetch with fallback, index build, view
    /// reset, optional analysis attach.
    pub fn load_recording(&mut self, id: RecordingId) -> Result<(), EngineError> {
        let entry = self
            .catalog_dto
            .recordings
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownRecording(id.clone()))?;
        let generation = self.begin_load();

        let data = match self.source.fetch(&entry.slug, SourceVariant::Primary) {
            Ok(data) => data,
            Err(primary_err) => {
                warn!(slug = %entry.slug, %primary_err, "primary source failed, trying secondary");
                match self.source.fetch(&entry.slug, SourceVariant::Secondary) {
                    Ok(data) => data,
                    Err(secondary_err) => {
                        warn!(slug = %entry.slug, %secondary_err, "secondary source failed");
                        self.events
                            .push_back(EngineEvent::PlaybackUnavailable { id });
                        return Ok(());
                    }
                }
            }
        };

        self.finish_load(generation, id, &entry, &data)?;
        self.attach_analysis(generation, &entry.slug);
        Ok(())
    }

    /// Teardown half of a load: stop everything, clear every projection, and
    /// return the generation token the completion half must present.
    pub fn begin_load(&mut self) -> u64 {
        self.generation += 1;
        self.poll_suspended = true;
        self.sequencer.stop();
        let plan = self.transport.stop();
        self.apply_release_plan(plan);
        self.sync.clear(self.viewer.as_mut());
        self.sync.reset_cursor(0);
        self.indexes = None;
        self.current = None;
        self.score_playing = false;
        self.score_notes.clear();
        self.last_score_moment = ScoreMoment::default();
        self.last_accel_bpm = None;
        self.generation
    }

    /// Completion half of a load. A stale `generation` means another load
    /// started while this one's fetch was in flight; its result is discarded.
    pub fn finish_load(
        &mut self,
        generation: u64,
        id: RecordingId,
        entry: &RecordingEntry,
        data: &[u8],
    ) -> Result<(), EngineError> {
        if generation != self.generation {
            warn!(%id, generation, current = self.generation, "discarding stale load result");
            return Ok(());
        }

        self.sequencer.load(data)?;
        let total_ticks = self.sequencer.total_ticks();
        let tracks = self.sequencer.tracks();
        let (indexes, report) = build_indexes(&tracks, total_ticks, BuildConfig::default());

        let plan = self.transport.reset(total_ticks, indexes.tempo.base_bpm());
        self.apply_release_plan(plan);
        self.sequencer.set_tempo(self.transport.playback_bpm());

        self.viewer.open(&entry.image_url);
        self.viewer.set_zoom(self.settings.home_zoom);
        self.sync.clear(self.viewer.as_mut());
        self.sync.reset_cursor(0);

        if let Some(score_id) = entry.score_id.as_deref() {
            if let Err(err) = self.score.load(score_id) {
                warn!(score_id, %err, "score load failed, continuing without score");
            }
        }

        let title = indexes
            .metadata
            .title
            .clone()
            .unwrap_or_else(|| entry.title.clone());
        info!(%id, %title, total_ticks, "recording loaded");
        self.events.push_back(EngineEvent::RecordingLoaded {
            id: id.clone(),
            title,
            metadata: indexes.metadata.clone(),
            total_ticks,
            report,
        });

        self.indexes = Some(indexes);
        self.current = Some(id);
        self.poll_suspended = false;
        Ok(())
    }

    /// Analysis reports are best-effort: any failure leaves the synthetic
    /// note-span overlays in place.
    pub fn attach_analysis(&mut self, generation: u64, slug: &str) {
        let data = match self.source.fetch_analysis(slug) {
            Ok(Some(data)) => data,
            Ok(None) => return,
            Err(err) => {
                warn!(slug, %err, "analysis fetch failed");
                return;
            }
        };
        if generation != self.generation {
            warn!(slug, generation, current = self.generation, "discarding stale analysis result");
            return;
        }
        let holes = match self.analysis.decode(&data) {
            Ok(holes) => holes,
            Err(err) => {
                warn!(slug, %err, "analysis decode failed");
                return;
            }
        };
        if let Some(indexes) = self.indexes.as_mut() {
            debug!(slug, holes = holes.len(), "analysis report attached");
            indexes.holes = HoleIndex::build(holes, &indexes.geometry);
        }
    }

    // ---- transport ----

    pub fn play(&mut self) {
        // the score stream owns the sampler until stop_score
        if self.score_playing || self.indexes.is_none() {
            return;
        }
        match self.transport.play() {
            PlayOutcome::AlreadyPlaying => {}
            PlayOutcome::Started { stale_notes } => {
                for note in stale_notes {
                    self.sampler.note_off(note);
                    self.events
                        .push_back(EngineEvent::NoteHighlight { note, on: false });
                }
                self.sequencer.set_tempo(self.transport.playback_bpm());
                self.sequencer.play();
                self.poll_suspended = false;
                self.push_transport_update();
            }
        }
    }

    pub fn pause(&mut self) {
        if self.transport.pause() {
            self.sequencer.pause();
            self.push_transport_update();
        }
    }

    pub fn stop(&mut self) {
        self.poll_suspended = true;
        self.sequencer.stop();
        let plan = self.transport.stop();
        self.apply_release_plan(plan);
        self.sync.clear(self.viewer.as_mut());
        self.sync.reset_cursor(0);
        self.last_accel_bpm = None;
        if let Some(indexes) = self.indexes.as_ref() {
            self.sync
                .update(0, indexes, self.viewer.as_mut(), self.chart.as_mut());
        }
        self.poll_suspended = false;
        self.push_transport_update();
    }

    /// Jump the stream to `target`, reconstructing the instrument state a
    /// sequential play-through would have produced there.
    pub fn seek(&mut self, target: Tick) {
        let Some(indexes) = self.indexes.as_ref() else {
            return;
        };
        let tempo = match self.settings.tempo_source {
            TempoSource::Midi => &indexes.tempo,
            TempoSource::Acceleration => &indexes.acceleration,
        };
        let plan = self.transport.seek(target, tempo, &indexes.pedals);

        self.poll_suspended = true;
        self.sequencer.pause();

        for note in plan.notes_to_release {
            self.sampler.note_off(note);
            self.echo(MidiMessage::NoteOff { note });
            self.events
                .push_back(EngineEvent::NoteHighlight { note, on: false });
        }
        if plan.sustain_on {
            let level = self.transport.sustain_level();
            self.sampler.pedal_down(Some(level));
            self.echo(MidiMessage::Control {
                controller: SUSTAIN_CONTROLLER,
                value: level,
            });
        } else {
            self.sampler.pedal_up();
            self.echo(MidiMessage::Control {
                controller: SUSTAIN_CONTROLLER,
                value: 0,
            });
        }
        self.events.push_back(EngineEvent::PedalChanged {
            pedal: PedalKind::Sustain,
            on: plan.sustain_on,
        });
        self.events.push_back(EngineEvent::PedalChanged {
            pedal: PedalKind::Soft,
            on: plan.soft_on,
        });

        self.sequencer.skip_to_tick(plan.tick);
        self.sequencer.set_tempo(plan.playback_bpm);
        if plan.resume {
            self.sequencer.play();
        }

        self.sync.reset_cursor(plan.tick);
        if let Some(indexes) = self.indexes.as_ref() {
            self.sync
                .update(plan.tick, indexes, self.viewer.as_mut(), self.chart.as_mut());
        }
        self.poll_suspended = false;
        self.push_transport_update();
    }

    pub fn seek_to_pixel(&mut self, pixel: Pixel) {
        let Some(tick) = self
            .indexes
            .as_ref()
            .map(|indexes| indexes.geometry.pixel_to_tick(pixel))
        else {
            return;
        };
        self.seek(tick);
    }

    pub fn seek_to_progress(&mut self, progress: f64) {
        let total = self.transport.total_ticks();
        if total <= 0 {
            return;
        }
        let tick = (progress.clamp(0.0, 1.0) * total as f64).round() as Tick;
        self.seek(tick);
    }

    pub fn set_tempo_slider(&mut self, bpm: f64) {
        let playback_bpm = self.transport.set_slider_bpm(bpm);
        self.apply_tempo_to_sequencer(playback_bpm);
        self.settings.slider_bpm = bpm;
        self.persist_settings();
        self.push_transport_update();
    }

    pub fn set_tempo_source(&mut self, source: TempoSource) {
        self.settings.tempo_source = source;
        self.persist_settings();
        let tick = self.transport.tick();
        let Some(bpm) = self.indexes.as_ref().map(|indexes| match source {
            TempoSource::Midi => indexes.tempo.bpm_at(tick),
            TempoSource::Acceleration => indexes.acceleration.bpm_at(tick),
        }) else {
            return;
        };
        let playback_bpm = self.transport.apply_stream_tempo(bpm);
        self.apply_tempo_to_sequencer(playback_bpm);
        self.last_accel_bpm = match source {
            TempoSource::Acceleration => Some(bpm),
            TempoSource::Midi => None,
        };
        self.push_transport_update();
    }

    // ---- stream events ----

    /// Due events fired by the stream decoder while playing. Ignored during
    /// load/seek transitions: the seek path reconstructs state itself.
    pub fn handle_stream_event(&mut self, event: TrackEvent) {
        if self.poll_suspended {
            return;
        }
        self.transport.set_tick(event.tick);
        match event.event {
            RollEvent::NoteOn { note, velocity } => {
                if velocity > 0 {
                    self.trigger_note_on(note, velocity as f64);
                } else {
                    self.trigger_note_off(note);
                }
            }
            RollEvent::ControlChange { controller, value } => {
                self.handle_control(controller, value);
            }
            RollEvent::TempoChange { bpm } => {
                if self.settings.tempo_source == TempoSource::Midi {
                    let playback_bpm = self.transport.apply_stream_tempo(bpm);
                    self.apply_tempo_to_sequencer(playback_bpm);
                }
            }
            RollEvent::Text { .. } => {}
        }
    }

    fn handle_control(&mut self, controller: u8, value: u8) {
        let down = value >= PEDAL_ON_THRESHOLD;
        match controller {
            SUSTAIN_CONTROLLER => {
                if down {
                    self.press_sustain(Some(value));
                } else {
                    self.release_sustain();
                }
            }
            SOFT_CONTROLLER => {
                if down {
                    self.press_soft();
                } else {
                    self.release_soft();
                }
            }
            _ => {}
        }
    }

    fn trigger_note_on(&mut self, note: u8, raw_velocity: f64) {
        let modifiers = self.modifiers();
        let gain = expression::gain(&self.expression, note, raw_velocity, &modifiers);
        self.transport.note_started(note);
        if gain.is_audible() {
            self.sampler.note_on(note, gain);
        }
        self.echo(MidiMessage::NoteOn {
            note,
            velocity: raw_velocity.clamp(0.0, 127.0) as u8,
        });
        self.events
            .push_back(EngineEvent::NoteHighlight { note, on: true });
    }

    fn trigger_note_off(&mut self, note: u8) {
        self.transport.note_stopped(note);
        self.sampler.note_off(note);
        self.echo(MidiMessage::NoteOff { note });
        self.events
            .push_back(EngineEvent::NoteHighlight { note, on: false });
    }

    // ---- pedals ----

    fn press_sustain(&mut self, level: Option<u8>) {
        if self.transport.sustain_on() {
            return; // repeated on events just mean the pedal is still down
        }
        let level_value = level.unwrap_or(self.settings.sustain_level);
        self.transport.set_sustain(true, level_value);
        self.sampler.pedal_down(level);
        self.echo(MidiMessage::Control {
            controller: SUSTAIN_CONTROLLER,
            value: level_value,
        });
        self.events.push_back(EngineEvent::PedalChanged {
            pedal: PedalKind::Sustain,
            on: true,
        });
    }

    fn release_sustain(&mut self) {
        if self.transport.sustain_locked() || !self.transport.sustain_on() {
            return;
        }
        let level = self.transport.sustain_level();
        self.transport.set_sustain(false, level);
        self.sampler.pedal_up();
        self.echo(MidiMessage::Control {
            controller: SUSTAIN_CONTROLLER,
            value: 0,
        });
        self.events.push_back(EngineEvent::PedalChanged {
            pedal: PedalKind::Sustain,
            on: false,
        });
    }

    fn press_soft(&mut self) {
        if self.transport.soft_on() {
            return;
        }
        // soft is an expression modifier, not a sampler call: it scales the
        // gain of notes struck while it is down
        self.transport.set_soft(true);
        self.echo(MidiMessage::Control {
            controller: SOFT_CONTROLLER,
            value: 127,
        });
        self.events.push_back(EngineEvent::PedalChanged {
            pedal: PedalKind::Soft,
            on: true,
        });
    }

    fn release_soft(&mut self) {
        if self.transport.soft_locked() || !self.transport.soft_on() {
            return;
        }
        self.transport.set_soft(false);
        self.echo(MidiMessage::Control {
            controller: SOFT_CONTROLLER,
            value: 0,
        });
        self.events.push_back(EngineEvent::PedalChanged {
            pedal: PedalKind::Soft,
            on: false,
        });
    }

    /// Locking forces the pedal down past any stream release; unlocking
    /// reverts to whatever the pedal map says at the current tick.
    pub fn toggle_pedal_lock(&mut self, pedal: PedalKind) {
        match pedal {
            PedalKind::Sustain => {
                let locked = self.transport.toggle_sustain_lock();
                self.events
                    .push_back(EngineEvent::PedalLockChanged { pedal, locked });
                if locked {
                    self.press_sustain(None);
                } else {
                    let mapped = self.mapped_pedal_state().sustain;
                    if !(self.transport.phase() == Phase::Playing && mapped) {
                        self.release_sustain();
                    }
                }
            }
            PedalKind::Soft => {
                let locked = self.transport.toggle_soft_lock();
                self.events
                    .push_back(EngineEvent::PedalLockChanged { pedal, locked });
                if locked {
                    self.press_soft();
                } else {
                    let mapped = self.mapped_pedal_state().soft;
                    if !(self.transport.phase() == Phase::Playing && mapped) {
                        self.release_soft();
                    }
                }
            }
        }
    }

    fn mapped_pedal_state(&self) -> arietta_domain_roll::model::PedalState {
        self.indexes
            .as_ref()
            .map(|indexes| indexes.pedals.active_at(self.transport.tick()))
            .unwrap_or_default()
    }

    // ---- manual input ----

    /// Keyboard click on the on-screen piano; carries no velocity of its own.
    pub fn manual_note(&mut self, note: u8, on: bool) {
        if on {
            let velocity = self.expression.default_velocity;
            self.trigger_note_on(note, velocity);
        } else {
            self.trigger_note_off(note);
        }
    }

    pub fn list_midi_inputs(&self) -> Result<Vec<MidiInputDevice>, EngineError> {
        Ok(self.midi_in.list_inputs()?)
    }

    /// Opens a controller input stream. Events land on a lock-free queue from
    /// the driver callback thread and are drained on the next poll.
    pub fn open_midi_input(&mut self, device_id: &DeviceId) -> Result<(), EngineError> {
        let (producer, consumer) = rtrb::RingBuffer::<InputEvent>::new(MIDI_QUEUE_CAPACITY);
        let producer = Arc::new(Mutex::new(producer));
        let callback: InputEventCallback = Arc::new(move |event| {
            // queue full means the poll loop stalled; dropping is the only option
            let _ = producer.lock().push(event);
        });
        let stream = self.midi_in.open_input(device_id, callback)?;
        if let Some(old) = self.midi_stream.take() {
            old.close();
        }
        info!(%device_id, "midi input opened");
        self.midi_stream = Some(stream);
        self.midi_rx = Some(consumer);
        Ok(())
    }

    fn drain_midi_input(&mut self) {
        let mut pending = Vec::new();
        if let Some(rx) = self.midi_rx.as_mut() {
            while let Ok(event) = rx.pop() {
                pending.push(event);
            }
        }
        for event in pending {
            self.handle_midi_message(event.message);
        }
    }

    fn handle_midi_message(&mut self, message: MidiMessage) {
        match message {
            MidiMessage::NoteOn { note, velocity } => {
                if velocity > 0 {
                    self.trigger_note_on(note, velocity as f64);
                } else {
                    self.trigger_note_off(note);
                }
            }
            MidiMessage::NoteOff { note } => self.trigger_note_off(note),
            MidiMessage::Control { controller, value } => self.handle_control(controller, value),
        }
    }

    // ---- settings ----

    pub fn set_volume(&mut self, channel: VolumeChannel, ratio: f64) {
        let ratio = ratio.max(0.0);
        match channel {
            VolumeChannel::Master => self.settings.volume_ratio = ratio,
            VolumeChannel::Left => self.settings.left_volume_ratio = ratio,
            VolumeChannel::Right => self.settings.right_volume_ratio = ratio,
        }
        self.expression = ExpressionParams::from(&self.settings);
        self.persist_settings();
    }

    pub fn set_overlay_policy(&mut self, policy: OverlayPolicy) {
        self.settings.overlay_policy = policy;
        self.persist_settings();
        self.sync.set_policy(policy, self.viewer.as_mut());
    }

    pub fn set_overlays_enabled(&mut self, enabled: bool) {
        self.settings.overlays_enabled = enabled;
        self.persist_settings();
        self.sync.set_overlays_enabled(enabled, self.viewer.as_mut());
    }

    fn persist_settings(&self) {
        if let Err(err) = self.catalog.save_settings(&self.settings) {
            warn!(%err, "failed to persist settings");
        }
    }

    // ---- score ----

    pub fn render_score_page(&mut self, page: u32) -> Result<String, EngineError> {
        if !self.score.is_loaded() {
            return Err(EngineError::NoScoreLoaded);
        }
        Ok(self.score.render_page(page)?)
    }

    /// Score playback replaces roll playback; the two streams share the
    /// sampler and cannot run together.
    pub fn play_score(&mut self) -> Result<(), EngineError> {
        if !self.score.is_loaded() {
            return Err(EngineError::NoScoreLoaded);
        }
        self.stop();
        self.score_playing = true;
        self.last_score_moment = ScoreMoment::default();
        self.events
            .push_back(EngineEvent::ScorePlayStateChanged { playing: true });
        Ok(())
    }

    pub fn stop_score(&mut self) {
        if !self.score_playing {
            return;
        }
        self.score_playing = false;
        let notes: Vec<u8> = self.score_notes.iter().copied().collect();
        self.score_notes.clear();
        for note in notes {
            self.sampler.note_off(note);
            self.events
                .push_back(EngineEvent::NoteHighlight { note, on: false });
        }
        self.sampler.pedal_up();
        self.events
            .push_back(EngineEvent::ScorePlayStateChanged { playing: false });
    }

    /// Due events from the score's own stream, in the score's time base.
    pub fn handle_score_event(&mut self, event: TrackEvent) {
        if !self.score_playing {
            return;
        }
        match event.event {
            RollEvent::NoteOn { note, velocity } => {
                if velocity > 0 {
                    let modifiers = self.modifiers();
                    let gain =
                        expression::gain(&self.expression, note, velocity as f64, &modifiers);
                    if gain.is_audible() {
                        self.sampler.note_on(note, gain);
                    }
                    self.score_notes.insert(note);
                    self.events
                        .push_back(EngineEvent::NoteHighlight { note, on: true });
                } else {
                    self.score_notes.remove(&note);
                    self.sampler.note_off(note);
                    self.events
                        .push_back(EngineEvent::NoteHighlight { note, on: false });
                }
            }
            RollEvent::ControlChange { controller, value } => {
                if controller == SUSTAIN_CONTROLLER {
                    if value >= PEDAL_ON_THRESHOLD {
                        self.sampler.pedal_down(Some(value));
                    } else {
                        self.sampler.pedal_up();
                    }
                }
            }
            RollEvent::TempoChange { .. } | RollEvent::Text { .. } => {}
        }

        let total = self.score.stream_total_ticks();
        if let Some(moment) = self
            .sync
            .score_cursor(self.score.as_ref(), event.tick, total)
        {
            self.emit_score_moment(moment);
        }
    }

    fn emit_score_moment(&mut self, moment: ScoreMoment) {
        if moment.page != self.last_score_moment.page {
            self.events
                .push_back(EngineEvent::ScorePageChanged { page: moment.page });
        }
        if moment.note_ids != self.last_score_moment.note_ids {
            self.events.push_back(EngineEvent::ScoreHighlights {
                note_ids: moment.note_ids.clone(),
            });
        }
        self.last_score_moment = moment;
    }

    // ---- poll ----

    /// Fixed-period host tick: drains controller input, samples the stream
    /// clock, applies the acceleration curve, and refreshes every projection.
    pub fn poll(&mut self) {
        self.drain_midi_input();
        if self.poll_suspended || self.indexes.is_none() {
            return;
        }
        if self.transport.phase() != Phase::Playing {
            return;
        }

        let tick = self.sequencer.current_tick();
        self.transport.set_tick(tick);
        let tick = self.transport.tick();

        let total = self.transport.total_ticks();
        if total > 0 && tick >= total {
            self.handle_end_of_stream();
            return;
        }

        if self.settings.tempo_source == TempoSource::Acceleration {
            if let Some(bpm) = self
                .indexes
                .as_ref()
                .map(|indexes| indexes.acceleration.bpm_at(tick))
            {
                if self.last_accel_bpm != Some(bpm) {
                    let playback_bpm = self.transport.apply_stream_tempo(bpm);
                    self.apply_tempo_to_sequencer(playback_bpm);
                    self.last_accel_bpm = Some(bpm);
                }
            }
        }

        if let Some(indexes) = self.indexes.as_ref() {
            self.sync
                .update(tick, indexes, self.viewer.as_mut(), self.chart.as_mut());
        }
        self.push_transport_update();
    }

    fn handle_end_of_stream(&mut self) {
        debug!(tick = self.transport.tick(), "end of stream");
        self.stop();
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.events.drain(..).collect()
    }

    // ---- accessors ----

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &CatalogDto {
        &self.catalog_dto
    }

    pub fn indexes(&self) -> Option<&RollIndexes> {
        self.indexes.as_ref()
    }

    pub fn current_recording(&self) -> Option<&RecordingId> {
        self.current.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn view_sync(&self) -> &ViewSync {
        &self.sync
    }

    pub fn is_score_playing(&self) -> bool {
        self.score_playing
    }

    /// Record the horizontal center the user chose by panning the image.
    pub fn user_panned(&mut self, x: f64) {
        self.sync.set_horizontal_framing(x);
    }

    // ---- internals ----

    fn modifiers(&self) -> ModifierState {
        ModifierState {
            soft_on: self.transport.soft_on(),
            accent_on: self.accent_on,
            secondary_held: self.secondary_held,
        }
    }

    /// The underlying decoder re-times its event queue from the current tick
    /// when paused, so a tempo change while running must bracket the call.
    fn apply_tempo_to_sequencer(&mut self, bpm: f64) {
        if self.sequencer.is_playing() {
            self.sequencer.pause();
            self.sequencer.set_tempo(bpm);
            self.sequencer.play();
        } else {
            self.sequencer.set_tempo(bpm);
        }
    }

    fn apply_release_plan(&mut self, plan: crate::transport::ReleasePlan) {
        for note in plan.notes_to_release {
            self.sampler.note_off(note);
            self.echo(MidiMessage::NoteOff { note });
            self.events
                .push_back(EngineEvent::NoteHighlight { note, on: false });
        }
        if plan.release_sustain {
            self.sampler.pedal_up();
            self.echo(MidiMessage::Control {
                controller: SUSTAIN_CONTROLLER,
                value: 0,
            });
            self.events.push_back(EngineEvent::PedalChanged {
                pedal: PedalKind::Sustain,
                on: false,
            });
        }
        if plan.release_soft {
            self.echo(MidiMessage::Control {
                controller: SOFT_CONTROLLER,
                value: 0,
            });
            self.events.push_back(EngineEvent::PedalChanged {
                pedal: PedalKind::Soft,
                on: false,
            });
        }
    }

    fn echo(&mut self, message: MidiMessage) {
        if let Some(out) = self.midi_out.as_mut() {
            if let Err(err) = out.send(message) {
                warn!(%err, "midi echo failed");
            }
        }
    }

    fn push_transport_update(&mut self) {
        self.events.push_back(EngineEvent::TransportUpdated {
            tick: self.transport.tick(),
            progress: self.transport.progress(),
            phase: self.transport.phase().into(),
            playback_bpm: self.transport.playback_bpm(),
        });
    }
}

impl From<Phase> for PhaseDto {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Stopped => PhaseDto::Stopped,
            Phase::Playing => PhaseDto::Playing,
            Phase::Paused => PhaseDto::Paused,
        }
    }
}
