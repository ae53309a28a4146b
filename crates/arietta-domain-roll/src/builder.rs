use crate::acceleration::acceleration_map;
use crate::geometry::RollGeometry;
use crate::model::{
    HoleIndex, NoteDurations, NoteSpan, PedalKind, PedalMap, RollIndexes, RollMetadata, TempoMap,
};
use arietta_ports::sequencer::{RollEvent, TrackEvent, SOFT_CONTROLLER, SUSTAIN_CONTROLLER};
use arietta_ports::types::Tick;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Pedal values are continuous 0..=127; binary sources supply 0 or 127.
pub const PEDAL_ON_THRESHOLD: u8 = 64;

#[derive(Clone, Copy, Debug)]
pub struct BuildConfig {
    /// Applied when the stream carries no tempo event at all.
    pub default_bpm: f64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { default_bpm: 60.0 }
    }
}

/// Summary of data-quality conditions tolerated during a build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BuildReport {
    pub dropped_metadata_lines: usize,
    pub unmatched_note_ons: usize,
    pub orphan_note_offs: usize,
    pub tempo_defaulted: bool,
}

struct TrackPedalState {
    sustain_open: bool,
    soft_open: bool,
    sustain_start: Tick,
    soft_start: Tick,
}

/// Single forward pass over the decoded event stream, producing every
/// per-recording index. Tracks are processed independently; ordering is only
/// promised within a track.
pub fn build_indexes(
    tracks: &[Vec<TrackEvent>],
    total_ticks: Tick,
    cfg: BuildConfig,
) -> (RollIndexes, BuildReport) {
    let mut report = BuildReport::default();
    let mut pedals = PedalMap::new();
    let mut notes = NoteDurations::default();
    let mut tempo_changes: Vec<(Tick, f64)> = Vec::new();
    let mut metadata_raw: BTreeMap<String, String> = BTreeMap::new();

    // open-note side table: earliest unmatched onset per note number
    let mut open_notes: BTreeMap<u8, Vec<Tick>> = BTreeMap::new();

    for track in tracks {
        let mut pedal = TrackPedalState {
            sustain_open: false,
            soft_open: false,
            sustain_start: 0,
            soft_start: 0,
        };

        for event in track {
            match &event.event {
                RollEvent::NoteOn { note, velocity } => {
                    if *velocity > 0 {
                        open_notes.entry(*note).or_default().push(event.tick);
                    } else {
                        close_note(&mut open_notes, &mut notes, *note, event.tick, &mut report);
                    }
                }
                RollEvent::ControlChange { controller, value } => {
                    handle_pedal_event(
                        &mut pedals,
                        &mut pedal,
                        *controller,
                        *value,
                        event.tick,
                    );
                }
                RollEvent::TempoChange { bpm } => {
                    tempo_changes.push((event.tick, *bpm));
                }
                RollEvent::Text { text } => {
                    if !parse_metadata_line(text, &mut metadata_raw) {
                        report.dropped_metadata_lines += 1;
                    }
                }
            }
        }

        // a pedal still open at end of track holds to the end of the roll
        if pedal.sustain_open {
            pedals.insert(pedal.sustain_start, total_ticks, PedalKind::Sustain);
        }
        if pedal.soft_open {
            pedals.insert(pedal.soft_start, total_ticks, PedalKind::Soft);
        }
    }

    // incomplete pairs at end of stream: tolerated, best-effort duration
    for (note, onsets) in open_notes {
        for on in onsets {
            report.unmatched_note_ons += 1;
            notes.insert(NoteSpan {
                note,
                on,
                off: total_ticks,
                matched: false,
            });
        }
    }
    if report.unmatched_note_ons > 0 {
        debug!(
            unmatched = report.unmatched_note_ons,
            "note onsets left open at end of stream"
        );
    }

    if tempo_changes.is_empty() {
        debug!(default_bpm = cfg.default_bpm, "no tempo events in stream, using default");
        report.tempo_defaulted = true;
    }
    let tempo = TempoMap::from_changes(tempo_changes, total_ticks, cfg.default_bpm);

    pedals.freeze();

    let metadata = interpret_metadata(&metadata_raw);
    let geometry = geometry_from_metadata(&metadata_raw, &metadata);
    let acceleration = acceleration_map(&geometry, tempo.base_bpm(), total_ticks);

    let indexes = RollIndexes {
        total_ticks,
        tempo,
        acceleration,
        pedals,
        notes,
        holes: HoleIndex::default(),
        geometry,
        metadata,
    };
    (indexes, report)
}

fn close_note(
    open_notes: &mut BTreeMap<u8, Vec<Tick>>,
    notes: &mut NoteDurations,
    note: u8,
    off: Tick,
    report: &mut BuildReport,
) {
    match open_notes.get_mut(&note).and_then(|onsets| {
        if onsets.is_empty() {
            None
        } else {
            Some(onsets.remove(0))
        }
    }) {
        Some(on) => notes.insert(NoteSpan {
            note,
            on,
            off: off.max(on),
            matched: true,
        }),
        None => {
            // an off with no open on; tolerated
            report.orphan_note_offs += 1;
        }
    }
}

fn handle_pedal_event(
    pedals: &mut PedalMap,
    state: &mut TrackPedalState,
    controller: u8,
    value: u8,
    tick: Tick,
) {
    let down = value >= PEDAL_ON_THRESHOLD;
    match controller {
        SUSTAIN_CONTROLLER => {
            if down && !state.sustain_open {
                state.sustain_open = true;
                state.sustain_start = tick;
            } else if !down && state.sustain_open {
                state.sustain_open = false;
                pedals.insert(state.sustain_start, tick, PedalKind::Sustain);
            }
            // consecutive "on" events just mean the pedal is still down
        }
        SOFT_CONTROLLER => {
            if down && !state.soft_open {
                state.soft_open = true;
                state.soft_start = tick;
            } else if !down && state.soft_open {
                state.soft_open = false;
                pedals.insert(state.soft_start, tick, PedalKind::Soft);
            }
        }
        _ => {}
    }
}

/// Parses one `@KEY: value` metadata line. Returns false when the line is
/// malformed and should be counted as dropped.
fn parse_metadata_line(text: &str, out: &mut BTreeMap<String, String>) -> bool {
    let decoded = decode_char_refs(text);
    let trimmed = decoded.trim();
    if trimmed.is_empty() {
        return true;
    }
    let Some(rest) = trimmed.strip_prefix('@') else {
        warn!(line = %trimmed, "dropping metadata line without @ prefix");
        return false;
    };
    let Some((key, value)) = rest.split_once(':') else {
        warn!(line = %trimmed, "dropping metadata line without separator");
        return false;
    };
    let key = key.trim();
    if key.is_empty() {
        warn!(line = %trimmed, "dropping metadata line with empty key");
        return false;
    }
    out.insert(key.to_string(), value.trim().to_string());
    true
}

/// Expands decimal (`&#9839;`) and hex (`&#x266F;`) character references.
/// Anything unparseable is kept verbatim.
pub fn decode_char_refs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("&#") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let Some(end) = tail.find(';') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let body = &tail[..end];
        let code = if let Some(hex) = body.strip_prefix('x').or_else(|| body.strip_prefix('X')) {
            u32::from_str_radix(hex, 16).ok()
        } else {
            body.parse::<u32>().ok()
        };
        match code.and_then(char::from_u32) {
            Some(c) => out.push(c),
            None => {
                out.push_str(&rest[start..start + 2 + end + 1]);
            }
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    out
}

fn interpret_metadata(raw: &BTreeMap<String, String>) -> RollMetadata {
    let get = |key: &str| raw.get(key).cloned();
    RollMetadata {
        title: get("TITLE"),
        performer: get("PERFORMER"),
        composer: get("COMPOSER"),
        label: get("LABEL"),
        purl: get("PURL"),
        roll_type: get("ROLL_TYPE"),
        raw: raw.clone(),
    }
}

fn geometry_from_metadata(raw: &BTreeMap<String, String>, meta: &RollMetadata) -> RollGeometry {
    let int = |key: &str| -> Option<i64> {
        raw.get(key).and_then(|value| value.trim().parse().ok())
    };
    let float = |key: &str| -> Option<f64> {
        raw.get(key).and_then(|value| value.trim().parse().ok())
    };

    let defaults = RollGeometry::default();
    // welte-red rolls image top-to-bottom; everything else scrolls up
    let scroll_up = meta.roll_type.as_deref() != Some("welte-red");

    let image_length_px = int("IMAGE_LENGTH").unwrap_or(0);
    let mut first_hole_px = int("FIRST_HOLE").unwrap_or(0);
    if scroll_up {
        // direction-sensitive fields are corrected here, not at render time
        first_hole_px = image_length_px - first_hole_px;
    }

    RollGeometry {
        first_hole_px,
        last_hole_px: int("LAST_HOLE").unwrap_or(0),
        avg_hole_width_px: int("AVG_HOLE_WIDTH").unwrap_or(0),
        hole_separation_px: int("HOLE_SEPARATION").unwrap_or(0),
        roll_width_px: int("ROLL_WIDTH").unwrap_or(0),
        image_width_px: int("IMAGE_WIDTH").unwrap_or_else(|| int("ROLL_WIDTH").unwrap_or(0)),
        image_length_px,
        scroll_up,
        pixels_per_inch: float("PIXELS_PER_INCH").unwrap_or(defaults.pixels_per_inch),
        accel_quantum_inches: float("ACCEL_QUANTUM_INCHES")
            .unwrap_or(defaults.accel_quantum_inches),
        accel_rate_per_quantum: float("ACCEL_RATE").unwrap_or(defaults.accel_rate_per_quantum),
    }
}
