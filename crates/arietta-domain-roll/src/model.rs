use crate::geometry::RollGeometry;
use crate::interval::IntervalIndex;
use arietta_ports::analysis::HoleDescriptor;
use arietta_ports::types::Tick;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PedalKind {
    Sustain,
    Soft,
}

/// `[start, end] → bpm`, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TempoSegment {
    pub start: Tick,
    pub end: Tick,
    pub bpm: f64,
}

/// Total function over `[0, total_ticks]`: every tick belongs to exactly one
/// segment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TempoMap {
    segments: Vec<TempoSegment>,
    base_bpm: f64,
    total_ticks: Tick,
}

impl TempoMap {
    /// `changes` are `(tick, bpm)` pairs in any order. Each open segment is
    /// closed at the next change's tick minus one; the last extends to
    /// `total_ticks`. With no changes at all, one segment at `default_bpm`
    /// covers the whole range.
    pub fn from_changes(mut changes: Vec<(Tick, f64)>, total_ticks: Tick, default_bpm: f64) -> Self {
        changes.sort_by_key(|(tick, _)| *tick);
        changes.dedup_by_key(|(tick, _)| *tick);

        if changes.is_empty() {
            changes.push((0, default_bpm));
        }
        if changes[0].0 != 0 {
            let bpm = changes[0].1;
            changes.insert(0, (0, bpm));
        }

        let base_bpm = changes[0].1;
        let mut segments = Vec::with_capacity(changes.len());
        for (idx, (start, bpm)) in changes.iter().enumerate() {
            let end = match changes.get(idx + 1) {
                Some((next_start, _)) => next_start - 1,
                None => total_ticks,
            };
            if end < *start {
                continue;
            }
            segments.push(TempoSegment {
                start: *start,
                end,
                bpm: *bpm,
            });
        }

        Self {
            segments,
            base_bpm,
            total_ticks,
        }
    }

    pub fn constant(bpm: f64, total_ticks: Tick) -> Self {
        Self::from_changes(vec![(0, bpm)], total_ticks, bpm)
    }

    pub fn from_segments(mut segments: Vec<TempoSegment>, total_ticks: Tick) -> Self {
        if segments.is_empty() {
            segments.push(TempoSegment {
                start: 0,
                end: total_ticks,
                bpm: 60.0,
            });
        }
        let base_bpm = segments[0].bpm;
        Self {
            segments,
            base_bpm,
            total_ticks,
        }
    }

    pub fn base_bpm(&self) -> f64 {
        self.base_bpm
    }

    pub fn total_ticks(&self) -> Tick {
        self.total_ticks
    }

    pub fn segments(&self) -> &[TempoSegment] {
        &self.segments
    }

    pub fn segment_at(&self, tick: Tick) -> TempoSegment {
        let tick = tick.clamp(0, self.total_ticks);
        let idx = self
            .segments
            .partition_point(|segment| segment.start <= tick)
            .saturating_sub(1);
        self.segments[idx]
    }

    pub fn bpm_at(&self, tick: Tick) -> f64 {
        self.segment_at(tick).bpm
    }
}

/// Sustain and soft spans of every track, merged into one interval index.
#[derive(Clone, Debug, Default)]
pub struct PedalMap {
    index: IntervalIndex<PedalKind>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PedalState {
    pub sustain: bool,
    pub soft: bool,
}

impl PedalMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, start: Tick, end: Tick, kind: PedalKind) {
        self.index.insert(start, end, kind);
    }

    pub fn freeze(&mut self) {
        self.index.freeze();
    }

    /// Zero, one, or both pedals may be down at a tick.
    pub fn active_at(&self, tick: Tick) -> PedalState {
        let mut state = PedalState::default();
        for kind in self.index.query(tick) {
            match kind {
                PedalKind::Sustain => state.sustain = true,
                PedalKind::Soft => state.soft = true,
            }
        }
        state
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// One note's onset/off pairing. `matched` is false for a best-effort span
/// recovered from an incomplete pair at end of stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSpan {
    pub note: u8,
    pub on: Tick,
    pub off: Tick,
    pub matched: bool,
}

impl NoteSpan {
    pub fn duration(&self) -> Tick {
        self.off - self.on
    }
}

/// Note spans stored under their onset tick; chords share a tick.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NoteDurations {
    by_onset: BTreeMap<Tick, Vec<NoteSpan>>,
}

impl NoteDurations {
    pub fn insert(&mut self, span: NoteSpan) {
        self.by_onset.entry(span.on).or_default().push(span);
    }

    pub fn at_onset(&self, tick: Tick) -> &[NoteSpan] {
        self.by_onset.get(&tick).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn onsets_in(&self, start: Tick, end: Tick) -> impl Iterator<Item = &NoteSpan> {
        self.by_onset
            .range(start..=end.max(start))
            .flat_map(|(_, spans)| spans.iter())
    }

    pub fn len(&self) -> usize {
        self.by_onset.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_onset.is_empty()
    }
}

/// Analysis-report holes indexed by onset tick, with an interval index over
/// their attack..off tick range for windowed overlay queries.
#[derive(Clone, Debug, Default)]
pub struct HoleIndex {
    holes: Vec<HoleDescriptor>,
    by_onset: BTreeMap<Tick, Vec<usize>>,
    window: IntervalIndex<usize>,
}

impl HoleIndex {
    pub fn build(holes: Vec<HoleDescriptor>, geometry: &RollGeometry) -> Self {
        let mut by_onset: BTreeMap<Tick, Vec<usize>> = BTreeMap::new();
        let mut window = IntervalIndex::new();
        for (idx, hole) in holes.iter().enumerate() {
            let on = geometry.pixel_to_tick(hole.attack_px);
            let off = geometry.pixel_to_tick(hole.off_px);
            let (on, off) = (on.min(off), on.max(off));
            by_onset.entry(on).or_default().push(idx);
            window.insert(on, off, idx);
        }
        window.freeze();
        Self {
            holes,
            by_onset,
            window,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.holes.is_empty()
    }

    pub fn at_onset(&self, tick: Tick) -> impl Iterator<Item = &HoleDescriptor> {
        self.by_onset
            .get(&tick)
            .into_iter()
            .flat_map(|indexes| indexes.iter().map(|&idx| &self.holes[idx]))
    }

    pub fn onsets_in(&self, start: Tick, end: Tick) -> impl Iterator<Item = &HoleDescriptor> {
        self.by_onset
            .range(start..=end.max(start))
            .flat_map(|(_, indexes)| indexes.iter().map(|&idx| &self.holes[idx]))
    }

    pub fn intersecting(&self, start: Tick, end: Tick) -> Vec<&HoleDescriptor> {
        self.window
            .query_range(start, end)
            .into_iter()
            .map(|&idx| &self.holes[idx])
            .collect()
    }
}

/// Descriptive metadata parsed from the roll's text events.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RollMetadata {
    pub title: Option<String>,
    pub performer: Option<String>,
    pub composer: Option<String>,
    pub label: Option<String>,
    pub purl: Option<String>,
    pub roll_type: Option<String>,
    pub raw: BTreeMap<String, String>,
}

/// Every per-recording temporal structure, rebuilt from scratch on each load.
#[derive(Clone, Debug)]
pub struct RollIndexes {
    pub total_ticks: Tick,
    pub tempo: TempoMap,
    pub acceleration: TempoMap,
    pub pedals: PedalMap,
    pub notes: NoteDurations,
    pub holes: HoleIndex,
    pub geometry: RollGeometry,
    pub metadata: RollMetadata,
}
