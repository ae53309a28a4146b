use crate::geometry::RollGeometry;
use crate::model::{TempoMap, TempoSegment};
use arietta_ports::types::Tick;

/// Synthetic tempo curve for rolls whose encoded tempo data is absent or
/// untrusted. A take-up spool winds faster as paper accumulates, so the roll
/// accelerates physically as it unwinds: the curve walks forward from tick 0
/// in variable-size quanta, growing both the quantum and the tempo by a fixed
/// rate per step.
pub fn acceleration_map(geometry: &RollGeometry, base_bpm: f64, total_ticks: Tick) -> TempoMap {
    let quantum_px = geometry.accel_quantum_inches * geometry.pixels_per_inch;
    if total_ticks <= 0 || quantum_px <= 0.0 || base_bpm <= 0.0 {
        return TempoMap::constant(base_bpm.max(1.0), total_ticks.max(0));
    }

    let mut segments = Vec::new();
    let mut factor = 1.0f64;
    let mut start: Tick = 0;

    while start <= total_ticks {
        let len = (quantum_px * factor).round() as Tick;
        let len = len.max(1);
        // the final quantum is clamped to end exactly at total_ticks
        let end = (start + len - 1).min(total_ticks);
        segments.push(TempoSegment {
            start,
            end,
            bpm: base_bpm * factor,
        });
        start = end + 1;
        factor += geometry.accel_rate_per_quantum;
    }

    TempoMap::from_segments(segments, total_ticks)
}
