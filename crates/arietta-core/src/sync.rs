use arietta_domain_roll::geometry::RollGeometry;
use arietta_domain_roll::model::RollIndexes;
use arietta_ports::score::{PedalChartPort, ScoreMoment, ScorePort};
use arietta_ports::types::{ImagePoint, ImageRect, OverlayPolicy, Tick};
use arietta_ports::viewer::RollViewerPort;
use std::collections::HashMap;

/// Projects the authoritative tick onto the image, hole overlays, score
/// cursor, and pedal chart. Every projection is skipped without error when
/// its target view is hidden.
#[derive(Debug)]
pub struct ViewSync {
    policy: OverlayPolicy,
    overlays_enabled: bool,
    /// Overlays currently on the surface: id → off tick. Prevents duplicate
    /// draws for holes sharing an off-tick bucket.
    painted: HashMap<String, Tick>,
    /// User-chosen horizontal framing, preserved across pans.
    pan_x: Option<f64>,
    last_tick: Tick,
}

impl ViewSync {
    pub fn new(policy: OverlayPolicy, overlays_enabled: bool) -> Self {
        Self {
            policy,
            overlays_enabled,
            painted: HashMap::new(),
            pan_x: None,
            last_tick: 0,
        }
    }

    pub fn set_policy(&mut self, policy: OverlayPolicy, viewer: &mut dyn RollViewerPort) {
        if self.policy != policy {
            self.policy = policy;
            self.clear(viewer);
        }
    }

    pub fn set_overlays_enabled(&mut self, enabled: bool, viewer: &mut dyn RollViewerPort) {
        self.overlays_enabled = enabled;
        if !enabled {
            self.clear(viewer);
        }
    }

    pub fn painted_count(&self) -> usize {
        self.painted.len()
    }

    /// Unconditional overlay teardown, used on recording switch and stop.
    pub fn clear(&mut self, viewer: &mut dyn RollViewerPort) {
        viewer.clear_overlays();
        self.painted.clear();
    }

    /// Forget the paint cursor after a discontinuous jump so onsets at the
    /// new position are not treated as already passed.
    pub fn reset_cursor(&mut self, tick: Tick) {
        self.last_tick = tick;
    }

    /// Record the horizontal center the user chose by panning or dragging.
    pub fn set_horizontal_framing(&mut self, x: f64) {
        self.pan_x = Some(x);
    }

    /// One poll step: pan the image, reconcile overlays, re-window the chart.
    pub fn update(
        &mut self,
        tick: Tick,
        indexes: &RollIndexes,
        viewer: &mut dyn RollViewerPort,
        chart: &mut dyn PedalChartPort,
    ) {
        self.pan_viewer(tick, &indexes.geometry, viewer);
        self.sync_overlays(tick, indexes, viewer);
        self.sync_chart(viewer, chart);
        self.last_tick = tick;
    }

    /// Pans the viewer so the mapped line is vertically centered, recentering
    /// on the last-known horizontal pan position rather than the image
    /// center.
    pub fn pan_viewer(&mut self, tick: Tick, geometry: &RollGeometry, viewer: &mut dyn RollViewerPort) {
        if !viewer.is_visible() {
            return;
        }
        let bounds = viewer.bounds();
        let line_px = geometry.tick_to_pixel(tick);
        let line = viewer.image_to_viewport(ImagePoint {
            x: 0.0,
            y: line_px as f64,
        });
        let x = self.pan_x.unwrap_or(bounds.x + bounds.width / 2.0);
        viewer.pan_to(ImagePoint { x, y: line.y });
    }

    pub fn sync_overlays(&mut self, tick: Tick, indexes: &RollIndexes, viewer: &mut dyn RollViewerPort) {
        if !self.overlays_enabled || !viewer.is_visible() {
            return;
        }
        match self.policy {
            OverlayPolicy::ActiveOnly => self.sync_overlays_active(tick, indexes, viewer),
            OverlayPolicy::Windowed => self.sync_overlays_windowed(indexes, viewer),
        }
    }

    fn sync_overlays_active(&mut self, tick: Tick, indexes: &RollIndexes, viewer: &mut dyn RollViewerPort) {
        // remove every overlay that has let off before the new tick
        let expired: Vec<String> = self
            .painted
            .iter()
            .filter(|(_, off)| **off < tick)
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            viewer.remove_overlay(&id);
            self.painted.remove(&id);
        }

        let from = if tick >= self.last_tick { self.last_tick } else { tick };
        for overlay in collect_overlays(indexes, from, tick) {
            self.paint(overlay, viewer);
        }
    }

    fn sync_overlays_windowed(&mut self, indexes: &RollIndexes, viewer: &mut dyn RollViewerPort) {
        let Some((window_start, window_end)) = visible_tick_range(&indexes.geometry, viewer) else {
            return;
        };

        let out_of_window: Vec<String> = self
            .painted
            .iter()
            .filter(|(_, off)| **off < window_start || **off > window_end)
            .map(|(id, _)| id.clone())
            .collect();
        for id in out_of_window {
            viewer.remove_overlay(&id);
            self.painted.remove(&id);
        }

        for overlay in collect_overlays(indexes, window_start, window_end) {
            self.paint(overlay, viewer);
        }
    }

    fn paint(&mut self, overlay: Overlay, viewer: &mut dyn RollViewerPort) {
        if self.painted.contains_key(&overlay.id) {
            return; // already on screen
        }
        viewer.add_overlay(&overlay.id, overlay.rect);
        self.painted.insert(overlay.id, overlay.off);
    }

    /// Matches the pedal chart's visible X window to the image's visible
    /// pixel range.
    pub fn sync_chart(&self, viewer: &dyn RollViewerPort, chart: &mut dyn PedalChartPort) {
        if !chart.is_visible() || !viewer.is_visible() {
            return;
        }
        let Some((start, end)) = visible_pixel_range(viewer) else {
            return;
        };
        chart.set_window(start, end);
    }

    /// Converts the current stream position into the score engine's native
    /// time base. Score and roll timelines are not tick-compatible; they are
    /// related through wall-clock proportion only.
    pub fn score_cursor(
        &self,
        score: &dyn ScorePort,
        stream_tick: Tick,
        stream_total_ticks: Tick,
    ) -> Option<ScoreMoment> {
        if !score.is_loaded() || !score.is_visible() || stream_total_ticks <= 0 {
            return None;
        }
        let millis_per_tick = score.song_time_ms() / stream_total_ticks as f64;
        let millis = (stream_tick as f64 * millis_per_tick).floor() + 1.0;
        Some(score.elements_at(millis))
    }
}

struct Overlay {
    id: String,
    rect: ImageRect,
    off: Tick,
}

/// Overlays with an onset inside `[from, to]`: analysis holes when the report
/// is present, otherwise synthetic rectangles derived from note spans and the
/// roll geometry.
fn collect_overlays(indexes: &RollIndexes, from: Tick, to: Tick) -> Vec<Overlay> {
    let geometry = &indexes.geometry;
    if !indexes.holes.is_empty() {
        return indexes
            .holes
            .onsets_in(from, to)
            .map(|hole| Overlay {
                id: hole.id.clone(),
                rect: ImageRect {
                    x: hole.x as f64,
                    y: hole.y as f64,
                    width: hole.width as f64,
                    height: hole.height as f64,
                },
                off: geometry.pixel_to_tick(hole.off_px).max(geometry.pixel_to_tick(hole.attack_px)),
            })
            .collect();
    }

    indexes
        .notes
        .onsets_in(from, to)
        .map(|span| {
            let on_px = geometry.tick_to_pixel(span.on);
            let off_px = geometry.tick_to_pixel(span.off);
            let top = on_px.min(off_px);
            Overlay {
                id: format!("note-{}-{}", span.on, span.note),
                rect: ImageRect {
                    x: geometry.note_column_px(span.note) as f64,
                    y: top as f64,
                    width: geometry.avg_hole_width_px.max(1) as f64,
                    height: span.duration().max(1) as f64,
                },
                off: span.off,
            }
        })
        .collect()
}

fn visible_pixel_range(viewer: &dyn RollViewerPort) -> Option<(f64, f64)> {
    let bounds = viewer.bounds();
    let top = viewer.viewport_to_image(ImagePoint {
        x: bounds.x,
        y: bounds.y,
    });
    let bottom = viewer.viewport_to_image(ImagePoint {
        x: bounds.x,
        y: bounds.y + bounds.height,
    });
    if top.y.is_nan() || bottom.y.is_nan() {
        return None;
    }
    Some((top.y.min(bottom.y), top.y.max(bottom.y)))
}

fn visible_tick_range(geometry: &RollGeometry, viewer: &dyn RollViewerPort) -> Option<(Tick, Tick)> {
    let (low_px, high_px) = visible_pixel_range(viewer)?;
    let a = geometry.pixel_to_tick(low_px.floor() as i64);
    let b = geometry.pixel_to_tick(high_px.ceil() as i64);
    Some((a.min(b), a.max(b)))
}
