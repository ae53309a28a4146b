mod support;

use arietta_core::sync::ViewSync;
use arietta_domain_roll::builder::{build_indexes, BuildConfig};
use arietta_domain_roll::model::{HoleIndex, RollIndexes};
use arietta_ports::analysis::HoleDescriptor;
use arietta_ports::score::ScorePort;
use arietta_ports::types::{ImageRect, OverlayPolicy};
use pretty_assertions::assert_eq;
use support::*;

const TOTAL: i64 = 1_000;

/// welte-red scrolls down, so pixel = first_hole + tick; the identity
/// transforms in the fake viewer keep the arithmetic checkable by hand.
fn fixture_indexes() -> RollIndexes {
    let tracks = vec![vec![
        text(0, 0, "@ROLL_TYPE: welte-red"),
        text(0, 0, "@IMAGE_LENGTH: 10000"),
        text(0, 0, "@FIRST_HOLE: 100"),
        text(0, 0, "@AVG_HOLE_WIDTH: 20"),
        text(0, 0, "@ROLL_WIDTH: 3000"),
        text(0, 0, "@IMAGE_WIDTH: 3300"),
        tempo(0, 0, 60.0),
        note_on(100, 0, 60, 64),
        note_on(300, 0, 60, 0),
        note_on(500, 0, 72, 80),
        note_on(900, 0, 72, 0),
    ]];
    let (indexes, _) = build_indexes(&tracks, TOTAL, BuildConfig::default());
    indexes
}

#[test]
fn pan_centers_the_mapped_line_vertically() {
    let indexes = fixture_indexes();
    let (mut viewer, viewer_state) = FakeViewer::new();
    let (mut chart, _) = FakeChart::new();
    let mut sync = ViewSync::new(OverlayPolicy::ActiveOnly, false);

    sync.update(150, &indexes, &mut viewer, &mut chart);

    let pans = &viewer_state.lock().pans;
    assert_eq!(pans.len(), 1);
    // tick 150 sits at pixel 250; default horizontal framing is the center
    assert_eq!(pans[0].y, 250.0);
    assert_eq!(pans[0].x, 50.0);
}

#[test]
fn pan_keeps_the_user_chosen_horizontal_framing() {
    let indexes = fixture_indexes();
    let (mut viewer, viewer_state) = FakeViewer::new();
    let (mut chart, _) = FakeChart::new();
    let mut sync = ViewSync::new(OverlayPolicy::ActiveOnly, false);

    sync.set_horizontal_framing(42.0);
    sync.update(150, &indexes, &mut viewer, &mut chart);

    assert_eq!(viewer_state.lock().pans[0].x, 42.0);
}

#[test]
fn hidden_viewer_gets_no_projections() {
    let indexes = fixture_indexes();
    let (mut viewer, viewer_state) = FakeViewer::new();
    let (mut chart, chart_state) = FakeChart::new();
    viewer_state.lock().visible = false;
    let mut sync = ViewSync::new(OverlayPolicy::ActiveOnly, true);

    sync.update(150, &indexes, &mut viewer, &mut chart);

    let viewer_state = viewer_state.lock();
    assert!(viewer_state.pans.is_empty());
    assert_eq!(viewer_state.adds, 0);
    assert!(chart_state.lock().windows.is_empty());
}

#[test]
fn active_overlays_follow_the_sounding_notes() {
    let indexes = fixture_indexes();
    let (mut viewer, viewer_state) = FakeViewer::new();
    let (mut chart, _) = FakeChart::new();
    let mut sync = ViewSync::new(OverlayPolicy::ActiveOnly, true);

    sync.update(150, &indexes, &mut viewer, &mut chart);
    assert!(viewer_state.lock().overlays.contains_key("note-100-60"));
    assert_eq!(sync.painted_count(), 1);

    // note 60 lets off at 300; by 350 its overlay is gone and nothing new
    // has started
    sync.update(350, &indexes, &mut viewer, &mut chart);
    assert!(viewer_state.lock().overlays.is_empty());
    assert_eq!(sync.painted_count(), 0);

    sync.update(550, &indexes, &mut viewer, &mut chart);
    assert!(viewer_state.lock().overlays.contains_key("note-500-72"));
}

#[test]
fn overlays_are_painted_once_per_onset() {
    let indexes = fixture_indexes();
    let (mut viewer, viewer_state) = FakeViewer::new();
    let (mut chart, _) = FakeChart::new();
    let mut sync = ViewSync::new(OverlayPolicy::ActiveOnly, true);

    sync.update(150, &indexes, &mut viewer, &mut chart);
    sync.update(160, &indexes, &mut viewer, &mut chart);
    sync.update(170, &indexes, &mut viewer, &mut chart);

    assert_eq!(viewer_state.lock().adds, 1);
}

#[test]
fn disabled_overlays_never_paint() {
    let indexes = fixture_indexes();
    let (mut viewer, viewer_state) = FakeViewer::new();
    let (mut chart, _) = FakeChart::new();
    let mut sync = ViewSync::new(OverlayPolicy::ActiveOnly, false);

    sync.update(150, &indexes, &mut viewer, &mut chart);
    assert_eq!(viewer_state.lock().adds, 0);
}

#[test]
fn windowed_overlays_cover_the_visible_range() {
    let indexes = fixture_indexes();
    let (mut viewer, viewer_state) = FakeViewer::new();
    let (mut chart, _) = FakeChart::new();
    let mut sync = ViewSync::new(OverlayPolicy::Windowed, true);

    // bounds y 0..400 map to pixels 0..400, ticks -100..300: only the first
    // note's span lies inside
    sync.update(0, &indexes, &mut viewer, &mut chart);
    {
        let state = viewer_state.lock();
        assert!(state.overlays.contains_key("note-100-60"));
        assert!(!state.overlays.contains_key("note-500-72"));
    }

    // scroll the viewport to pixels 600..1000 (ticks 500..900)
    viewer_state.lock().bounds = ImageRect {
        x: 0.0,
        y: 600.0,
        width: 100.0,
        height: 400.0,
    };
    sync.update(0, &indexes, &mut viewer, &mut chart);
    let state = viewer_state.lock();
    assert!(!state.overlays.contains_key("note-100-60"));
    assert!(state.overlays.contains_key("note-500-72"));
}

#[test]
fn policy_change_clears_the_surface() {
    let indexes = fixture_indexes();
    let (mut viewer, viewer_state) = FakeViewer::new();
    let (mut chart, _) = FakeChart::new();
    let mut sync = ViewSync::new(OverlayPolicy::ActiveOnly, true);

    sync.update(150, &indexes, &mut viewer, &mut chart);
    assert_eq!(sync.painted_count(), 1);

    sync.set_policy(OverlayPolicy::Windowed, &mut viewer);
    assert_eq!(sync.painted_count(), 0);
    assert_eq!(viewer_state.lock().clears, 1);
}

#[test]
fn analysis_holes_take_precedence_over_synthetic_rectangles() {
    let mut indexes = fixture_indexes();
    let holes = vec![HoleDescriptor {
        id: "h1".to_string(),
        x: 10,
        y: 200,
        width: 20,
        height: 200,
        attack_px: 200,
        off_px: 400,
        tracker_hole: 40,
        note: Some(60),
    }];
    indexes.holes = HoleIndex::build(holes, &indexes.geometry);

    let (mut viewer, viewer_state) = FakeViewer::new();
    let (mut chart, _) = FakeChart::new();
    let mut sync = ViewSync::new(OverlayPolicy::ActiveOnly, true);

    sync.update(150, &indexes, &mut viewer, &mut chart);

    let state = viewer_state.lock();
    assert!(state.overlays.contains_key("h1"));
    assert!(!state.overlays.contains_key("note-100-60"));
    assert_eq!(
        state.overlays["h1"],
        ImageRect {
            x: 10.0,
            y: 200.0,
            width: 20.0,
            height: 200.0,
        }
    );
}

#[test]
fn chart_window_tracks_the_visible_pixel_range() {
    let indexes = fixture_indexes();
    let (mut viewer, _) = FakeViewer::new();
    let (mut chart, chart_state) = FakeChart::new();
    let mut sync = ViewSync::new(OverlayPolicy::ActiveOnly, false);

    sync.update(150, &indexes, &mut viewer, &mut chart);

    assert_eq!(chart_state.lock().windows, vec![(0.0, 400.0)]);
}

#[test]
fn hidden_chart_is_left_alone() {
    let indexes = fixture_indexes();
    let (mut viewer, _) = FakeViewer::new();
    let (mut chart, chart_state) = FakeChart::new();
    chart_state.lock().visible = false;
    let mut sync = ViewSync::new(OverlayPolicy::ActiveOnly, false);

    sync.update(150, &indexes, &mut viewer, &mut chart);

    assert!(chart_state.lock().windows.is_empty());
}

#[test]
fn score_cursor_maps_ticks_through_wall_clock_proportion() {
    let (mut score, score_state) = FakeScore::new();
    score.load("score-1").unwrap();
    let sync = ViewSync::new(OverlayPolicy::ActiveOnly, false);

    // 10s of song over 1000 stream ticks: tick 500 is 5000ms, plus one
    let moment = sync.score_cursor(&score, 500, 1_000).unwrap();
    assert_eq!(moment.page, 5);
    assert_eq!(score_state.lock().queried_millis, vec![5_001.0]);
}

#[test]
fn score_cursor_is_none_without_a_loaded_score() {
    let (score, _) = FakeScore::new();
    let sync = ViewSync::new(OverlayPolicy::ActiveOnly, false);
    assert!(sync.score_cursor(&score, 500, 1_000).is_none());
    assert!(sync.score_cursor(&score, 500, 0).is_none());
}
