use arietta_ports::analysis::{AnalysisError, AnalysisPort, HoleDescriptor};
use serde::Deserialize;

/// Hole-report decoder for the JSON produced by the roll-analysis pipeline.
/// Keys follow the pipeline's column-oriented naming.
pub struct JsonHoleReport;

#[derive(Deserialize)]
struct ReportDto {
    #[serde(rename = "holeData")]
    holes: Vec<HoleDto>,
}

#[derive(Deserialize)]
struct HoleDto {
    #[serde(rename = "ORIGIN_COL")]
    x: i64,
    #[serde(rename = "ORIGIN_ROW")]
    y: i64,
    #[serde(rename = "WIDTH_COL")]
    width: i64,
    #[serde(rename = "WIDTH_ROW")]
    height: i64,
    #[serde(rename = "NOTE_ATTACK")]
    attack: i64,
    #[serde(rename = "OFF_TIME")]
    off: i64,
    #[serde(rename = "TRACKER_HOLE")]
    tracker_hole: u32,
    #[serde(rename = "MIDI_KEY", default)]
    midi_key: Option<u8>,
}

impl AnalysisPort for JsonHoleReport {
    fn decode(&self, data: &[u8]) -> Result<Vec<HoleDescriptor>, AnalysisError> {
        let report: ReportDto =
            serde_json::from_slice(data).map_err(|e| AnalysisError::Parse(e.to_string()))?;
        Ok(report
            .holes
            .into_iter()
            .enumerate()
            .map(|(index, hole)| HoleDescriptor {
                id: format!("hole-{index}"),
                x: hole.x,
                y: hole.y,
                width: hole.width,
                height: hole.height,
                attack_px: hole.attack,
                off_px: hole.off,
                tracker_hole: hole.tracker_hole,
                note: hole.midi_key,
            })
            .collect())
    }
}
