use crate::types::Pixel;
use serde::{Deserialize, Serialize};

/// One perforation from the roll-analysis report. Pixel positions are in
/// image space, uncorrected for scroll direction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HoleDescriptor {
    pub id: String,
    pub x: Pixel,
    pub y: Pixel,
    pub width: Pixel,
    pub height: Pixel,
    /// Pixel row at which the note attacks.
    pub attack_px: Pixel,
    /// Pixel row at which the note lets off.
    pub off_px: Pixel,
    /// Physical perforation-column index on the tracker bar.
    pub tracker_hole: u32,
    pub note: Option<u8>,
}

#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    #[error("decompress failed: {0}")]
    Decompress(String),
    #[error("parse failed: {0}")]
    Parse(String),
}

/// Decoder for the compressed analysis report attached to some recordings.
pub trait AnalysisPort: Send {
    fn decode(&self, data: &[u8]) -> Result<Vec<HoleDescriptor>, AnalysisError>;
}
