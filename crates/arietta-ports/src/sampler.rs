use crate::types::Gain01;

/// Piano sample playback. Gain is the fully resolved expression value;
/// the sampler applies no further dynamics of its own.
pub trait SamplerPort: Send {
    fn note_on(&mut self, note: u8, gain: Gain01);
    fn note_off(&mut self, note: u8);

    /// `level` is a continuous 0..=127 sustain depth; `None` means fully down.
    fn pedal_down(&mut self, level: Option<u8>);
    fn pedal_up(&mut self);
}
