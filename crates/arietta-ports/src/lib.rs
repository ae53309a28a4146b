pub mod analysis;
pub mod catalog;
pub mod midi;
pub mod sampler;
pub mod score;
pub mod sequencer;
pub mod source;
pub mod types;
pub mod viewer;

pub use analysis::*;
pub use catalog::*;
pub use midi::*;
pub use sampler::*;
pub use score::*;
pub use sequencer::*;
pub use source::*;
pub use types::*;
pub use viewer::*;
