pub mod acceleration;
pub mod builder;
pub mod geometry;
pub mod interval;
pub mod model;
pub mod notes;

pub use acceleration::*;
pub use builder::*;
pub use geometry::*;
pub use interval::*;
pub use model::*;
pub use notes::*;
