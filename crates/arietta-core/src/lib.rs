pub mod commands;
pub mod engine;
pub mod expression;
pub mod sync;
pub mod transport;

pub use commands::*;
pub use engine::*;
pub use expression::*;
pub use sync::*;
pub use transport::*;
