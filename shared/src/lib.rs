pub mod picks;
pub mod portfolio;
pub mod stats;

pub use picks::*;
pub use portfolio::*;
pub use stats::*;
