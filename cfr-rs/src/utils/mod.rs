mod ma;
mod stats;

pub use ma::*;
pub use stats::*;
