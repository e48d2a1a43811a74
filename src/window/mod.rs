mod double;
mod sliding;

pub use double::{DoubleTimeWindow, WindowSide, WindowView};
pub use sliding::{SlidingTimeWindow, Timestamped};
