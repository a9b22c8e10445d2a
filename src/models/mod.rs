mod forecast;
mod reading;

pub use forecast::Forecast;
pub use reading::{AeratorState, Reading};
