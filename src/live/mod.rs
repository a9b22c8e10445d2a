pub mod hub;
pub mod window;

pub use hub::{LiveHub, LiveSnapshot};
pub use window::{LiveWindow, DEFAULT_CAPACITY};
