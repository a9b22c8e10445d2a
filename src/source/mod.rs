#[cfg(feature = "app")]
pub mod commands;
pub mod controller;

pub use controller::{SourceBackends, SourceController, SourceMode};
