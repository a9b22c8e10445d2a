#[cfg(feature = "app")]
pub mod commands;
pub mod monitor;
pub mod rules;

pub use monitor::AlertMonitor;
pub use rules::{AlertThresholds, AlertTracker};
