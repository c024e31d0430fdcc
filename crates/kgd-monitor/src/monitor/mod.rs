//! Update monitor: sub-modules.

pub mod decode;
pub mod service;
pub mod types;

pub use service::{MonitorHandle, ObserverId, UpdateMonitor, UpdateMonitorState};
pub use types::*;
