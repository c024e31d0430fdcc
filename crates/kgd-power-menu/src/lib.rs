//! # Power menu
//!
//! The long-press power button dialog. Items come from configuration;
//! which of them are offered depends on whether the keyguard is showing and
//! whether the device has finished setup. Two-state items (airplane mode,
//! silent mode) track an in-flight transition and refuse presses until the
//! system confirms the new state.

pub mod power_menu;

pub use power_menu::*;
