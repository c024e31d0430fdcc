// kgd-core – crate root
//
// Shared fact types, configuration, errors and the collaborator contracts
// used by the monitor, presenter, mediator and power menu crates.

pub mod config;
pub mod error;
pub mod headless;
pub mod ports;
pub mod types;

// Convenience re-exports
pub use config::{KeyguardConfig, LockoutPolicy};
pub use error::{KeyguardError, KeyguardResult};
pub use ports::{
    CredentialStore, LockStatus, PowerControl, StatusBar, SystemNotifier,
};
pub use types::*;
