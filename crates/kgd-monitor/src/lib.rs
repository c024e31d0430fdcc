//! # Keyguard update monitor
//!
//! Passive aggregator of the device facts the lock screen depends on:
//!
//! - **SIM** – decoded from the telephony broadcast strings
//! - **Battery** – level, plug and charge status with change suppression
//! - **Carrier** – PLMN / SPN display strings
//! - **Telephony** – ringer mode and call state
//! - **Provisioning** – one-way setup-complete flag
//! - **Failed unlock attempts** – shared counter
//!
//! Observers subscribe with a channel and receive tagged [`FactEvent`]s.

pub mod monitor;

pub use monitor::*;
