//! # Lock screen presenter
//!
//! Owns the two keyguard screens (informational lock screen and credential
//! unlock screen), decides which unlock method to present, and turns user
//! input into authentication outcomes and signals for the mediator.

pub mod presenter;

pub use presenter::*;
