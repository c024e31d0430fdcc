//! # Keyguard mediator
//!
//! The single entry point through which window-manager policy, power state,
//! telephony facts and lock-screen input reach the keyguard. All decisions
//! are made by a pure state machine ([`KeyguardMachine`]) driven from one
//! tokio task; callers talk to it through a cloneable
//! [`KeyguardMediatorHandle`] and poll the published status from any
//! thread.

pub mod mediator;

pub use mediator::*;
