//! Mediator: sub-modules.

mod handle;
mod machine;
mod runner;
mod types;
mod wakelock;

pub use handle::KeyguardMediatorHandle;
pub use machine::{Inputs, KeyguardMachine};
pub use runner::{launch, KeyguardMediator, MediatorDeps};
pub use types::{
    Effect, Event, KeyguardEvent, KeyguardState, KeyguardStatus, LockStage, PresenterCommand,
    StatusSnapshot, VerifyTicket, WaiterId,
};
pub use wakelock::WakeLockSet;
