//! Presenter: sub-modules.

pub mod method;
pub mod screens;
pub mod service;
pub mod types;

pub use method::{initial_mode, select_unlock_method, MethodInputs, ModeInputs};
pub use screens::{
    HeadlessHost, HeadlessScreens, HostProbe, HostRecord, HostStatus, KeyguardScreen, ScreenEvent,
    ScreenFactory, ScreenKind, ScreenProbe, WindowHost,
};
pub use service::{LockScreenPresenter, PresenterDeps};
pub use types::*;
