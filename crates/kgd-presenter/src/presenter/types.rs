use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Something the presenter needs the mediator to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenterSignal {
    /// The keyguard should go away (or a verification finished).
    KeyguardDone { authenticated: bool },
    /// Keep the screen on; `None` means the default awake interval.
    PokeWakelock { hold: Option<Duration> },
    /// The keyguard surface has been drawn at least once.
    DoneDrawing,
    Notice(KeyguardNotice),
}

/// User-facing conditions a UI layer may want to surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum KeyguardNotice {
    /// Too many failures; attempts refused for `duration`.
    TimedLockout {
        failed_attempts: u32,
        duration: Duration,
    },
    /// A few more failures and the account login takes over.
    AlmostAtAccountLogin {
        failed_attempts: u32,
        remaining_attempts: u32,
    },
    /// The account login is now the only way in.
    PermanentlyLocked { failed_attempts: u32 },
    SimUnlockFailed,
}

/// Input from the keyguard screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    /// Slide / unlock gesture on the lock screen.
    GoToUnlockScreen,
    /// Back out of the unlock screen.
    GoToLockScreen,
    ForgotPattern(bool),
    EmergencyCall,
    /// Pattern cells in draw order (0–8, row-major).
    Pattern(Vec<u8>),
    /// Explicit password submission.
    Password(String),
    /// Password field contents after an edit, for quick unlock.
    PasswordChanged(String),
    SimPin(String),
    SimPuk { puk: String, new_pin: String },
    AccountLogin { login: String, password: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Accepted,
    Rejected { failed_attempts: u32 },
    LockedOut { remaining: Duration },
    /// Input was valid for the screen but had no effect.
    Ignored,
    /// Input does not match the screen or method currently shown.
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputResult {
    pub outcome: AttemptOutcome,
    pub signals: Vec<PresenterSignal>,
}

impl InputResult {
    pub fn new(outcome: AttemptOutcome, signals: Vec<PresenterSignal>) -> Self {
        Self { outcome, signals }
    }

    pub fn bare(outcome: AttemptOutcome) -> Self {
        Self::new(outcome, Vec::new())
    }
}
