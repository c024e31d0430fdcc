use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;

use kgd_core::{
    KeyCode, PhoneCallState, ScreenOffReason, SimState, StatusBarFlags, WakeLockKind,
};
use kgd_presenter::KeyguardNotice;
use serde::{Deserialize, Serialize};

/// Identifies one pending `verify_unlock` request.
pub type VerifyTicket = u64;

/// Identifies one caller blocked in `set_keyguard_enabled(true)`.
pub type WaiterId = u64;

/// Externally visible keyguard state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyguardState {
    Hidden,
    /// Showing, and a slide or tap dismisses it.
    ShowingInsecureSlide,
    /// Showing, and a credential is needed to dismiss it.
    ShowingSecure,
    /// Shown on behalf of an external `verify_unlock` request.
    VerifyingExternal,
}

impl KeyguardState {
    fn to_u8(self) -> u8 {
        match self {
            Self::Hidden => 0,
            Self::ShowingInsecureSlide => 1,
            Self::ShowingSecure => 2,
            Self::VerifyingExternal => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::ShowingInsecureSlide,
            2 => Self::ShowingSecure,
            3 => Self::VerifyingExternal,
            _ => Self::Hidden,
        }
    }

    pub fn is_showing(self) -> bool {
        self != Self::Hidden
    }
}

/// Which delayed-lock timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStage {
    /// Plain delayed lock.
    Lock,
    /// Show the slide screen ahead of the security delay.
    Slide,
    /// Security delay elapsed; the slide screen now needs a credential.
    Escalate,
}

/// Everything the state machine reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SystemReady,
    ScreenTurnedOff(ScreenOffReason),
    ScreenTurnedOn,
    SetKeyguardEnabled { enabled: bool, waiter: Option<WaiterId> },
    VerifyUnlock(VerifyTicket),
    SetHidden(bool),
    DoKeyguardTimeout,
    DelayedLock { sequence: u64, stage: LockStage },
    WakeLockTimeout { sequence: u64 },
    /// `None` uses the configured awake interval.
    PokeWakelock(Option<Duration>),
    WakeWhenReady(KeyCode),
    /// The presenter answered a wake key.
    WakeHandled { poked: bool },
    KeyguardDone { authenticated: bool, wakeup: bool },
    DoneDrawing,
    DrawTimeout,
    SimStateChanged(SimState),
    PhoneStateChanged(PhoneCallState),
    DeviceProvisioned,
    KeyboardOpen(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenterCommand {
    Show,
    Hide,
    Reset,
    VerifyUnlock,
    ScreenTurnedOff,
    ScreenTurnedOn,
    WakeWhenReady(KeyCode),
    SetLockedButNotSecured(bool),
}

/// Side effects requested by the state machine, applied in order by the
/// runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Present(PresenterCommand),
    AcquireWakeLock(WakeLockKind),
    ReleaseWakeLock(WakeLockKind),
    EnableUserActivity(bool),
    UserActivity,
    StatusBar(StatusBarFlags),
    ScheduleDelayedLock { sequence: u64, stage: LockStage, after: Duration },
    ScheduleWakeLockRelease { sequence: u64, after: Duration },
    ScheduleDrawTimeout(Duration),
    CompleteVerification { ticket: VerifyTicket, authenticated: bool },
    CompleteWaiter(WaiterId),
    ClearFailedAttempts,
    LockScreenShown(bool),
    CloseSystemDialogs,
    UserPresent,
}

/// Status events published by a running mediator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum KeyguardEvent {
    StateChanged { state: KeyguardState },
    Notice { notice: KeyguardNotice },
    UserPresent,
}

/// Point-in-time copy of [`KeyguardStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub state: KeyguardState,
    pub showing: bool,
    pub hidden: bool,
    pub secure: bool,
    pub input_restricted: bool,
    pub externally_enabled: bool,
}

/// Published keyguard status (atomics, safe to read from any thread).
#[derive(Debug)]
pub struct KeyguardStatus {
    state: AtomicU8,
    showing: AtomicBool,
    hidden: AtomicBool,
    secure: AtomicBool,
    input_restricted: AtomicBool,
    externally_enabled: AtomicBool,
}

impl Default for KeyguardStatus {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(KeyguardState::Hidden.to_u8()),
            showing: AtomicBool::new(false),
            hidden: AtomicBool::new(false),
            secure: AtomicBool::new(false),
            // Unprovisioned until the first publish says otherwise.
            input_restricted: AtomicBool::new(true),
            externally_enabled: AtomicBool::new(true),
        }
    }
}

impl KeyguardStatus {
    pub fn state(&self) -> KeyguardState {
        KeyguardState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_showing(&self) -> bool {
        self.showing.load(Ordering::Acquire)
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::Acquire)
    }

    pub fn is_secure(&self) -> bool {
        self.secure.load(Ordering::Acquire)
    }

    pub fn is_input_restricted(&self) -> bool {
        self.input_restricted.load(Ordering::Acquire)
    }

    pub fn is_externally_enabled(&self) -> bool {
        self.externally_enabled.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state(),
            showing: self.is_showing(),
            hidden: self.is_hidden(),
            secure: self.is_secure(),
            input_restricted: self.is_input_restricted(),
            externally_enabled: self.is_externally_enabled(),
        }
    }

    pub(crate) fn store(&self, snapshot: StatusSnapshot) {
        self.showing.store(snapshot.showing, Ordering::Release);
        self.hidden.store(snapshot.hidden, Ordering::Release);
        self.secure.store(snapshot.secure, Ordering::Release);
        self.input_restricted.store(snapshot.input_restricted, Ordering::Release);
        self.externally_enabled.store(snapshot.externally_enabled, Ordering::Release);
        self.state.store(snapshot.state.to_u8(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_store_and_load() {
        let status = KeyguardStatus::default();
        assert_eq!(status.state(), KeyguardState::Hidden);
        let snapshot = StatusSnapshot {
            state: KeyguardState::VerifyingExternal,
            showing: true,
            hidden: false,
            secure: true,
            input_restricted: true,
            externally_enabled: false,
        };
        status.store(snapshot);
        assert_eq!(status.snapshot(), snapshot);
    }

    #[test]
    fn event_serde_shape() {
        let json = serde_json::to_string(&KeyguardEvent::StateChanged {
            state: KeyguardState::ShowingSecure,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"stateChanged","state":"showingSecure"}"#);
    }
}
