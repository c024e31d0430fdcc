// kgd-core – Collaborator contracts
//
// Everything the keyguard drives or consults but does not own. All of them
// are called from the mediator's single serialized task, so implementations
// only need to be `Send + Sync` for sharing, not internally ordered.

use chrono::{DateTime, Utc};

use crate::types::{PasswordQuality, StatusBarFlags, WakeLockKind};

/// Power manager surface.
pub trait PowerControl: Send + Sync {
    fn acquire_wake_lock(&self, kind: WakeLockKind);
    fn release_wake_lock(&self, kind: WakeLockKind);
    /// Allow or forbid user activity from extending the screen timeout.
    fn enable_user_activity(&self, enabled: bool);
    /// Report user activity now.
    fn user_activity(&self);
}

pub trait StatusBar: Send + Sync {
    fn disable(&self, flags: StatusBarFlags);
}

/// Broadcasts and system-wide notifications.
pub trait SystemNotifier: Send + Sync {
    /// The user has passed the keyguard.
    fn user_present(&self);
    /// The lock screen became visible or went away.
    fn lock_screen_shown(&self, shown: bool);
    /// Close transient system dialogs (recents, global actions) before
    /// the keyguard covers them.
    fn close_system_dialogs(&self, reason: &str);
}

/// Persisted credential policy and checks.
pub trait CredentialStore: Send + Sync {
    fn password_quality(&self) -> PasswordQuality;
    fn is_pattern_enabled(&self) -> bool;
    fn is_password_enabled(&self) -> bool;

    fn check_pattern(&self, pattern: &[u8]) -> bool;
    fn check_password(&self, password: &str) -> bool;
    /// Hand a PIN to the SIM card; returns whether it was accepted.
    fn supply_sim_pin(&self, pin: &str) -> bool;
    /// Hand a PUK and replacement PIN to a PUK-locked SIM.
    fn supply_sim_puk(&self, puk: &str, new_pin: &str) -> bool;

    /// A fallback account exists that can unlock a forgotten pattern.
    fn has_fallback_account(&self) -> bool;
    fn check_fallback_account(&self, login: &str, password: &str) -> bool;

    fn is_permanently_locked(&self) -> bool;
    fn set_permanently_locked(&self, locked: bool);

    fn lockout_deadline(&self) -> Option<DateTime<Utc>>;
    fn set_lockout_deadline(&self, deadline: Option<DateTime<Utc>>);

    /// A stored credential has to be entered to pass the keyguard.
    fn is_secure(&self) -> bool {
        match self.password_quality() {
            PasswordQuality::Numeric
            | PasswordQuality::Alphabetic
            | PasswordQuality::Alphanumeric => self.is_password_enabled(),
            _ => self.is_pattern_enabled(),
        }
    }
}

/// Read-only view of the keyguard status for other system components.
pub trait LockStatus: Send + Sync {
    fn is_showing(&self) -> bool;
    fn is_secure(&self) -> bool;
    fn is_input_restricted(&self) -> bool;
}
