//! Unlock method and initial screen selection.

use kgd_core::{PasswordQuality, PresenterMode, SimState, UnlockMethod};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodInputs {
    pub sim_state: SimState,
    pub quality: PasswordQuality,
    pub pattern_enabled: bool,
    pub password_enabled: bool,
    pub forgot_pattern: bool,
    pub permanently_locked: bool,
}

pub fn select_unlock_method(inputs: &MethodInputs) -> UnlockMethod {
    if inputs.sim_state.is_pin_locked() {
        return UnlockMethod::SimPin;
    }
    match inputs.quality {
        PasswordQuality::Numeric | PasswordQuality::Alphabetic | PasswordQuality::Alphanumeric => {
            UnlockMethod::Password
        }
        PasswordQuality::Something | PasswordQuality::Finger | PasswordQuality::Unspecified => {
            if inputs.forgot_pattern || inputs.permanently_locked {
                UnlockMethod::Account
            } else if inputs.quality == PasswordQuality::Unspecified
                && !inputs.pattern_enabled
                && !inputs.password_enabled
            {
                UnlockMethod::LockScreenOnly
            } else {
                UnlockMethod::Pattern
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeInputs {
    pub sim_state: SimState,
    pub require_sim: bool,
    pub provisioned: bool,
    pub locked_but_not_secured: bool,
    pub disable_on_security: bool,
    pub secure: bool,
    pub method: UnlockMethod,
}

/// Missing SIM on an unprovisioned device that requires one: nothing to
/// unlock with, so the lock screen stays up with instructions.
pub fn stuck_on_missing_sim(sim_state: SimState, require_sim: bool, provisioned: bool) -> bool {
    require_sim && !provisioned && sim_state == SimState::Absent
}

pub fn initial_mode(inputs: &ModeInputs) -> PresenterMode {
    if stuck_on_missing_sim(inputs.sim_state, inputs.require_sim, inputs.provisioned) {
        return PresenterMode::LockScreen;
    }
    if inputs.sim_state.is_pin_locked() {
        return PresenterMode::UnlockScreen;
    }
    if inputs.locked_but_not_secured {
        return PresenterMode::LockScreen;
    }
    if inputs.disable_on_security && inputs.secure && inputs.method == UnlockMethod::Pattern {
        return PresenterMode::UnlockScreen;
    }
    PresenterMode::LockScreen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(quality: PasswordQuality) -> MethodInputs {
        MethodInputs {
            sim_state: SimState::Ready,
            quality,
            pattern_enabled: true,
            password_enabled: false,
            forgot_pattern: false,
            permanently_locked: false,
        }
    }

    fn mode() -> ModeInputs {
        ModeInputs {
            sim_state: SimState::Ready,
            require_sim: true,
            provisioned: true,
            locked_but_not_secured: false,
            disable_on_security: false,
            secure: true,
            method: UnlockMethod::Pattern,
        }
    }

    // ── Method selection ───────────────────────────────────────────────

    #[test]
    fn sim_lock_wins() {
        let inputs = MethodInputs {
            sim_state: SimState::PukRequired,
            ..method(PasswordQuality::Alphanumeric)
        };
        assert_eq!(select_unlock_method(&inputs), UnlockMethod::SimPin);
    }

    #[test]
    fn password_qualities() {
        for q in [
            PasswordQuality::Numeric,
            PasswordQuality::Alphabetic,
            PasswordQuality::Alphanumeric,
        ] {
            assert_eq!(select_unlock_method(&method(q)), UnlockMethod::Password);
        }
    }

    #[test]
    fn pattern_like_qualities() {
        for q in [PasswordQuality::Something, PasswordQuality::Finger] {
            assert_eq!(select_unlock_method(&method(q)), UnlockMethod::Pattern);
        }
        let forgot = MethodInputs { forgot_pattern: true, ..method(PasswordQuality::Something) };
        assert_eq!(select_unlock_method(&forgot), UnlockMethod::Account);
        let locked = MethodInputs { permanently_locked: true, ..method(PasswordQuality::Finger) };
        assert_eq!(select_unlock_method(&locked), UnlockMethod::Account);
    }

    #[test]
    fn unspecified_without_credential_is_lock_screen_only() {
        let none = MethodInputs { pattern_enabled: false, ..method(PasswordQuality::Unspecified) };
        assert_eq!(select_unlock_method(&none), UnlockMethod::LockScreenOnly);
        assert_eq!(
            select_unlock_method(&method(PasswordQuality::Unspecified)),
            UnlockMethod::Pattern
        );
    }

    // ── Initial mode ───────────────────────────────────────────────────

    #[test]
    fn default_is_lock_screen() {
        assert_eq!(initial_mode(&mode()), PresenterMode::LockScreen);
    }

    #[test]
    fn sim_pin_forces_unlock_screen() {
        let inputs = ModeInputs { sim_state: SimState::PinRequired, ..mode() };
        assert_eq!(initial_mode(&inputs), PresenterMode::UnlockScreen);
    }

    #[test]
    fn stuck_on_missing_sim_keeps_lock_screen() {
        let inputs = ModeInputs {
            sim_state: SimState::Absent,
            provisioned: false,
            disable_on_security: true,
            ..mode()
        };
        assert!(stuck_on_missing_sim(SimState::Absent, true, false));
        assert!(!stuck_on_missing_sim(SimState::Absent, false, false));
        assert_eq!(initial_mode(&inputs), PresenterMode::LockScreen);
    }

    #[test]
    fn disable_on_security_skips_lock_screen() {
        let inputs = ModeInputs { disable_on_security: true, ..mode() };
        assert_eq!(initial_mode(&inputs), PresenterMode::UnlockScreen);

        let slide = ModeInputs { locked_but_not_secured: true, ..inputs };
        assert_eq!(initial_mode(&slide), PresenterMode::LockScreen);

        let password = ModeInputs { method: UnlockMethod::Password, ..inputs };
        assert_eq!(initial_mode(&password), PresenterMode::LockScreen);
    }
}
