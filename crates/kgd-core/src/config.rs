// kgd-core – Keyguard configuration
//
// Every threshold and flag the mediator and presenter consume. Stored as a
// single JSON document:
//   <config_dir>/kgd/keyguard.json

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{KeyguardError, KeyguardResult};
use crate::types::ScreenOffReason;

const CONFIG_DIR_NAME: &str = "kgd";
const CONFIG_FILE_NAME: &str = "keyguard.json";

/// Failed-attempt thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LockoutPolicy {
    /// Every Nth consecutive failure starts a timed lockout.
    pub failed_attempts_before_timeout: u32,
    /// Failures after which the account fallback takes over.
    pub failed_attempts_before_reset: u32,
    /// Length of each timed lockout.
    pub failed_attempt_timeout_ms: u64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            failed_attempts_before_timeout: 5,
            failed_attempts_before_reset: 20,
            failed_attempt_timeout_ms: 30_000,
        }
    }
}

impl LockoutPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.failed_attempt_timeout_ms)
    }

    /// Failure count at which the "almost at account login" notice appears.
    pub fn almost_at_reset(&self) -> u32 {
        self.failed_attempts_before_reset
            .saturating_sub(self.failed_attempts_before_timeout)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyguardConfig {
    // ── Wake locks ─────────────────────────────────────────────────────
    /// How long a poke keeps the screen on.
    pub awake_interval_ms: u64,
    /// Poke duration while a hardware keyboard is open.
    pub awake_interval_keyboard_open_ms: u64,
    /// Poke duration after an emergency-call action.
    pub emergency_call_timeout_ms: u64,

    // ── Delayed locking ────────────────────────────────────────────────
    /// Delay between screen-off and the secure lock.
    pub lock_after_timeout_ms: u64,
    /// Device-policy ceiling on time-to-lock; 0 means no policy.
    pub max_time_to_lock_ms: u64,
    /// Display sleep timeout, subtracted from the policy ceiling.
    pub display_timeout_ms: u64,
    /// Use separate slide-screen delays.
    pub separate_slide_delay: bool,
    /// Slide delay after an inactivity timeout.
    pub slide_timeout_delay_ms: u64,
    /// Slide delay after the power button.
    pub slide_screenoff_delay_ms: u64,
    pub power_button_instantly_locks: bool,
    /// How long `set_keyguard_enabled(true)` waits for the first draw.
    pub done_drawing_timeout_ms: u64,

    // ── Policy ─────────────────────────────────────────────────────────
    /// A missing SIM forces the keyguard.
    pub require_sim: bool,
    /// Lock screen disabled by the user or profile.
    pub lock_screen_disabled: bool,
    /// Skip the informational screen when a pattern is set.
    pub lockscreen_disable_on_security: bool,
    pub lock_if_call_ends_with_screen_off: bool,
    pub allow_rotation: bool,

    // ── Unlock ─────────────────────────────────────────────────────────
    pub lockout: LockoutPolicy,
    pub quick_unlock: bool,
    /// Quick unlock checks entries strictly longer than this.
    pub quick_unlock_min_length: usize,

    // ── Status bar ─────────────────────────────────────────────────────
    pub show_secure_lock_icon: bool,
    /// Let the user expand the status bar over an insecure keyguard.
    pub insecure_status_bar_expand: bool,
}

impl Default for KeyguardConfig {
    fn default() -> Self {
        Self {
            awake_interval_ms: 10_000,
            awake_interval_keyboard_open_ms: 20_000,
            emergency_call_timeout_ms: 10_000,
            lock_after_timeout_ms: 5_000,
            max_time_to_lock_ms: 0,
            display_timeout_ms: 30_000,
            separate_slide_delay: false,
            slide_timeout_delay_ms: 5_000,
            slide_screenoff_delay_ms: 0,
            power_button_instantly_locks: true,
            done_drawing_timeout_ms: 2_000,
            require_sim: true,
            lock_screen_disabled: false,
            lockscreen_disable_on_security: false,
            lock_if_call_ends_with_screen_off: true,
            allow_rotation: false,
            lockout: LockoutPolicy::default(),
            quick_unlock: false,
            quick_unlock_min_length: 3,
            show_secure_lock_icon: false,
            insecure_status_bar_expand: true,
        }
    }
}

/// Upper bound for `done_drawing_timeout_ms`.
pub const MAX_DONE_DRAWING_TIMEOUT_MS: u64 = 60_000;

/// Quick unlock never fires at or below this length.
pub const QUICK_UNLOCK_FLOOR: usize = 3;

impl KeyguardConfig {
    pub fn awake_interval(&self, keyboard_open: bool) -> Duration {
        if keyboard_open {
            Duration::from_millis(self.awake_interval_keyboard_open_ms)
        } else {
            Duration::from_millis(self.awake_interval_ms)
        }
    }

    pub fn done_drawing_timeout(&self) -> Duration {
        Duration::from_millis(self.done_drawing_timeout_ms)
    }

    pub fn emergency_call_timeout(&self) -> Duration {
        Duration::from_millis(self.emergency_call_timeout_ms)
    }

    /// Delay before the secure lock engages after a delayed screen-off.
    pub fn security_delay(&self) -> Duration {
        let lock_after = self.lock_after_timeout_ms;
        let ms = if self.max_time_to_lock_ms > 0 {
            let policy = self
                .max_time_to_lock_ms
                .saturating_sub(self.display_timeout_ms);
            policy.min(lock_after)
        } else {
            lock_after
        };
        Duration::from_millis(ms)
    }

    /// Slide-screen delay for this screen-off reason, if separate slide
    /// delays are enabled.
    pub fn slide_delay(&self, why: ScreenOffReason) -> Option<Duration> {
        if !self.separate_slide_delay {
            return None;
        }
        let ms = match why {
            ScreenOffReason::Timeout => self.slide_timeout_delay_ms,
            _ => self.slide_screenoff_delay_ms,
        };
        Some(Duration::from_millis(ms))
    }

    /// Effective quick-unlock threshold, clamped to the floor.
    pub fn quick_unlock_threshold(&self) -> usize {
        self.quick_unlock_min_length.max(QUICK_UNLOCK_FLOOR)
    }

    pub fn validate(&self) -> KeyguardResult<()> {
        let lockout = &self.lockout;
        if lockout.failed_attempts_before_timeout == 0 {
            return Err(KeyguardError::ConfigError(
                "failedAttemptsBeforeTimeout must be at least 1".into(),
            ));
        }
        if lockout.failed_attempts_before_reset <= lockout.failed_attempts_before_timeout {
            return Err(KeyguardError::ConfigError(format!(
                "failedAttemptsBeforeReset ({}) must exceed failedAttemptsBeforeTimeout ({})",
                lockout.failed_attempts_before_reset, lockout.failed_attempts_before_timeout
            )));
        }
        if self.awake_interval_ms == 0 {
            return Err(KeyguardError::ConfigError(
                "awakeIntervalMs must be positive".into(),
            ));
        }
        if !(1..=MAX_DONE_DRAWING_TIMEOUT_MS).contains(&self.done_drawing_timeout_ms) {
            return Err(KeyguardError::ConfigError(format!(
                "doneDrawingTimeoutMs must be in 1..={}",
                MAX_DONE_DRAWING_TIMEOUT_MS
            )));
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    //  Persistence
    // ═══════════════════════════════════════════════════════════════════

    /// `<config_dir>/kgd/keyguard.json`, or `None` when the platform has no
    /// config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> KeyguardResult<Self> {
        if !path.exists() {
            log::info!("no keyguard config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|e| {
            KeyguardError::ConfigError(format!("read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> KeyguardResult<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                KeyguardError::ConfigError(format!("mkdir {}: {}", parent.display(), e))
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| {
            KeyguardError::ConfigError(format!("write {}: {}", path.display(), e))
        })?;
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
