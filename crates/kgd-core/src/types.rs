// kgd-core – Shared fact and policy types

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════
//  Telephony facts
// ═══════════════════════════════════════════════════════════════════════

/// Decoded SIM card state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SimState {
    #[default]
    Unknown,
    Absent,
    PinRequired,
    PukRequired,
    NetworkLocked,
    Ready,
    /// Card present but permanently disabled by the carrier.
    PermDisabled,
}

impl SimState {
    /// PIN or PUK entry is needed before the card is usable.
    pub fn is_pin_locked(self) -> bool {
        matches!(self, Self::PinRequired | Self::PukRequired)
    }

    /// The card state alone makes the device secure.
    pub fn is_secure(self) -> bool {
        matches!(
            self,
            Self::PinRequired | Self::PukRequired | Self::PermDisabled
        )
    }

    /// Locked, or missing on a device that requires a SIM.
    pub fn is_locked_or_missing(self, require_sim: bool) -> bool {
        self.is_pin_locked()
            || ((self == Self::Absent || self == Self::PermDisabled) && require_sim)
    }
}

/// Call state reported by telephony.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PhoneCallState {
    #[default]
    Idle,
    Ringing,
    OffHook,
}

impl PhoneCallState {
    /// Decode the telephony broadcast string. Unrecognised values yield `None`.
    pub fn from_broadcast(value: &str) -> Option<Self> {
        match value {
            "IDLE" => Some(Self::Idle),
            "RINGING" => Some(Self::Ringing),
            "OFFHOOK" => Some(Self::OffHook),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum RingerMode {
    Silent,
    Vibrate,
    #[default]
    Normal,
}

// ═══════════════════════════════════════════════════════════════════════
//  Battery
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PlugType {
    #[default]
    Unplugged,
    Ac,
    Usb,
    Wireless,
}

impl PlugType {
    pub fn is_plugged(self) -> bool {
        self != Self::Unplugged
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ChargeStatus {
    #[default]
    Unknown,
    Charging,
    Discharging,
    NotCharging,
    Full,
}

/// Last known battery reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryStatus {
    /// Charge level, 0–100.
    pub level: u8,
    pub plugged: PlugType,
    pub status: ChargeStatus,
}

impl Default for BatteryStatus {
    fn default() -> Self {
        Self {
            level: 100,
            plugged: PlugType::Unplugged,
            status: ChargeStatus::Unknown,
        }
    }
}

impl BatteryStatus {
    /// Level below which the lock screen always shows the battery line.
    pub const LOW_LEVEL: u8 = 20;

    pub fn is_plugged_in(&self) -> bool {
        self.plugged.is_plugged()
    }

    pub fn is_low(&self) -> bool {
        self.level < Self::LOW_LEVEL
    }

    /// Whether moving from `self` to `next` is worth telling observers.
    pub fn is_interesting_change(&self, next: &BatteryStatus) -> bool {
        if self.is_plugged_in() != next.is_plugged_in() {
            return true;
        }
        if next.is_plugged_in() && self.status != next.status {
            return true;
        }
        self.level != next.level
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Credentials & unlock method
// ═══════════════════════════════════════════════════════════════════════

/// Stored credential quality, as chosen by the user or mandated by policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PasswordQuality {
    #[default]
    Unspecified,
    Something,
    Finger,
    Numeric,
    Alphabetic,
    Alphanumeric,
}

/// The credential challenge currently presented on the unlock screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnlockMethod {
    Pattern,
    Password,
    SimPin,
    Account,
    LockScreenOnly,
}

/// Which of the two presenter screens is in front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PresenterMode {
    LockScreen,
    UnlockScreen,
}

// ═══════════════════════════════════════════════════════════════════════
//  Input & power
// ═══════════════════════════════════════════════════════════════════════

/// Hardware key codes the keyguard distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyCode {
    /// Also used for non-key wake sources such as motion.
    Unknown,
    Menu,
    Power,
    Home,
    Back,
    VolumeUp,
    VolumeDown,
    VolumeMute,
    Mute,
    HeadsetHook,
    MediaPlay,
    MediaPause,
    MediaPlayPause,
    MediaStop,
    MediaNext,
    MediaPrevious,
    MediaRewind,
    MediaFastForward,
    Camera,
    Focus,
    Other(u32),
}

impl KeyCode {
    /// Keys that wake the device when pressed on a showing keyguard.
    ///
    /// Volume keys only count while docked; media and camera keys never do.
    pub fn wakes_keyguard(self, docked: bool) -> bool {
        match self {
            Self::VolumeUp | Self::VolumeDown => docked,
            Self::VolumeMute
            | Self::Mute
            | Self::HeadsetHook
            | Self::MediaPlay
            | Self::MediaPause
            | Self::MediaPlayPause
            | Self::MediaStop
            | Self::MediaNext
            | Self::MediaPrevious
            | Self::MediaRewind
            | Self::MediaFastForward
            | Self::Camera
            | Self::Focus => false,
            _ => true,
        }
    }
}

/// Why the screen went off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScreenOffReason {
    /// Power button.
    User,
    /// Inactivity timeout.
    Timeout,
    /// Proximity sensor during a call.
    ProximitySensor,
}

/// The three wake locks owned by the mediator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WakeLockKind {
    /// Full wake lock that also turns the screen on; released after the
    /// awake interval.
    Poke,
    /// Partial lock held while the keyguard is being shown.
    Show,
    /// Partial lock held between a wake-key decision and the presenter's
    /// response.
    HandOff,
}

/// Status bar features disabled while the keyguard is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatusBarFlags {
    pub disable_recent: bool,
    pub disable_expand: bool,
    pub disable_notification_ticker: bool,
    pub secure_lock_icon: bool,
}

// ── Tests ───────────────────────────────────────────────────────────────
