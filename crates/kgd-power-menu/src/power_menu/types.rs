use std::path::Path;

use kgd_core::{KeyguardError, KeyguardResult};
use serde::{Deserialize, Serialize};

/// One configurable power menu entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerMenuAction {
    PowerOff,
    /// Long press reboots into safe mode.
    Reboot,
    Screenshot,
    Airplane,
    Silent,
    BugReport,
    Profile,
}

impl PowerMenuAction {
    pub fn show_during_keyguard(self) -> bool {
        !matches!(self, Self::Profile)
    }

    pub fn show_before_provisioning(self) -> bool {
        matches!(self, Self::PowerOff | Self::Reboot | Self::Screenshot)
    }

    pub fn is_toggle(self) -> bool {
        matches!(self, Self::Airplane | Self::Silent)
    }
}

/// Two-state item state. The `Turning*` states mean a change was requested
/// and the system has not confirmed it yet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToggleState {
    #[default]
    Off,
    TurningOn,
    TurningOff,
    On,
}

impl ToggleState {
    pub fn in_transition(self) -> bool {
        matches!(self, Self::TurningOn | Self::TurningOff)
    }

    /// Whether the item should render as on.
    pub fn is_on(self) -> bool {
        matches!(self, Self::On | Self::TurningOn)
    }

    pub fn settled(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }
}

/// A visible menu row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub action: PowerMenuAction,
    /// `None` for single-press items.
    pub toggle: Option<ToggleState>,
    pub enabled: bool,
}

/// What `long_press` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongPressOutcome {
    Handled,
    /// The item has no long-press action; treat as a normal press.
    NotHandled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PowerMenuConfig {
    /// Entries in display order. Duplicates are dropped.
    pub entries: Vec<PowerMenuAction>,
    /// Prepend a bug report entry (owner only).
    pub bug_report_enabled: bool,
    /// Airplane mode state is driven by the radio when telephony exists.
    pub has_telephony: bool,
}

impl Default for PowerMenuConfig {
    fn default() -> Self {
        Self {
            entries: vec![
                PowerMenuAction::PowerOff,
                PowerMenuAction::Reboot,
                PowerMenuAction::Screenshot,
                PowerMenuAction::Airplane,
                PowerMenuAction::Silent,
            ],
            bug_report_enabled: false,
            has_telephony: true,
        }
    }
}

impl PowerMenuConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> KeyguardResult<Self> {
        if !path.exists() {
            log::info!("no power menu config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|e| {
            KeyguardError::ConfigError(format!("read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> KeyguardResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
