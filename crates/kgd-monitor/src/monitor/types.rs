use kgd_core::{BatteryStatus, PhoneCallState, RingerMode, SimState};
use serde::{Deserialize, Serialize};

/// Carrier strings as currently shown on the lock screen.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarrierText {
    pub plmn: Option<String>,
    pub spn: Option<String>,
}

/// Immutable snapshot of everything the keyguard knows about the device.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFacts {
    pub sim_state: SimState,
    pub battery: BatteryStatus,
    pub carrier: CarrierText,
    pub ringer_mode: RingerMode,
    pub phone_state: PhoneCallState,
    pub device_provisioned: bool,
    pub failed_unlock_attempts: u32,
}

/// Raw, broadcast-shaped input to the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    TimeTick,
    BatteryChanged(BatteryStatus),
    /// Telephony SIM broadcast: `state` plus optional `reason`.
    SimStateChanged {
        state: String,
        reason: Option<String>,
    },
    CarrierInfo {
        show_plmn: bool,
        plmn: Option<String>,
        show_spn: bool,
        spn: Option<String>,
    },
    RingerModeChanged(RingerMode),
    /// Telephony call-state string (`IDLE`, `RINGING`, `OFFHOOK`).
    PhoneStateChanged(String),
    DeviceProvisioned(bool),
}

/// Decoded fact change delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FactEvent {
    TimeChanged,
    BatteryChanged { status: BatteryStatus },
    CarrierTextChanged { carrier: CarrierText },
    RingerModeChanged { mode: RingerMode },
    PhoneStateChanged { state: PhoneCallState },
    DeviceProvisioned,
    SimStateChanged { state: SimState },
}

impl FactEvent {
    pub fn is_sim(&self) -> bool {
        matches!(self, Self::SimStateChanged { .. })
    }
}
