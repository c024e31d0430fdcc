//! Decoding of telephony broadcast payloads.

use kgd_core::SimState;

use super::types::CarrierText;

/// PLMN shown when the carrier asks for one but the radio has none.
pub const DEFAULT_PLMN: &str = "No service";

/// Map the SIM broadcast `state`/`reason` strings to a [`SimState`].
///
/// Anything unrecognised decodes to [`SimState::Unknown`].
pub fn decode_sim_state(state: &str, reason: Option<&str>) -> SimState {
    match state {
        "ABSENT" => match reason {
            Some("PERM_DISABLED") => SimState::PermDisabled,
            _ => SimState::Absent,
        },
        "READY" | "LOADED" | "IMSI" => SimState::Ready,
        "LOCKED" => match reason {
            Some("PIN") => SimState::PinRequired,
            Some("PUK") => SimState::PukRequired,
            _ => SimState::Unknown,
        },
        "NETWORK" => SimState::NetworkLocked,
        _ => SimState::Unknown,
    }
}

pub fn decode_carrier(
    show_plmn: bool,
    plmn: Option<String>,
    show_spn: bool,
    spn: Option<String>,
) -> CarrierText {
    let plmn = if show_plmn {
        Some(plmn.unwrap_or_else(|| DEFAULT_PLMN.to_string()))
    } else {
        None
    };
    let spn = if show_spn { spn } else { None };
    CarrierText { plmn, spn }
}
