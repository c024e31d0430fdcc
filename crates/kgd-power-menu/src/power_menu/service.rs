use std::sync::Arc;

use kgd_core::{KeyguardError, KeyguardResult, LockStatus, RingerMode};

use super::actions::PowerMenuHandler;
use super::types::{LongPressOutcome, MenuItem, PowerMenuAction, PowerMenuConfig, ToggleState};

pub struct PowerMenu {
    config: PowerMenuConfig,
    handler: Arc<dyn PowerMenuHandler>,
    items: Vec<PowerMenuAction>,

    airplane: ToggleState,
    silent: ToggleState,

    showing: bool,
    keyguard_showing: bool,
    provisioned: bool,
    /// Airplane mode was pressed during emergency callback mode; turn it on
    /// once that mode ends.
    waiting_for_ecm_exit: bool,
}

impl PowerMenu {
    pub fn new(config: PowerMenuConfig, handler: Arc<dyn PowerMenuHandler>) -> Self {
        let mut items = Vec::new();
        if config.bug_report_enabled {
            items.push(PowerMenuAction::BugReport);
        }
        for action in &config.entries {
            if items.contains(action) {
                log::warn!("[power-menu] duplicate entry {:?} dropped", action);
                continue;
            }
            items.push(*action);
        }
        Self {
            config,
            handler,
            items,
            airplane: ToggleState::Off,
            silent: ToggleState::Off,
            showing: false,
            keyguard_showing: false,
            provisioned: false,
            waiting_for_ecm_exit: false,
        }
    }

    pub fn is_showing(&self) -> bool {
        self.showing
    }

    /// Open the menu. Lock and provisioning state are captured here and
    /// hold until the next `show`.
    pub fn show(&mut self, lock: &dyn LockStatus, provisioned: bool) {
        self.keyguard_showing = lock.is_showing();
        self.provisioned = provisioned;
        self.silent = ToggleState::settled(self.handler.ringer_mode() != RingerMode::Normal);
        if !self.config.has_telephony {
            // With a radio the service state callbacks own this.
            self.airplane = ToggleState::settled(self.handler.is_airplane_mode_on());
        }
        self.showing = true;
        log::debug!(
            "[power-menu] shown (keyguard={}, provisioned={}, {} visible)",
            self.keyguard_showing,
            self.provisioned,
            self.visible_actions().count()
        );
    }

    pub fn dismiss(&mut self) {
        self.showing = false;
    }

    fn is_visible(&self, action: PowerMenuAction) -> bool {
        if self.keyguard_showing && !action.show_during_keyguard() {
            return false;
        }
        if !self.provisioned && !action.show_before_provisioning() {
            return false;
        }
        true
    }

    fn visible_actions(&self) -> impl Iterator<Item = PowerMenuAction> + '_ {
        self.items.iter().copied().filter(move |a| self.is_visible(*a))
    }

    pub fn toggle_state(&self, action: PowerMenuAction) -> Option<ToggleState> {
        match action {
            PowerMenuAction::Airplane => Some(self.airplane),
            PowerMenuAction::Silent => Some(self.silent),
            _ => None,
        }
    }

    pub fn visible_items(&self) -> Vec<MenuItem> {
        self.visible_actions()
            .map(|action| {
                let toggle = self.toggle_state(action);
                MenuItem {
                    action,
                    toggle,
                    enabled: !toggle.map(ToggleState::in_transition).unwrap_or(false),
                }
            })
            .collect()
    }

    fn item_at(&self, position: usize) -> KeyguardResult<PowerMenuAction> {
        if !self.showing {
            return Err(KeyguardError::InvalidState("power menu is not showing".into()));
        }
        self.visible_actions().nth(position).ok_or_else(|| {
            KeyguardError::Misuse(format!("no visible power menu item at {}", position))
        })
    }

    // ═══════════════════════════════════════════════════════════════════
    //  Presses
    // ═══════════════════════════════════════════════════════════════════

    /// Run the item at `position` among the visible items and close the
    /// menu. Returns `false` when a toggle was mid-transition and the press
    /// was ignored.
    pub fn press(&mut self, position: usize) -> KeyguardResult<bool> {
        let action = self.item_at(position)?;
        self.showing = false;
        log::info!("[power-menu] press {:?}", action);
        match action {
            PowerMenuAction::PowerOff => self.handler.shutdown(),
            PowerMenuAction::Reboot => self.handler.reboot(),
            PowerMenuAction::Screenshot => self.handler.take_screenshot(),
            PowerMenuAction::BugReport => self.handler.request_bug_report(),
            PowerMenuAction::Profile => self.handler.choose_profile(),
            PowerMenuAction::Airplane => return Ok(self.press_airplane()),
            PowerMenuAction::Silent => return Ok(self.press_silent()),
        }
        Ok(true)
    }

    pub fn long_press(&mut self, position: usize) -> KeyguardResult<LongPressOutcome> {
        let action = self.item_at(position)?;
        match action {
            PowerMenuAction::Reboot => {
                self.showing = false;
                log::info!("[power-menu] reboot to safe mode");
                self.handler.reboot_safe_mode();
                Ok(LongPressOutcome::Handled)
            }
            // Swallowed so a long press does not also open the chooser.
            PowerMenuAction::Profile => Ok(LongPressOutcome::Handled),
            _ => Ok(LongPressOutcome::NotHandled),
        }
    }

    fn press_airplane(&mut self) -> bool {
        if self.airplane.in_transition() {
            log::warn!("[power-menu] airplane mode in transition, ignoring");
            return false;
        }
        let now_on = self.airplane != ToggleState::On;
        let in_ecm = self.handler.is_in_emergency_callback_mode();

        if self.config.has_telephony && in_ecm {
            self.waiting_for_ecm_exit = true;
            self.handler.show_emergency_callback_exit();
        } else {
            self.set_airplane_mode(now_on);
        }

        if self.config.has_telephony && !in_ecm {
            self.airplane = if now_on {
                ToggleState::TurningOn
            } else {
                ToggleState::TurningOff
            };
        }
        true
    }

    fn set_airplane_mode(&mut self, on: bool) {
        self.handler.set_airplane_mode(on);
        if !self.config.has_telephony {
            self.airplane = ToggleState::settled(on);
        }
    }

    fn press_silent(&mut self) -> bool {
        if self.silent.in_transition() {
            log::warn!("[power-menu] silent mode in transition, ignoring");
            return false;
        }
        let now_on = self.silent != ToggleState::On;
        self.handler.set_ringer_mode(if now_on { RingerMode::Silent } else { RingerMode::Normal });
        self.silent = ToggleState::settled(now_on);
        true
    }

    // ── System callbacks ───────────────────────────────────────────────

    /// The radio (or the setting, without telephony) settled.
    pub fn on_airplane_mode_changed(&mut self, on: bool) {
        self.airplane = ToggleState::settled(on);
    }

    pub fn on_ringer_mode_changed(&mut self, mode: RingerMode) {
        self.silent = ToggleState::settled(mode != RingerMode::Normal);
    }

    pub fn on_emergency_callback_mode_changed(&mut self, in_ecm: bool) {
        if !in_ecm && self.waiting_for_ecm_exit {
            self.waiting_for_ecm_exit = false;
            log::info!("[power-menu] emergency callback mode ended, enabling airplane mode");
            self.set_airplane_mode(true);
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
