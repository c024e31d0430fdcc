//! Keyguard state machine.
//!
//! `(state, event, inputs) -> effects`, with no I/O of its own. Timers are
//! requested as effects and come back as events carrying the sequence
//! number they were scheduled with; a mismatch means the timer is stale and
//! the event is dropped.

use std::time::Duration;

use kgd_core::{
    KeyguardConfig, PhoneCallState, ScreenOffReason, SimState, StatusBarFlags, WakeLockKind,
};

use super::types::{
    Effect, Event, KeyguardState, LockStage, PresenterCommand, StatusSnapshot, VerifyTicket,
    WaiterId,
};

/// Facts the machine reads but does not own, sampled before every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inputs {
    pub provisioned: bool,
    pub sim_state: SimState,
    /// A credential is configured for the current unlock method.
    pub secure: bool,
    pub presenter_showing: bool,
    /// The wake-key hand-off lock is held.
    pub hand_off_held: bool,
}

pub struct KeyguardMachine {
    config: KeyguardConfig,

    system_ready: bool,
    showing: bool,
    hidden: bool,
    externally_enabled: bool,
    need_to_reshow_when_reenabled: bool,
    pending_verification: Option<VerifyTicket>,
    waiting_until_visible: bool,
    draw_waiters: Vec<WaiterId>,

    delayed_show_sequence: u64,
    wakelock_sequence: u64,

    screen_on: bool,
    keyboard_open: bool,
    phone_state: PhoneCallState,
    locked_but_not_secured: bool,
}

impl KeyguardMachine {
    pub fn new(config: KeyguardConfig, screen_on: bool) -> Self {
        Self {
            config,
            system_ready: false,
            showing: false,
            hidden: false,
            externally_enabled: true,
            need_to_reshow_when_reenabled: false,
            pending_verification: None,
            waiting_until_visible: false,
            draw_waiters: Vec::new(),
            delayed_show_sequence: 0,
            wakelock_sequence: 0,
            screen_on,
            keyboard_open: false,
            phone_state: PhoneCallState::Idle,
            locked_but_not_secured: false,
        }
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn is_showing(&self) -> bool {
        self.showing
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_externally_enabled(&self) -> bool {
        self.externally_enabled
    }

    pub fn needs_reshow(&self) -> bool {
        self.need_to_reshow_when_reenabled
    }

    pub fn pending_verification(&self) -> Option<VerifyTicket> {
        self.pending_verification
    }

    pub fn is_locked_but_not_secured(&self) -> bool {
        self.locked_but_not_secured
    }

    pub fn delayed_show_sequence(&self) -> u64 {
        self.delayed_show_sequence
    }

    pub fn state(&self, inputs: &Inputs) -> KeyguardState {
        if self.pending_verification.is_some() {
            KeyguardState::VerifyingExternal
        } else if !self.showing {
            KeyguardState::Hidden
        } else if inputs.secure && !self.locked_but_not_secured {
            KeyguardState::ShowingSecure
        } else {
            KeyguardState::ShowingInsecureSlide
        }
    }

    pub fn is_input_restricted(&self, inputs: &Inputs) -> bool {
        self.showing || self.need_to_reshow_when_reenabled || !inputs.provisioned
    }

    pub fn snapshot(&self, inputs: &Inputs) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state(inputs),
            showing: self.showing,
            hidden: self.hidden,
            secure: inputs.secure,
            input_restricted: self.is_input_restricted(inputs),
            externally_enabled: self.externally_enabled,
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    //  Transitions
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn handle(&mut self, event: Event, inputs: &Inputs) -> Vec<Effect> {
        let mut fx = Vec::new();
        match event {
            Event::SystemReady => {
                if self.system_ready {
                    log::debug!("[machine] system already ready");
                } else {
                    self.system_ready = true;
                    self.do_keyguard(inputs, &mut fx);
                }
            }
            Event::ScreenTurnedOff(why) => self.on_screen_turned_off(why, inputs, &mut fx),
            Event::ScreenTurnedOn => {
                self.screen_on = true;
                self.delayed_show_sequence += 1;
                fx.push(Effect::Present(PresenterCommand::ScreenTurnedOn));
            }
            Event::SetKeyguardEnabled { enabled, waiter } => {
                self.set_keyguard_enabled(enabled, waiter, inputs, &mut fx)
            }
            Event::VerifyUnlock(ticket) => self.verify_unlock(ticket, inputs, &mut fx),
            Event::SetHidden(hidden) => {
                if self.hidden != hidden {
                    self.hidden = hidden;
                    self.adjust_user_activity(&mut fx);
                    self.adjust_status_bar(inputs, &mut fx);
                }
            }
            Event::DoKeyguardTimeout => self.lock_now(inputs, &mut fx),
            Event::DelayedLock { sequence, stage } => {
                self.on_delayed_lock(sequence, stage, inputs, &mut fx)
            }
            Event::WakeLockTimeout { sequence } => {
                if sequence == self.wakelock_sequence {
                    fx.push(Effect::ReleaseWakeLock(WakeLockKind::Poke));
                }
            }
            Event::PokeWakelock(hold) => self.poke(hold, &mut fx),
            Event::WakeWhenReady(key) => {
                fx.push(Effect::Present(PresenterCommand::WakeWhenReady(key)));
            }
            Event::WakeHandled { poked } => {
                if !poked {
                    log::warn!("[machine] presenter did not poke after wake key, poking");
                    self.poke(None, &mut fx);
                }
                fx.push(Effect::ReleaseWakeLock(WakeLockKind::HandOff));
            }
            Event::KeyguardDone { authenticated, wakeup } => {
                self.keyguard_done(authenticated, wakeup, inputs, &mut fx)
            }
            Event::DoneDrawing => self.finish_waiting("drawn", &mut fx),
            Event::DrawTimeout => self.finish_waiting("draw timeout", &mut fx),
            Event::SimStateChanged(state) => self.on_sim_state_changed(state, inputs, &mut fx),
            Event::PhoneStateChanged(state) => {
                let previous = self.phone_state;
                self.phone_state = state;
                if state == PhoneCallState::Idle
                    && previous != PhoneCallState::Idle
                    && !self.screen_on
                    && self.externally_enabled
                    && self.config.lock_if_call_ends_with_screen_off
                {
                    log::debug!("[machine] call ended with screen off, locking");
                    self.lock_now(inputs, &mut fx);
                }
            }
            Event::DeviceProvisioned => fx.push(Effect::UserPresent),
            Event::KeyboardOpen(open) => self.keyboard_open = open,
        }
        fx
    }

    fn do_keyguard(&mut self, inputs: &Inputs, fx: &mut Vec<Effect>) {
        if !self.externally_enabled {
            log::debug!("[machine] keyguard disabled externally, not showing");
            return;
        }
        if self.showing || inputs.presenter_showing {
            log::debug!("[machine] already showing");
            return;
        }
        let locked_or_missing = inputs.sim_state.is_locked_or_missing(self.config.require_sim);
        if !locked_or_missing && !inputs.provisioned {
            log::debug!("[machine] not provisioned and SIM usable, not showing");
            return;
        }
        if self.config.lock_screen_disabled && !locked_or_missing {
            log::debug!("[machine] lock screen disabled, not showing");
            return;
        }
        self.show(inputs, fx);
    }

    /// Lock with no delay. Pending delayed locks become stale and a slide
    /// screen that is already up turns secure.
    fn lock_now(&mut self, inputs: &Inputs, fx: &mut Vec<Effect>) {
        self.delayed_show_sequence += 1;
        if self.showing && self.locked_but_not_secured {
            log::debug!("[machine] securing slide screen");
            self.set_locked_but_not_secured(false, fx);
            self.adjust_status_bar(inputs, fx);
            return;
        }
        self.do_keyguard(inputs, fx);
    }

    fn show(&mut self, inputs: &Inputs, fx: &mut Vec<Effect>) {
        fx.push(Effect::AcquireWakeLock(WakeLockKind::Show));
        if !self.system_ready {
            log::debug!("[machine] system not ready, ignoring show");
            fx.push(Effect::ReleaseWakeLock(WakeLockKind::Show));
            return;
        }
        self.showing = true;
        fx.push(Effect::LockScreenShown(!self.hidden));
        self.adjust_user_activity(fx);
        self.adjust_status_bar(inputs, fx);
        fx.push(Effect::CloseSystemDialogs);
        fx.push(Effect::Present(PresenterCommand::Show));
        fx.push(Effect::ReleaseWakeLock(WakeLockKind::Show));
    }

    fn hide(&mut self, inputs: &Inputs, fx: &mut Vec<Effect>) {
        if inputs.hand_off_held {
            log::warn!("[machine] wake key hand-off in flight, not hiding");
            return;
        }
        self.showing = false;
        fx.push(Effect::Present(PresenterCommand::Hide));
        if self.locked_but_not_secured {
            self.set_locked_but_not_secured(false, fx);
        }
        fx.push(Effect::LockScreenShown(false));
        self.adjust_user_activity(fx);
        self.adjust_status_bar(inputs, fx);
    }

    fn reset(&mut self, fx: &mut Vec<Effect>) {
        if self.showing {
            fx.push(Effect::Present(PresenterCommand::Reset));
        }
    }

    fn set_locked_but_not_secured(&mut self, value: bool, fx: &mut Vec<Effect>) {
        self.locked_but_not_secured = value;
        fx.push(Effect::Present(PresenterCommand::SetLockedButNotSecured(value)));
    }

    fn poke(&mut self, hold: Option<Duration>, fx: &mut Vec<Effect>) {
        let hold = hold.unwrap_or_else(|| self.config.awake_interval(self.keyboard_open));
        self.wakelock_sequence += 1;
        fx.push(Effect::AcquireWakeLock(WakeLockKind::Poke));
        fx.push(Effect::ScheduleWakeLockRelease {
            sequence: self.wakelock_sequence,
            after: hold,
        });
    }

    fn adjust_user_activity(&mut self, fx: &mut Vec<Effect>) {
        let enabled = !self.showing || self.hidden;
        fx.push(Effect::EnableUserActivity(enabled));
        if !enabled && self.screen_on {
            self.poke(None, fx);
        }
    }

    fn adjust_status_bar(&self, inputs: &Inputs, fx: &mut Vec<Effect>) {
        let secure = inputs.secure && !self.locked_but_not_secured;
        let flags = if self.showing {
            StatusBarFlags {
                disable_recent: true,
                disable_expand: secure || !self.config.insecure_status_bar_expand,
                disable_notification_ticker: secure,
                secure_lock_icon: secure && self.config.show_secure_lock_icon,
            }
        } else {
            StatusBarFlags::default()
        };
        fx.push(Effect::StatusBar(flags));
    }

    // ── Screen power ───────────────────────────────────────────────────

    fn on_screen_turned_off(&mut self, why: ScreenOffReason, inputs: &Inputs, fx: &mut Vec<Effect>) {
        self.screen_on = false;
        fx.push(Effect::Present(PresenterCommand::ScreenTurnedOff));

        let lock_immediately = if inputs.secure {
            self.config.power_button_instantly_locks
        } else {
            !self.config.separate_slide_delay && self.config.power_button_instantly_locks
        };

        if let Some(ticket) = self.pending_verification.take() {
            log::debug!("[machine] screen off cancels verification {}", ticket);
            fx.push(Effect::CompleteVerification { ticket, authenticated: false });
            if !self.externally_enabled {
                self.hide(inputs, fx);
            }
        } else if self.showing {
            self.reset(fx);
            if self.locked_but_not_secured {
                // Screen came on during the grace period; restart it.
                self.delayed_show_sequence += 1;
                fx.push(Effect::ScheduleDelayedLock {
                    sequence: self.delayed_show_sequence,
                    stage: LockStage::Escalate,
                    after: self.config.security_delay(),
                });
            }
        } else if why == ScreenOffReason::Timeout
            || (why == ScreenOffReason::User && !lock_immediately)
        {
            self.do_keyguard_later(why, inputs, fx);
        } else if why == ScreenOffReason::ProximitySensor {
            // Proximity blanking during a call never locks.
        } else {
            self.lock_now(inputs, fx);
        }
    }

    fn do_keyguard_later(&mut self, why: ScreenOffReason, inputs: &Inputs, fx: &mut Vec<Effect>) {
        let security = self.config.security_delay();
        let slide = self.config.slide_delay(why);
        let sequence = self.delayed_show_sequence;

        match slide {
            Some(slide) if inputs.secure && slide < security => {
                if slide.is_zero() {
                    self.show_slide(inputs, fx);
                } else {
                    fx.push(Effect::ScheduleDelayedLock {
                        sequence,
                        stage: LockStage::Slide,
                        after: slide,
                    });
                }
                fx.push(Effect::ScheduleDelayedLock {
                    sequence,
                    stage: LockStage::Escalate,
                    after: security,
                });
            }
            Some(slide) if !inputs.secure => self.lock_after(slide, sequence, inputs, fx),
            _ => self.lock_after(security, sequence, inputs, fx),
        }
    }

    fn lock_after(&mut self, delay: Duration, sequence: u64, inputs: &Inputs, fx: &mut Vec<Effect>) {
        if delay.is_zero() {
            self.lock_now(inputs, fx);
        } else {
            fx.push(Effect::ScheduleDelayedLock { sequence, stage: LockStage::Lock, after: delay });
        }
    }

    fn show_slide(&mut self, inputs: &Inputs, fx: &mut Vec<Effect>) {
        self.set_locked_but_not_secured(true, fx);
        self.do_keyguard(inputs, fx);
        if !self.showing {
            self.set_locked_but_not_secured(false, fx);
        }
    }

    fn on_delayed_lock(&mut self, sequence: u64, stage: LockStage, inputs: &Inputs, fx: &mut Vec<Effect>) {
        if sequence != self.delayed_show_sequence {
            log::debug!(
                "[machine] stale {:?} timer ({} != {})",
                stage,
                sequence,
                self.delayed_show_sequence
            );
            return;
        }
        match stage {
            LockStage::Lock => self.do_keyguard(inputs, fx),
            LockStage::Slide => self.show_slide(inputs, fx),
            LockStage::Escalate => {
                if self.showing && self.locked_but_not_secured {
                    self.set_locked_but_not_secured(false, fx);
                    self.adjust_status_bar(inputs, fx);
                }
            }
        }
    }

    // ── External requests ──────────────────────────────────────────────

    fn set_keyguard_enabled(
        &mut self,
        enabled: bool,
        waiter: Option<WaiterId>,
        inputs: &Inputs,
        fx: &mut Vec<Effect>,
    ) {
        self.externally_enabled = enabled;

        if !enabled && self.showing {
            if self.pending_verification.is_some() {
                log::debug!("[machine] verification in progress, ignoring disable");
            } else {
                self.need_to_reshow_when_reenabled = true;
                self.hide(inputs, fx);
            }
        } else if enabled && self.need_to_reshow_when_reenabled {
            self.need_to_reshow_when_reenabled = false;
            if let Some(ticket) = self.pending_verification.take() {
                fx.push(Effect::CompleteVerification { ticket, authenticated: false });
                self.reset(fx);
            } else {
                self.show(inputs, fx);
                self.waiting_until_visible = true;
                fx.push(Effect::ScheduleDrawTimeout(self.config.done_drawing_timeout()));
                if let Some(waiter) = waiter {
                    self.draw_waiters.push(waiter);
                }
                return;
            }
        }

        if let Some(waiter) = waiter {
            fx.push(Effect::CompleteWaiter(waiter));
        }
    }

    fn finish_waiting(&mut self, why: &str, fx: &mut Vec<Effect>) {
        if !self.waiting_until_visible {
            return;
        }
        log::debug!("[machine] keyguard visible ({})", why);
        self.waiting_until_visible = false;
        for waiter in self.draw_waiters.drain(..) {
            fx.push(Effect::CompleteWaiter(waiter));
        }
    }

    fn verify_unlock(&mut self, ticket: VerifyTicket, inputs: &Inputs, fx: &mut Vec<Effect>) {
        if !inputs.provisioned {
            log::debug!("[machine] verify_unlock before provisioning");
            fx.push(Effect::CompleteVerification { ticket, authenticated: false });
        } else if self.externally_enabled {
            log::warn!("[machine] verify_unlock while the keyguard is enabled");
            fx.push(Effect::CompleteVerification { ticket, authenticated: false });
        } else if self.pending_verification.is_some() {
            log::debug!("[machine] verification already pending");
            fx.push(Effect::CompleteVerification { ticket, authenticated: false });
        } else {
            self.pending_verification = Some(ticket);
            self.showing = true;
            fx.push(Effect::LockScreenShown(true));
            fx.push(Effect::Present(PresenterCommand::VerifyUnlock));
        }
    }

    fn keyguard_done(&mut self, authenticated: bool, wakeup: bool, inputs: &Inputs, fx: &mut Vec<Effect>) {
        if authenticated {
            fx.push(Effect::ClearFailedAttempts);
            self.delayed_show_sequence += 1;
        }
        if let Some(ticket) = self.pending_verification.take() {
            fx.push(Effect::CompleteVerification { ticket, authenticated });
            if authenticated {
                // The verifying app is done with its override.
                self.externally_enabled = true;
                self.need_to_reshow_when_reenabled = false;
            }
        }

        self.hide(inputs, fx);
        if wakeup {
            fx.push(Effect::UserActivity);
        }
        fx.push(Effect::ReleaseWakeLock(WakeLockKind::Poke));
        if authenticated {
            fx.push(Effect::UserPresent);
        }
    }

    // ── Telephony ──────────────────────────────────────────────────────

    fn on_sim_state_changed(&mut self, state: SimState, inputs: &Inputs, fx: &mut Vec<Effect>) {
        match state {
            SimState::Absent => {
                // Only a device that never finished setup is forced to lock
                // on a missing card.
                if !inputs.provisioned {
                    self.show_or_reset(inputs, fx);
                }
            }
            SimState::PinRequired | SimState::PukRequired | SimState::PermDisabled => {
                self.show_or_reset(inputs, fx);
            }
            SimState::Ready => self.reset(fx),
            SimState::NetworkLocked | SimState::Unknown => {}
        }
    }

    fn show_or_reset(&mut self, inputs: &Inputs, fx: &mut Vec<Effect>) {
        if self.showing {
            self.reset(fx);
        } else {
            self.do_keyguard(inputs, fx);
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
