//! The lock screen presenter.
//!
//! Owned by the mediator's task and only ever called from it. Every method
//! returns the [`PresenterSignal`]s the mediator has to act on instead of
//! calling back into it.

use std::sync::Arc;

use chrono::Utc;
use kgd_core::{
    CredentialStore, KeyCode, KeyguardConfig, PresenterMode, SimState, UnlockMethod,
};
use kgd_monitor::UpdateMonitorState;

use super::method::{self, MethodInputs, ModeInputs};
use super::screens::{HostStatus, KeyguardScreen, ScreenFactory, WindowHost};
use super::types::{AttemptOutcome, InputResult, KeyguardNotice, PresenterSignal, UserInput};

/// Patterns shorter than this are treated as accidental touches.
pub const MIN_PATTERN_REGISTER_FAIL: usize = 3;

/// Passwords of this length or shorter are not counted as failures.
pub const MIN_PASSWORD_LENGTH_BEFORE_REPORT: usize = 3;

pub struct PresenterDeps {
    pub monitor: UpdateMonitorState,
    pub credentials: Arc<dyn CredentialStore>,
    pub host: Box<dyn WindowHost>,
    pub screens: Box<dyn ScreenFactory>,
}

pub struct LockScreenPresenter {
    config: KeyguardConfig,
    monitor: UpdateMonitorState,
    credentials: Arc<dyn CredentialStore>,
    host: Box<dyn WindowHost>,
    screens: Box<dyn ScreenFactory>,

    attached: bool,
    screen_on: bool,
    mode: PresenterMode,
    /// Screen currently resumed, if any.
    resumed: Option<PresenterMode>,
    lock_screen: Option<Box<dyn KeyguardScreen>>,
    unlock_screen: Option<(UnlockMethod, Box<dyn KeyguardScreen>)>,

    verify_only: bool,
    forgot_pattern: bool,
    locked_but_not_secured: bool,
}

fn done(authenticated: bool) -> PresenterSignal {
    PresenterSignal::KeyguardDone { authenticated }
}

impl LockScreenPresenter {
    pub fn new(config: KeyguardConfig, deps: PresenterDeps) -> Self {
        Self {
            config,
            monitor: deps.monitor,
            credentials: deps.credentials,
            host: deps.host,
            screens: deps.screens,
            attached: false,
            screen_on: false,
            mode: PresenterMode::LockScreen,
            resumed: None,
            lock_screen: None,
            unlock_screen: None,
            verify_only: false,
            forgot_pattern: false,
            locked_but_not_secured: false,
        }
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn is_showing(&self) -> bool {
        self.attached
    }

    pub fn mode(&self) -> PresenterMode {
        self.mode
    }

    pub fn is_verify_only(&self) -> bool {
        self.verify_only
    }

    pub fn is_locked_but_not_secured(&self) -> bool {
        self.locked_but_not_secured
    }

    pub fn unlock_method(&self) -> UnlockMethod {
        method::select_unlock_method(&self.method_inputs())
    }

    /// A credential is needed to pass, ignoring the slide-screen grace
    /// period.
    pub fn requires_credential(&self) -> bool {
        let sim = self.monitor.sim_state();
        if sim == SimState::PermDisabled {
            return true;
        }
        match self.unlock_method() {
            UnlockMethod::Pattern => self.credentials.is_pattern_enabled(),
            UnlockMethod::Password => self.credentials.is_password_enabled(),
            UnlockMethod::SimPin => sim.is_secure(),
            UnlockMethod::Account => true,
            UnlockMethod::LockScreenOnly => false,
        }
    }

    pub fn is_secure(&self) -> bool {
        !self.locked_but_not_secured && self.requires_credential()
    }

    fn method_inputs(&self) -> MethodInputs {
        MethodInputs {
            sim_state: self.monitor.sim_state(),
            quality: self.credentials.password_quality(),
            pattern_enabled: self.credentials.is_pattern_enabled(),
            password_enabled: self.credentials.is_password_enabled(),
            forgot_pattern: self.forgot_pattern,
            permanently_locked: self.credentials.is_permanently_locked(),
        }
    }

    fn initial_mode(&self) -> PresenterMode {
        let facts = self.monitor.snapshot();
        method::initial_mode(&ModeInputs {
            sim_state: facts.sim_state,
            require_sim: self.config.require_sim,
            provisioned: facts.device_provisioned,
            locked_but_not_secured: self.locked_but_not_secured,
            disable_on_security: self.config.lockscreen_disable_on_security,
            secure: self.requires_credential(),
            method: self.unlock_method(),
        })
    }

    fn stuck_on_missing_sim(&self) -> bool {
        let facts = self.monitor.snapshot();
        method::stuck_on_missing_sim(facts.sim_state, self.config.require_sim, facts.device_provisioned)
    }

    // ── Lifecycle ──────────────────────────────────────────────────────

    pub fn show(&mut self) -> Vec<PresenterSignal> {
        self.host.set_rotation_allowed(self.config.allow_rotation);
        if self.attached {
            self.update_screen(self.mode);
            return vec![PresenterSignal::DoneDrawing];
        }

        self.attached = true;
        let status = self.host.attach();
        let mode = self.initial_mode();
        self.update_screen(mode);
        log::debug!("[presenter] shown in {:?} ({:?})", mode, self.unlock_method());

        match status {
            HostStatus::Drawn => vec![PresenterSignal::DoneDrawing],
            HostStatus::Pending => vec![],
        }
    }

    pub fn hide(&mut self) {
        if !self.attached {
            return;
        }
        self.pause_resumed();
        if let Some(mut screen) = self.lock_screen.take() {
            screen.clean_up();
        }
        if let Some((_, mut screen)) = self.unlock_screen.take() {
            screen.clean_up();
        }
        self.host.detach();
        self.attached = false;
        self.verify_only = false;
        self.forgot_pattern = false;
        log::debug!("[presenter] hidden");
    }

    pub fn reset(&mut self) {
        if !self.attached {
            return;
        }
        self.verify_only = false;
        self.forgot_pattern = false;
        let mode = self.initial_mode();
        self.update_screen(mode);
    }

    /// Show the unlock screen purely to confirm the user's identity.
    pub fn verify_unlock(&mut self) -> Vec<PresenterSignal> {
        let mut signals = self.show();
        if !self.is_secure() {
            signals.push(done(true));
        } else if self.unlock_method() != UnlockMethod::Pattern {
            // Only the pattern screen supports verify-only mode.
            signals.push(done(false));
        } else {
            self.verify_only = true;
            self.update_screen(PresenterMode::UnlockScreen);
        }
        signals
    }

    pub fn on_screen_turned_off(&mut self) {
        self.screen_on = false;
        self.pause_resumed();
    }

    pub fn on_screen_turned_on(&mut self) {
        self.screen_on = true;
        if self.attached {
            self.update_screen(self.mode);
        }
    }

    /// A wake key arrived while showing. Never blocks.
    pub fn wake_when_ready(&mut self, key: KeyCode) -> Vec<PresenterSignal> {
        if !self.attached {
            log::warn!("[presenter] wake_when_ready({:?}) with nothing shown", key);
            return vec![];
        }
        if key == KeyCode::Menu && self.is_secure() && self.mode == PresenterMode::LockScreen {
            self.update_screen(PresenterMode::UnlockScreen);
        }
        vec![PresenterSignal::PokeWakelock { hold: None }]
    }

    pub fn on_locked_but_not_secured(&mut self, locked_but_not_secured: bool) {
        if self.locked_but_not_secured == locked_but_not_secured {
            return;
        }
        self.locked_but_not_secured = locked_but_not_secured;
        if self.attached && locked_but_not_secured {
            self.update_screen(PresenterMode::LockScreen);
        }
    }

    // ── Screens ────────────────────────────────────────────────────────

    fn screen_mut(&mut self, mode: PresenterMode) -> Option<&mut Box<dyn KeyguardScreen>> {
        match mode {
            PresenterMode::LockScreen => self.lock_screen.as_mut(),
            PresenterMode::UnlockScreen => self.unlock_screen.as_mut().map(|(_, s)| s),
        }
    }

    fn pause_resumed(&mut self) {
        if let Some(mode) = self.resumed.take() {
            if let Some(screen) = self.screen_mut(mode) {
                screen.on_pause();
            }
        }
    }

    fn rebuild_unlock_screen(&mut self, method: UnlockMethod) {
        if let Some((_, mut old)) = self.unlock_screen.take() {
            if self.resumed == Some(PresenterMode::UnlockScreen) {
                old.on_pause();
                self.resumed = None;
            }
            old.clean_up();
        }
        let built = match self.screens.create_unlock_screen(method) {
            Ok(screen) => Some((method, screen)),
            Err(e) if method == UnlockMethod::Account => {
                log::warn!("[presenter] account unlock unavailable ({}), using pattern", e);
                self.screens
                    .create_unlock_screen(UnlockMethod::Pattern)
                    .map_err(|e| log::error!("[presenter] pattern screen failed: {}", e))
                    .ok()
                    .map(|screen| (UnlockMethod::Pattern, screen))
            }
            Err(e) => {
                log::error!("[presenter] cannot build {:?} screen: {}", method, e);
                None
            }
        };
        self.unlock_screen = built;
    }

    fn update_screen(&mut self, mode: PresenterMode) {
        match mode {
            PresenterMode::UnlockScreen => {
                let method = self.unlock_method();
                let stale = match &self.unlock_screen {
                    Some((current, _)) => *current != method,
                    None => true,
                };
                if stale {
                    self.rebuild_unlock_screen(method);
                }
            }
            PresenterMode::LockScreen => {
                if self.lock_screen.is_none() {
                    self.lock_screen = Some(self.screens.create_lock_screen());
                }
            }
        }
        self.mode = mode;

        if self.screen_on && self.attached && self.resumed != Some(mode) {
            self.pause_resumed();
            if let Some(screen) = self.screen_mut(mode) {
                screen.on_resume();
                self.resumed = Some(mode);
            }
        }

        if self.attached {
            let needs_input = self
                .screen_mut(mode)
                .map(|s| s.needs_input())
                .unwrap_or(false);
            self.host.set_needs_input(needs_input);
        }
    }

    // ── User input ─────────────────────────────────────────────────────

    pub fn handle_input(&mut self, input: UserInput) -> InputResult {
        if !self.attached {
            return InputResult::bare(AttemptOutcome::NotApplicable);
        }
        match input {
            UserInput::GoToUnlockScreen => self.go_to_unlock_screen(),
            UserInput::GoToLockScreen => self.go_to_lock_screen(),
            UserInput::ForgotPattern(forgotten) => self.forgot_pattern(forgotten),
            UserInput::EmergencyCall => InputResult::new(
                AttemptOutcome::Accepted,
                vec![PresenterSignal::PokeWakelock {
                    hold: Some(self.config.emergency_call_timeout()),
                }],
            ),
            UserInput::Pattern(cells) => self.attempt_pattern(&cells),
            UserInput::Password(text) => self.attempt_password(&text),
            UserInput::PasswordChanged(text) => self.quick_unlock(&text),
            UserInput::SimPin(pin) => self.attempt_sim(SimState::PinRequired, |c| {
                c.supply_sim_pin(&pin)
            }),
            UserInput::SimPuk { puk, new_pin } => {
                self.attempt_sim(SimState::PukRequired, |c| c.supply_sim_puk(&puk, &new_pin))
            }
            UserInput::AccountLogin { login, password } => {
                self.attempt_account(&login, &password)
            }
        }
    }

    fn go_to_unlock_screen(&mut self) -> InputResult {
        if self.stuck_on_missing_sim() {
            log::debug!("[presenter] no SIM, staying on lock screen");
            return InputResult::bare(AttemptOutcome::Ignored);
        }
        if !self.is_secure() {
            return InputResult::new(AttemptOutcome::Accepted, vec![done(true)]);
        }
        self.update_screen(PresenterMode::UnlockScreen);
        InputResult::bare(AttemptOutcome::Accepted)
    }

    fn go_to_lock_screen(&mut self) -> InputResult {
        self.forgot_pattern = false;
        if self.verify_only {
            self.verify_only = false;
            return InputResult::new(AttemptOutcome::Accepted, vec![done(false)]);
        }
        self.update_screen(PresenterMode::LockScreen);
        InputResult::bare(AttemptOutcome::Accepted)
    }

    fn forgot_pattern(&mut self, forgotten: bool) -> InputResult {
        if !self.credentials.has_fallback_account() {
            return InputResult::bare(AttemptOutcome::Ignored);
        }
        self.forgot_pattern = forgotten;
        self.update_screen(PresenterMode::UnlockScreen);
        InputResult::bare(AttemptOutcome::Accepted)
    }

    fn lockout_remaining(&self) -> Option<std::time::Duration> {
        let deadline = self.credentials.lockout_deadline()?;
        (deadline - Utc::now()).to_std().ok().filter(|d| !d.is_zero())
    }

    fn on_correct_unlock(&mut self) -> InputResult {
        self.monitor.clear_failed_attempts();
        self.credentials.set_lockout_deadline(None);
        self.verify_only = false;
        InputResult::new(AttemptOutcome::Accepted, vec![done(true)])
    }

    fn on_wrong_unlock(&mut self) -> InputResult {
        let failed = self.monitor.report_failed_attempt();
        let policy = self.config.lockout.clone();
        let pattern_like = self.unlock_method() == UnlockMethod::Pattern;
        let fallback = self.credentials.has_fallback_account();
        let mut signals = vec![PresenterSignal::PokeWakelock { hold: None }];

        if pattern_like && fallback && failed == policy.almost_at_reset() {
            signals.push(PresenterSignal::Notice(KeyguardNotice::AlmostAtAccountLogin {
                failed_attempts: failed,
                remaining_attempts: policy.failed_attempts_before_reset - failed,
            }));
        } else if pattern_like && fallback && failed >= policy.failed_attempts_before_reset {
            log::info!("[presenter] {} failures, switching to account login", failed);
            self.credentials.set_permanently_locked(true);
            signals.push(PresenterSignal::Notice(KeyguardNotice::PermanentlyLocked {
                failed_attempts: failed,
            }));
            self.update_screen(PresenterMode::UnlockScreen);
        }

        let every = policy.failed_attempts_before_timeout;
        if every > 0 && failed % every == 0 {
            let duration = policy.timeout();
            let deadline = chrono::Duration::from_std(duration)
                .ok()
                .map(|d| Utc::now() + d);
            self.credentials.set_lockout_deadline(deadline);
            signals.push(PresenterSignal::Notice(KeyguardNotice::TimedLockout {
                failed_attempts: failed,
                duration,
            }));
        }

        InputResult::new(AttemptOutcome::Rejected { failed_attempts: failed }, signals)
    }

    fn uncounted_rejection(&self) -> InputResult {
        InputResult::bare(AttemptOutcome::Rejected {
            failed_attempts: self.monitor.failed_attempts(),
        })
    }

    fn attempt_pattern(&mut self, cells: &[u8]) -> InputResult {
        if self.mode != PresenterMode::UnlockScreen || self.unlock_method() != UnlockMethod::Pattern {
            return InputResult::bare(AttemptOutcome::NotApplicable);
        }
        if let Some(remaining) = self.lockout_remaining() {
            return InputResult::bare(AttemptOutcome::LockedOut { remaining });
        }
        if self.credentials.check_pattern(cells) {
            return self.on_correct_unlock();
        }
        if cells.len() < MIN_PATTERN_REGISTER_FAIL {
            return self.uncounted_rejection();
        }
        self.on_wrong_unlock()
    }

    fn attempt_password(&mut self, text: &str) -> InputResult {
        if self.mode != PresenterMode::UnlockScreen || self.unlock_method() != UnlockMethod::Password {
            return InputResult::bare(AttemptOutcome::NotApplicable);
        }
        if let Some(remaining) = self.lockout_remaining() {
            return InputResult::bare(AttemptOutcome::LockedOut { remaining });
        }
        if self.credentials.check_password(text) {
            return self.on_correct_unlock();
        }
        if text.chars().count() <= MIN_PASSWORD_LENGTH_BEFORE_REPORT {
            return self.uncounted_rejection();
        }
        self.on_wrong_unlock()
    }

    /// Mismatches are never counted.
    fn quick_unlock(&mut self, text: &str) -> InputResult {
        if !self.config.quick_unlock
            || self.mode != PresenterMode::UnlockScreen
            || self.unlock_method() != UnlockMethod::Password
            || self.lockout_remaining().is_some()
        {
            return InputResult::bare(AttemptOutcome::Ignored);
        }
        if text.chars().count() > self.config.quick_unlock_threshold()
            && self.credentials.check_password(text)
        {
            return self.on_correct_unlock();
        }
        InputResult::bare(AttemptOutcome::Ignored)
    }

    fn attempt_sim<F>(&mut self, expected: SimState, supply: F) -> InputResult
    where
        F: FnOnce(&dyn CredentialStore) -> bool,
    {
        if self.unlock_method() != UnlockMethod::SimPin || self.monitor.sim_state() != expected {
            return InputResult::bare(AttemptOutcome::NotApplicable);
        }
        if !supply(self.credentials.as_ref()) {
            return InputResult::new(
                AttemptOutcome::Rejected { failed_attempts: self.monitor.failed_attempts() },
                vec![PresenterSignal::Notice(KeyguardNotice::SimUnlockFailed)],
            );
        }
        log::info!("[presenter] SIM unlocked");
        self.monitor.report_sim_pin_unlocked();
        let next = self.go_to_unlock_screen();
        InputResult::new(AttemptOutcome::Accepted, next.signals)
    }

    fn attempt_account(&mut self, login: &str, password: &str) -> InputResult {
        if self.unlock_method() != UnlockMethod::Account {
            return InputResult::bare(AttemptOutcome::NotApplicable);
        }
        if !self.credentials.check_fallback_account(login, password) {
            return self.uncounted_rejection();
        }
        self.credentials.set_permanently_locked(false);
        self.forgot_pattern = false;
        self.on_correct_unlock()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
