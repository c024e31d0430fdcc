//! Host surface and screen contracts, with headless implementations.

use std::sync::{Arc, Mutex, MutexGuard};

use kgd_core::{KeyguardError, KeyguardResult, UnlockMethod};

/// Result of attaching the keyguard surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    /// Drawn synchronously.
    Drawn,
    /// The host will report the first draw later.
    Pending,
}

/// The window that hosts the keyguard screens.
pub trait WindowHost: Send {
    fn attach(&mut self) -> HostStatus;
    fn detach(&mut self);
    fn set_needs_input(&mut self, needs_input: bool);
    fn set_rotation_allowed(&mut self, allowed: bool);
}

/// One of the two screens the presenter swaps between.
pub trait KeyguardScreen: Send {
    fn on_pause(&mut self);
    fn on_resume(&mut self);
    /// Release everything; the screen is never used again.
    fn clean_up(&mut self);
    /// Whether the screen takes text input (soft keyboard).
    fn needs_input(&self) -> bool {
        false
    }
}

pub trait ScreenFactory: Send {
    fn create_lock_screen(&mut self) -> Box<dyn KeyguardScreen>;
    fn create_unlock_screen(
        &mut self,
        method: UnlockMethod,
    ) -> KeyguardResult<Box<dyn KeyguardScreen>>;
}

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ═══════════════════════════════════════════════════════════════════════
//  Headless host
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HostRecord {
    pub attached: bool,
    pub attach_count: u32,
    pub needs_input: bool,
    pub rotation_allowed: bool,
}

/// Shared view into a [`HeadlessHost`] after it has been handed off.
#[derive(Debug, Clone, Default)]
pub struct HostProbe {
    inner: Arc<Mutex<HostRecord>>,
}

impl HostProbe {
    pub fn record(&self) -> HostRecord {
        guard(&self.inner).clone()
    }
}

#[derive(Debug)]
pub struct HeadlessHost {
    draws_on_attach: bool,
    probe: HostProbe,
}

impl HeadlessHost {
    /// A host that reports every attach as drawn.
    pub fn new() -> Self {
        Self { draws_on_attach: true, probe: HostProbe::default() }
    }

    /// A host whose first draw has to be reported separately.
    pub fn deferred_draw() -> Self {
        Self { draws_on_attach: false, probe: HostProbe::default() }
    }

    pub fn probe(&self) -> HostProbe {
        self.probe.clone()
    }
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowHost for HeadlessHost {
    fn attach(&mut self) -> HostStatus {
        let mut record = guard(&self.probe.inner);
        record.attached = true;
        record.attach_count += 1;
        if self.draws_on_attach {
            HostStatus::Drawn
        } else {
            HostStatus::Pending
        }
    }

    fn detach(&mut self) {
        guard(&self.probe.inner).attached = false;
    }

    fn set_needs_input(&mut self, needs_input: bool) {
        guard(&self.probe.inner).needs_input = needs_input;
    }

    fn set_rotation_allowed(&mut self, allowed: bool) {
        guard(&self.probe.inner).rotation_allowed = allowed;
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Headless screens
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenKind {
    Lock,
    Unlock(UnlockMethod),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenEvent {
    Created(ScreenKind),
    Resumed(ScreenKind),
    Paused(ScreenKind),
    CleanedUp(ScreenKind),
}

#[derive(Debug, Clone, Default)]
pub struct ScreenProbe {
    events: Arc<Mutex<Vec<ScreenEvent>>>,
}

impl ScreenProbe {
    pub fn events(&self) -> Vec<ScreenEvent> {
        guard(&self.events).clone()
    }

    pub fn clear(&self) {
        guard(&self.events).clear();
    }

    fn push(&self, event: ScreenEvent) {
        guard(&self.events).push(event);
    }
}

struct HeadlessScreen {
    kind: ScreenKind,
    probe: ScreenProbe,
}

impl KeyguardScreen for HeadlessScreen {
    fn on_pause(&mut self) {
        self.probe.push(ScreenEvent::Paused(self.kind));
    }

    fn on_resume(&mut self) {
        self.probe.push(ScreenEvent::Resumed(self.kind));
    }

    fn clean_up(&mut self) {
        self.probe.push(ScreenEvent::CleanedUp(self.kind));
    }

    fn needs_input(&self) -> bool {
        matches!(
            self.kind,
            ScreenKind::Unlock(UnlockMethod::Password)
                | ScreenKind::Unlock(UnlockMethod::SimPin)
                | ScreenKind::Unlock(UnlockMethod::Account)
        )
    }
}

/// Screen factory that records screen lifecycle events.
#[derive(Debug)]
pub struct HeadlessScreens {
    probe: ScreenProbe,
    account_available: bool,
}

impl HeadlessScreens {
    pub fn new() -> Self {
        Self { probe: ScreenProbe::default(), account_available: true }
    }

    /// Account login screens fail to build, as on a device without an
    /// account manager.
    pub fn without_account_screen() -> Self {
        Self { probe: ScreenProbe::default(), account_available: false }
    }

    pub fn probe(&self) -> ScreenProbe {
        self.probe.clone()
    }

    fn build(&self, kind: ScreenKind) -> Box<dyn KeyguardScreen> {
        self.probe.push(ScreenEvent::Created(kind));
        Box::new(HeadlessScreen { kind, probe: self.probe.clone() })
    }
}

impl Default for HeadlessScreens {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenFactory for HeadlessScreens {
    fn create_lock_screen(&mut self) -> Box<dyn KeyguardScreen> {
        self.build(ScreenKind::Lock)
    }

    fn create_unlock_screen(
        &mut self,
        method: UnlockMethod,
    ) -> KeyguardResult<Box<dyn KeyguardScreen>> {
        if method == UnlockMethod::Account && !self.account_available {
            return Err(KeyguardError::CollaboratorUnavailable(
                "account unlock screen".into(),
            ));
        }
        Ok(self.build(ScreenKind::Unlock(method)))
    }
}
