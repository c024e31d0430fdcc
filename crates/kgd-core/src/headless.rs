//! Headless collaborator implementations.
//!
//! Used when the keyguard runs without a real power manager, status bar or
//! telephony stack, and by the test suites to observe what the mediator did.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::ports::{CredentialStore, PowerControl, StatusBar, SystemNotifier};
use crate::types::{PasswordQuality, StatusBarFlags, WakeLockKind};

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn digest(input: &[u8]) -> String {
    hex::encode(Sha256::digest(input))
}

// ═══════════════════════════════════════════════════════════════════════
//  Power
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct PowerInner {
    held: HashSet<WakeLockKind>,
    acquisitions: Vec<WakeLockKind>,
    user_activity_enabled: Option<bool>,
    user_activity_reports: u32,
}

/// Tracks wake locks and user-activity policy in memory.
#[derive(Debug, Default)]
pub struct HeadlessPower {
    inner: Mutex<PowerInner>,
}

impl HeadlessPower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, kind: WakeLockKind) -> bool {
        guard(&self.inner).held.contains(&kind)
    }

    /// Every acquire call, in order.
    pub fn acquisitions(&self) -> Vec<WakeLockKind> {
        guard(&self.inner).acquisitions.clone()
    }

    pub fn user_activity_enabled(&self) -> Option<bool> {
        guard(&self.inner).user_activity_enabled
    }

    pub fn user_activity_reports(&self) -> u32 {
        guard(&self.inner).user_activity_reports
    }
}

impl PowerControl for HeadlessPower {
    fn acquire_wake_lock(&self, kind: WakeLockKind) {
        let mut inner = guard(&self.inner);
        inner.held.insert(kind);
        inner.acquisitions.push(kind);
    }

    fn release_wake_lock(&self, kind: WakeLockKind) {
        guard(&self.inner).held.remove(&kind);
    }

    fn enable_user_activity(&self, enabled: bool) {
        guard(&self.inner).user_activity_enabled = Some(enabled);
    }

    fn user_activity(&self) {
        guard(&self.inner).user_activity_reports += 1;
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Status bar & notifications
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct HeadlessStatusBar {
    last: Mutex<Option<StatusBarFlags>>,
}

impl HeadlessStatusBar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_flags(&self) -> Option<StatusBarFlags> {
        *guard(&self.last)
    }
}

impl StatusBar for HeadlessStatusBar {
    fn disable(&self, flags: StatusBarFlags) {
        *guard(&self.last) = Some(flags);
    }
}

#[derive(Debug, Default)]
struct NotifierInner {
    user_present: u32,
    lock_screen_shown: Option<bool>,
    dialogs_closed: Vec<String>,
}

#[derive(Debug, Default)]
pub struct HeadlessNotifier {
    inner: Mutex<NotifierInner>,
}

impl HeadlessNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_present_count(&self) -> u32 {
        guard(&self.inner).user_present
    }

    pub fn lock_screen_shown(&self) -> Option<bool> {
        guard(&self.inner).lock_screen_shown
    }

    pub fn dialogs_closed(&self) -> Vec<String> {
        guard(&self.inner).dialogs_closed.clone()
    }
}

impl SystemNotifier for HeadlessNotifier {
    fn user_present(&self) {
        guard(&self.inner).user_present += 1;
    }

    fn lock_screen_shown(&self, shown: bool) {
        guard(&self.inner).lock_screen_shown = Some(shown);
    }

    fn close_system_dialogs(&self, reason: &str) {
        guard(&self.inner).dialogs_closed.push(reason.to_string());
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Credentials
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct CredentialInner {
    quality: PasswordQuality,
    pattern_hash: Option<String>,
    password_hash: Option<String>,
    sim_pin_hash: Option<String>,
    sim_puk_hash: Option<String>,
    account: Option<(String, String)>,
    permanently_locked: bool,
    lockout_deadline: Option<DateTime<Utc>>,
}

/// Credential store holding SHA-256 digests in memory.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<CredentialInner>,
}

impl MemoryCredentialStore {
    /// No credential at all.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pattern(pattern: &[u8]) -> Self {
        let store = Self::new();
        store.set_pattern(Some(pattern));
        store
    }

    pub fn with_password(password: &str, quality: PasswordQuality) -> Self {
        let store = Self::new();
        store.set_password(Some(password), quality);
        store
    }

    pub fn set_pattern(&self, pattern: Option<&[u8]>) {
        let mut inner = guard(&self.inner);
        inner.pattern_hash = pattern.map(digest);
        if pattern.is_some() {
            inner.quality = PasswordQuality::Something;
        }
    }

    pub fn set_password(&self, password: Option<&str>, quality: PasswordQuality) {
        let mut inner = guard(&self.inner);
        inner.password_hash = password.map(|p| digest(p.as_bytes()));
        inner.quality = quality;
    }

    pub fn set_sim_pin(&self, pin: &str) {
        guard(&self.inner).sim_pin_hash = Some(digest(pin.as_bytes()));
    }

    pub fn set_sim_puk(&self, puk: &str) {
        guard(&self.inner).sim_puk_hash = Some(digest(puk.as_bytes()));
    }

    pub fn set_fallback_account(&self, login: &str, password: &str) {
        guard(&self.inner).account = Some((login.to_string(), digest(password.as_bytes())));
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn password_quality(&self) -> PasswordQuality {
        guard(&self.inner).quality
    }

    fn is_pattern_enabled(&self) -> bool {
        guard(&self.inner).pattern_hash.is_some()
    }

    fn is_password_enabled(&self) -> bool {
        guard(&self.inner).password_hash.is_some()
    }

    fn check_pattern(&self, pattern: &[u8]) -> bool {
        guard(&self.inner).pattern_hash.as_deref() == Some(digest(pattern).as_str())
    }

    fn check_password(&self, password: &str) -> bool {
        guard(&self.inner).password_hash.as_deref()
            == Some(digest(password.as_bytes()).as_str())
    }

    fn supply_sim_pin(&self, pin: &str) -> bool {
        guard(&self.inner).sim_pin_hash.as_deref() == Some(digest(pin.as_bytes()).as_str())
    }

    fn supply_sim_puk(&self, puk: &str, new_pin: &str) -> bool {
        let mut inner = guard(&self.inner);
        if inner.sim_puk_hash.as_deref() != Some(digest(puk.as_bytes()).as_str()) {
            return false;
        }
        inner.sim_pin_hash = Some(digest(new_pin.as_bytes()));
        true
    }

    fn has_fallback_account(&self) -> bool {
        guard(&self.inner).account.is_some()
    }

    fn check_fallback_account(&self, login: &str, password: &str) -> bool {
        match &guard(&self.inner).account {
            Some((l, hash)) => l == login && *hash == digest(password.as_bytes()),
            None => false,
        }
    }

    fn is_permanently_locked(&self) -> bool {
        guard(&self.inner).permanently_locked
    }

    fn set_permanently_locked(&self, locked: bool) {
        guard(&self.inner).permanently_locked = locked;
    }

    fn lockout_deadline(&self) -> Option<DateTime<Utc>> {
        guard(&self.inner).lockout_deadline
    }

    fn set_lockout_deadline(&self, deadline: Option<DateTime<Utc>>) {
        guard(&self.inner).lockout_deadline = deadline;
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
