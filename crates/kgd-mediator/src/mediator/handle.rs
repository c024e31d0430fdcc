use std::sync::Arc;
use std::time::Duration;

use kgd_core::{KeyCode, KeyguardError, KeyguardResult, LockStatus, ScreenOffReason, WakeLockKind};
use kgd_presenter::{AttemptOutcome, UserInput};
use tokio::sync::{mpsc, oneshot};

use super::runner::Command;
use super::types::{Event, KeyguardState, KeyguardStatus, StatusSnapshot};
use super::wakelock::WakeLockSet;

/// Cloneable front door to a running mediator.
///
/// Posting methods never block and may be called from any thread. Status
/// getters read the last published snapshot.
#[derive(Clone)]
pub struct KeyguardMediatorHandle {
    tx: mpsc::UnboundedSender<Command>,
    status: Arc<KeyguardStatus>,
    wake_locks: Arc<WakeLockSet>,
    draw_timeout: Duration,
}

impl KeyguardMediatorHandle {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<Command>,
        status: Arc<KeyguardStatus>,
        wake_locks: Arc<WakeLockSet>,
        draw_timeout: Duration,
    ) -> Self {
        Self { tx, status, wake_locks, draw_timeout }
    }

    fn send(&self, cmd: Command) -> KeyguardResult<()> {
        self.tx.send(cmd).map_err(|_| KeyguardError::ChannelClosed)
    }

    fn post(&self, event: Event) -> KeyguardResult<()> {
        self.send(Command::Event(event))
    }

    // ── Window manager / power ─────────────────────────────────────────

    /// Boot finished; the first call shows the keyguard if the device
    /// needs it.
    pub fn on_system_ready(&self) -> KeyguardResult<()> {
        self.post(Event::SystemReady)
    }

    pub fn on_screen_turned_off(&self, why: ScreenOffReason) -> KeyguardResult<()> {
        self.post(Event::ScreenTurnedOff(why))
    }

    pub fn on_screen_turned_on(&self) -> KeyguardResult<()> {
        self.post(Event::ScreenTurnedOn)
    }

    /// Another window is (or stops being) drawn over the keyguard.
    pub fn set_hidden(&self, hidden: bool) -> KeyguardResult<()> {
        self.post(Event::SetHidden(hidden))
    }

    /// Device policy asked for an immediate lock.
    pub fn do_keyguard_timeout(&self) -> KeyguardResult<()> {
        self.post(Event::DoKeyguardTimeout)
    }

    pub fn set_keyboard_open(&self, open: bool) -> KeyguardResult<()> {
        self.post(Event::KeyboardOpen(open))
    }

    /// Decide synchronously whether `key` should wake the device while the
    /// keyguard is showing. When it does, the hand-off wake lock is taken
    /// right away and held until the presenter has reacted.
    pub fn on_wake_key_when_keyguard_showing(&self, key: KeyCode, docked: bool) -> bool {
        if !key.wakes_keyguard(docked) {
            return false;
        }
        self.wake_locks.acquire(WakeLockKind::HandOff);
        if self.post(Event::WakeWhenReady(key)).is_err() {
            self.wake_locks.release(WakeLockKind::HandOff);
        }
        true
    }

    /// Any motion event wakes the keyguard.
    pub fn on_wake_motion_when_keyguard_showing(&self) -> bool {
        self.on_wake_key_when_keyguard_showing(KeyCode::Unknown, false)
    }

    // ── External apps ──────────────────────────────────────────────────

    /// Enable or disable the keyguard on behalf of another app. Re-enabling
    /// after a disable that hid the keyguard returns once it has been drawn,
    /// or after the draw timeout.
    pub async fn set_keyguard_enabled(&self, enabled: bool) -> KeyguardResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(Command::SetKeyguardEnabled { enabled, done: Some(done_tx) })?;
        match tokio::time::timeout(self.draw_timeout.saturating_mul(2), done_rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(KeyguardError::ChannelClosed),
            Err(_) => Err(KeyguardError::Timeout("set_keyguard_enabled".into())),
        }
    }

    /// Blocking variant of [`Self::set_keyguard_enabled`]. Must not be
    /// called from inside the async runtime.
    pub fn set_keyguard_enabled_blocking(&self, enabled: bool) -> KeyguardResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(Command::SetKeyguardEnabled { enabled, done: Some(done_tx) })?;
        done_rx.blocking_recv().map_err(|_| KeyguardError::ChannelClosed)
    }

    /// Ask the user to prove their identity. Resolves to `false` on any
    /// failure, including a mediator that stops before answering.
    pub async fn verify_unlock(&self) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.send(Command::VerifyUnlock(reply_tx)).is_err() {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    // ── Presenter callbacks ────────────────────────────────────────────

    pub fn poke_wakelock(&self, hold: Option<Duration>) -> KeyguardResult<()> {
        self.post(Event::PokeWakelock(hold))
    }

    pub fn keyguard_done(&self, authenticated: bool, wakeup: bool) -> KeyguardResult<()> {
        self.post(Event::KeyguardDone { authenticated, wakeup })
    }

    pub fn keyguard_done_drawing(&self) -> KeyguardResult<()> {
        self.post(Event::DoneDrawing)
    }

    /// Feed user input to the screen currently shown and wait for the
    /// mediator to act on it.
    pub async fn submit(&self, input: UserInput) -> KeyguardResult<AttemptOutcome> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Input { input, reply: reply_tx })?;
        reply_rx.await.map_err(|_| KeyguardError::ChannelClosed)
    }

    // ── Status ─────────────────────────────────────────────────────────

    pub fn is_showing(&self) -> bool {
        self.status.is_showing()
    }

    pub fn is_showing_and_not_hidden(&self) -> bool {
        self.status.is_showing() && !self.status.is_hidden()
    }

    pub fn is_secure(&self) -> bool {
        self.status.is_secure()
    }

    pub fn is_input_restricted(&self) -> bool {
        self.status.is_input_restricted()
    }

    pub fn state(&self) -> KeyguardState {
        self.status.state()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    /// Resolves once every command posted before it has been handled.
    pub async fn sync(&self) -> KeyguardResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Sync(tx))?;
        rx.await.map_err(|_| KeyguardError::ChannelClosed)
    }

    pub fn shutdown(&self) -> KeyguardResult<()> {
        self.send(Command::Shutdown)
    }
}

impl LockStatus for KeyguardMediatorHandle {
    fn is_showing(&self) -> bool {
        KeyguardMediatorHandle::is_showing(self)
    }

    fn is_secure(&self) -> bool {
        KeyguardMediatorHandle::is_secure(self)
    }

    fn is_input_restricted(&self) -> bool {
        KeyguardMediatorHandle::is_input_restricted(self)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mediator::{launch, KeyguardEvent, KeyguardMediator, MediatorDeps};
    use kgd_core::headless::{
        HeadlessNotifier, HeadlessPower, HeadlessStatusBar, MemoryCredentialStore,
    };
    use kgd_core::{CredentialStore, KeyguardConfig, SimState};
    use kgd_monitor::{DeviceFacts, UpdateMonitor};
    use kgd_presenter::{HeadlessHost, HeadlessScreens, LockScreenPresenter, PresenterDeps};
    use tracing_test::traced_test;

    struct Rig {
        mediator: KeyguardMediator,
        power: Arc<HeadlessPower>,
        notifier: Arc<HeadlessNotifier>,
        status_bar: Arc<HeadlessStatusBar>,
    }

    fn rig(config: KeyguardConfig, credentials: Arc<dyn CredentialStore>, host: HeadlessHost) -> Rig {
        let monitor = UpdateMonitor::with_facts(DeviceFacts {
            sim_state: SimState::Ready,
            device_provisioned: true,
            ..DeviceFacts::default()
        });
        let presenter = LockScreenPresenter::new(
            config.clone(),
            PresenterDeps {
                monitor: monitor.clone(),
                credentials,
                host: Box::new(host),
                screens: Box::new(HeadlessScreens::new()),
            },
        );
        let power = Arc::new(HeadlessPower::new());
        let notifier = Arc::new(HeadlessNotifier::new());
        let status_bar = Arc::new(HeadlessStatusBar::new());
        let mediator = launch(
            config,
            MediatorDeps {
                monitor,
                presenter,
                power: power.clone(),
                status_bar: Some(status_bar.clone()),
                notifier: Some(notifier.clone()),
            },
        );
        Rig { mediator, power, notifier, status_bar }
    }

    fn pattern_rig() -> Rig {
        rig(
            KeyguardConfig::default(),
            Arc::new(MemoryCredentialStore::with_pattern(&[0, 1, 2, 5])),
            HeadlessHost::new(),
        )
    }

    // ── Boot ───────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn system_ready_shows_secure_keyguard() {
        let mut rig = pattern_rig();
        let handle = rig.mediator.handle.clone();
        assert!(!handle.is_showing());

        handle.on_system_ready().unwrap();
        handle.sync().await.unwrap();

        assert_eq!(handle.state(), KeyguardState::ShowingSecure);
        assert!(handle.is_showing_and_not_hidden());
        assert!(handle.is_secure());
        assert!(handle.is_input_restricted());
        assert_eq!(rig.notifier.lock_screen_shown(), Some(true));
        assert_eq!(rig.notifier.dialogs_closed(), vec!["lock".to_string()]);
        assert!(rig.status_bar.last_flags().map(|f| f.disable_expand).unwrap_or(false));
        assert!(!rig.power.is_held(WakeLockKind::Show));
        assert_eq!(
            rig.mediator.event_rx.recv().await,
            Some(KeyguardEvent::StateChanged { state: KeyguardState::ShowingSecure })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn correct_pattern_unlocks() {
        let mut rig = pattern_rig();
        let handle = rig.mediator.handle.clone();
        handle.on_system_ready().unwrap();

        assert_eq!(
            handle.submit(UserInput::GoToUnlockScreen).await.unwrap(),
            AttemptOutcome::Accepted
        );
        let outcome = handle.submit(UserInput::Pattern(vec![0, 1, 2, 5])).await.unwrap();
        assert_eq!(outcome, AttemptOutcome::Accepted);

        assert_eq!(handle.state(), KeyguardState::Hidden);
        assert!(!handle.is_input_restricted());
        assert_eq!(rig.notifier.user_present_count(), 1);
        assert!(rig.power.user_activity_reports() >= 1);
        assert!(!rig.power.is_held(WakeLockKind::Poke));

        let mut events = Vec::new();
        while let Ok(event) = rig.mediator.event_rx.try_recv() {
            events.push(event);
        }
        assert!(events.contains(&KeyguardEvent::UserPresent));
        assert_eq!(
            events.last(),
            Some(&KeyguardEvent::StateChanged { state: KeyguardState::Hidden })
        );
    }

    // ── External enable / verify ───────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn reenable_waits_for_draw_timeout() {
        let rig = rig(
            KeyguardConfig::default(),
            Arc::new(MemoryCredentialStore::with_pattern(&[0, 1, 2, 5])),
            HeadlessHost::deferred_draw(),
        );
        let handle = rig.mediator.handle.clone();
        handle.on_system_ready().unwrap();
        handle.set_keyguard_enabled(false).await.unwrap();
        assert!(!handle.is_showing());
        assert!(handle.is_input_restricted());

        let started = tokio::time::Instant::now();
        handle.set_keyguard_enabled(true).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(2000));
        assert!(handle.is_showing());
    }

    #[tokio::test(start_paused = true)]
    async fn reenable_returns_once_drawn() {
        let rig = rig(
            KeyguardConfig::default(),
            Arc::new(MemoryCredentialStore::with_pattern(&[0, 1, 2, 5])),
            HeadlessHost::deferred_draw(),
        );
        let handle = rig.mediator.handle.clone();
        handle.on_system_ready().unwrap();
        handle.set_keyguard_enabled(false).await.unwrap();

        let started = tokio::time::Instant::now();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.set_keyguard_enabled(true).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.sync().await.unwrap();
        assert!(handle.is_showing());
        handle.keyguard_done_drawing().unwrap();

        waiter.await.unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn verify_while_enabled_fails() {
        let rig = pattern_rig();
        let handle = rig.mediator.handle.clone();
        handle.on_system_ready().unwrap();
        assert!(!handle.verify_unlock().await);
    }

    #[tokio::test(start_paused = true)]
    async fn verify_with_pattern_succeeds() {
        let rig = pattern_rig();
        let handle = rig.mediator.handle.clone();
        handle.on_system_ready().unwrap();
        handle.set_keyguard_enabled(false).await.unwrap();

        let verify = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.verify_unlock().await })
        };
        handle.sync().await.unwrap();
        tokio::task::yield_now().await;
        handle.sync().await.unwrap();
        assert_eq!(handle.state(), KeyguardState::VerifyingExternal);

        handle.submit(UserInput::Pattern(vec![0, 1, 2, 5])).await.unwrap();
        assert!(verify.await.unwrap());
        assert_eq!(handle.state(), KeyguardState::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn verify_resolves_false_on_shutdown() {
        let rig = pattern_rig();
        let handle = rig.mediator.handle.clone();
        handle.on_system_ready().unwrap();
        handle.set_keyguard_enabled(false).await.unwrap();

        let verify = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.verify_unlock().await })
        };
        handle.sync().await.unwrap();
        tokio::task::yield_now().await;
        handle.shutdown().unwrap();
        assert!(!verify.await.unwrap());
        rig.mediator.join_handle.await.unwrap();
        assert!(handle.on_screen_turned_on().is_err());
    }

    // ── Wake keys ──────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn wake_key_hand_off() {
        let rig = pattern_rig();
        let handle = rig.mediator.handle.clone();
        handle.on_system_ready().unwrap();
        handle.sync().await.unwrap();

        assert!(!handle.on_wake_key_when_keyguard_showing(KeyCode::VolumeUp, false));
        assert!(!handle.on_wake_key_when_keyguard_showing(KeyCode::Camera, true));
        assert!(handle.on_wake_key_when_keyguard_showing(KeyCode::VolumeUp, true));
        assert!(rig.power.is_held(WakeLockKind::HandOff));

        handle.sync().await.unwrap();
        assert!(!rig.power.is_held(WakeLockKind::HandOff));
        assert!(rig.power.is_held(WakeLockKind::Poke));
    }

    #[tokio::test(start_paused = true)]
    async fn poke_released_after_awake_interval() {
        let rig = pattern_rig();
        let handle = rig.mediator.handle.clone();
        handle.poke_wakelock(Some(Duration::from_secs(3))).unwrap();
        handle.sync().await.unwrap();
        assert!(rig.power.is_held(WakeLockKind::Poke));

        tokio::time::sleep(Duration::from_millis(3100)).await;
        handle.sync().await.unwrap();
        assert!(!rig.power.is_held(WakeLockKind::Poke));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn state_changes_are_traced() {
        let rig = pattern_rig();
        let handle = rig.mediator.handle.clone();
        handle.on_system_ready().unwrap();
        handle.sync().await.unwrap();
        assert!(logs_contain("keyguard state changed"));
    }
}
