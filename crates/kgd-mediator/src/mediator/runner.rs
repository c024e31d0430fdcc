use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use kgd_core::{KeyguardConfig, PowerControl, StatusBar, SystemNotifier, WakeLockKind};
use kgd_monitor::{FactEvent, UpdateMonitorState};
use kgd_presenter::{AttemptOutcome, LockScreenPresenter, PresenterSignal, UserInput};
use tokio::sync::{mpsc, oneshot};

use super::handle::KeyguardMediatorHandle;
use super::machine::{Inputs, KeyguardMachine};
use super::types::{
    Effect, Event, KeyguardEvent, KeyguardState, KeyguardStatus, PresenterCommand, VerifyTicket,
    WaiterId,
};
use super::wakelock::WakeLockSet;

/// Capacity of the outbound status event channel.
const EVENT_CHANNEL_SIZE: usize = 64;

/// Reason passed along when the keyguard closes system dialogs.
const CLOSE_DIALOGS_REASON: &str = "lock";

/// Messages into the mediator task.
pub(crate) enum Command {
    Event(Event),
    VerifyUnlock(oneshot::Sender<bool>),
    SetKeyguardEnabled { enabled: bool, done: Option<oneshot::Sender<()>> },
    Input { input: UserInput, reply: oneshot::Sender<AttemptOutcome> },
    /// Answered once every earlier command has been handled.
    Sync(oneshot::Sender<()>),
    Shutdown,
}

/// Collaborators the mediator drives.
pub struct MediatorDeps {
    pub monitor: UpdateMonitorState,
    pub presenter: LockScreenPresenter,
    pub power: Arc<dyn PowerControl>,
    /// `None` when the status bar service is not up yet.
    pub status_bar: Option<Arc<dyn StatusBar>>,
    pub notifier: Option<Arc<dyn SystemNotifier>>,
}

/// A launched mediator.
pub struct KeyguardMediator {
    pub handle: KeyguardMediatorHandle,
    /// Status events; dropped (with a warning) when nobody drains them.
    pub event_rx: mpsc::Receiver<KeyguardEvent>,
    /// Tokio join handle for the mediator task.
    pub join_handle: tokio::task::JoinHandle<()>,
}

/// Spawn the mediator task. Must be called inside a tokio runtime.
pub fn launch(config: KeyguardConfig, deps: MediatorDeps) -> KeyguardMediator {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
    let (fact_tx, fact_rx) = mpsc::unbounded_channel();

    let MediatorDeps { monitor, mut presenter, power, status_bar, notifier } = deps;
    let observer = monitor.register_fact_observer(fact_tx);

    let status = Arc::new(KeyguardStatus::default());
    let wake_locks = Arc::new(WakeLockSet::new(power));

    // The screen is on when the policy starts.
    presenter.on_screen_turned_on();

    let handle = KeyguardMediatorHandle::new(
        cmd_tx.clone(),
        Arc::clone(&status),
        Arc::clone(&wake_locks),
        config.done_drawing_timeout(),
    );

    let mut task = MediatorTask {
        machine: KeyguardMachine::new(config, true),
        provisioned_at_start: monitor.is_device_provisioned(),
        monitor,
        presenter,
        wake_locks,
        status_bar,
        notifier,
        status,
        event_tx,
        self_tx: cmd_tx.downgrade(),
        verifications: HashMap::new(),
        waiters: HashMap::new(),
        next_ticket: 1,
        next_waiter: 1,
        last_state: KeyguardState::Hidden,
    };
    drop(cmd_tx);
    task.publish();

    let join_handle = tokio::spawn(async move {
        task.run_loop(cmd_rx, fact_rx).await;
        if let Some(id) = observer {
            task.monitor.remove_observer(id);
        }
    });

    KeyguardMediator { handle, event_rx, join_handle }
}

struct MediatorTask {
    machine: KeyguardMachine,
    monitor: UpdateMonitorState,
    presenter: LockScreenPresenter,
    wake_locks: Arc<WakeLockSet>,
    status_bar: Option<Arc<dyn StatusBar>>,
    notifier: Option<Arc<dyn SystemNotifier>>,
    status: Arc<KeyguardStatus>,
    event_tx: mpsc::Sender<KeyguardEvent>,
    self_tx: mpsc::WeakUnboundedSender<Command>,

    verifications: HashMap<VerifyTicket, oneshot::Sender<bool>>,
    waiters: HashMap<WaiterId, oneshot::Sender<()>>,
    next_ticket: VerifyTicket,
    next_waiter: WaiterId,

    /// Registration replays the provisioned fact; only a later change is
    /// news.
    provisioned_at_start: bool,
    last_state: KeyguardState,
}

impl MediatorTask {
    async fn run_loop(
        &mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<Command>,
        mut fact_rx: mpsc::UnboundedReceiver<FactEvent>,
    ) {
        log::info!("[mediator] started");
        loop {
            // Facts already delivered are applied before the next command.
            tokio::select! {
                biased;
                Some(fact) = fact_rx.recv() => self.on_fact(fact),
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.on_command(cmd),
                },
            }
        }
        log::info!("[mediator] stopped");
        // Dropping the senders resolves every outstanding verification as
        // a failure.
        self.verifications.clear();
        self.waiters.clear();
    }

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Event(event) => self.run(event),
            Command::VerifyUnlock(reply) => {
                let ticket = self.next_ticket;
                self.next_ticket += 1;
                self.verifications.insert(ticket, reply);
                self.run(Event::VerifyUnlock(ticket));
            }
            Command::SetKeyguardEnabled { enabled, done } => {
                let waiter = done.map(|tx| {
                    let id = self.next_waiter;
                    self.next_waiter += 1;
                    self.waiters.insert(id, tx);
                    id
                });
                self.run(Event::SetKeyguardEnabled { enabled, waiter });
            }
            Command::Input { input, reply } => {
                let result = self.presenter.handle_input(input);
                let mut queue = VecDeque::new();
                self.queue_signals(result.signals, &mut queue);
                self.drain(queue);
                let _ = reply.send(result.outcome);
            }
            Command::Sync(reply) => {
                let _ = reply.send(());
            }
            Command::Shutdown => {}
        }
    }

    fn on_fact(&mut self, fact: FactEvent) {
        let event = match fact {
            FactEvent::SimStateChanged { state } => Event::SimStateChanged(state),
            FactEvent::PhoneStateChanged { state } => Event::PhoneStateChanged(state),
            FactEvent::DeviceProvisioned => {
                if std::mem::replace(&mut self.provisioned_at_start, false) {
                    return;
                }
                Event::DeviceProvisioned
            }
            _ => return,
        };
        self.run(event);
    }

    // ── Dispatch ───────────────────────────────────────────────────────

    fn inputs(&self) -> Inputs {
        Inputs {
            provisioned: self.monitor.is_device_provisioned(),
            sim_state: self.monitor.sim_state(),
            secure: self.presenter.requires_credential(),
            presenter_showing: self.presenter.is_showing(),
            hand_off_held: self.wake_locks.is_held(WakeLockKind::HandOff),
        }
    }

    fn run(&mut self, event: Event) {
        self.drain(VecDeque::from([event]));
    }

    /// Handle `queue` to exhaustion. Events raised while applying effects
    /// go to the back, so each transition finishes before the next starts.
    fn drain(&mut self, mut queue: VecDeque<Event>) {
        while let Some(event) = queue.pop_front() {
            log::trace!("[mediator] {:?}", event);
            let inputs = self.inputs();
            for effect in self.machine.handle(event, &inputs) {
                self.apply(effect, &mut queue);
            }
        }
        self.publish();
    }

    fn apply(&mut self, effect: Effect, queue: &mut VecDeque<Event>) {
        match effect {
            Effect::Present(cmd) => self.present(cmd, queue),
            Effect::AcquireWakeLock(kind) => self.wake_locks.acquire(kind),
            Effect::ReleaseWakeLock(kind) => self.wake_locks.release(kind),
            Effect::EnableUserActivity(enabled) => {
                self.wake_locks.power().enable_user_activity(enabled)
            }
            Effect::UserActivity => self.wake_locks.power().user_activity(),
            Effect::StatusBar(flags) => match &self.status_bar {
                Some(bar) => bar.disable(flags),
                None => log::warn!("[mediator] no status bar, dropping {:?}", flags),
            },
            Effect::ScheduleDelayedLock { sequence, stage, after } => {
                self.schedule(after, Event::DelayedLock { sequence, stage })
            }
            Effect::ScheduleWakeLockRelease { sequence, after } => {
                self.schedule(after, Event::WakeLockTimeout { sequence })
            }
            Effect::ScheduleDrawTimeout(after) => self.schedule(after, Event::DrawTimeout),
            Effect::CompleteVerification { ticket, authenticated } => {
                match self.verifications.remove(&ticket) {
                    Some(reply) => {
                        log::debug!("[mediator] verification {} -> {}", ticket, authenticated);
                        let _ = reply.send(authenticated);
                    }
                    None => log::warn!("[mediator] unknown verification {}", ticket),
                }
            }
            Effect::CompleteWaiter(id) => {
                if let Some(done) = self.waiters.remove(&id) {
                    let _ = done.send(());
                }
            }
            Effect::ClearFailedAttempts => self.monitor.clear_failed_attempts(),
            Effect::LockScreenShown(shown) => {
                if let Some(notifier) = &self.notifier {
                    notifier.lock_screen_shown(shown);
                }
            }
            Effect::CloseSystemDialogs => {
                if let Some(notifier) = &self.notifier {
                    notifier.close_system_dialogs(CLOSE_DIALOGS_REASON);
                }
            }
            Effect::UserPresent => {
                if let Some(notifier) = &self.notifier {
                    notifier.user_present();
                }
                self.emit(KeyguardEvent::UserPresent);
            }
        }
    }

    fn present(&mut self, cmd: PresenterCommand, queue: &mut VecDeque<Event>) {
        let signals = match cmd {
            PresenterCommand::Show => self.presenter.show(),
            PresenterCommand::Hide => {
                self.presenter.hide();
                vec![]
            }
            PresenterCommand::Reset => {
                self.presenter.reset();
                vec![]
            }
            PresenterCommand::VerifyUnlock => self.presenter.verify_unlock(),
            PresenterCommand::ScreenTurnedOff => {
                self.presenter.on_screen_turned_off();
                vec![]
            }
            PresenterCommand::ScreenTurnedOn => {
                self.presenter.on_screen_turned_on();
                vec![]
            }
            PresenterCommand::WakeWhenReady(key) => {
                let signals = self.presenter.wake_when_ready(key);
                let poked = signals
                    .iter()
                    .any(|s| matches!(s, PresenterSignal::PokeWakelock { .. }));
                self.queue_signals(signals, queue);
                queue.push_back(Event::WakeHandled { poked });
                return;
            }
            PresenterCommand::SetLockedButNotSecured(value) => {
                self.presenter.on_locked_but_not_secured(value);
                vec![]
            }
        };
        self.queue_signals(signals, queue);
    }

    fn queue_signals(&self, signals: Vec<PresenterSignal>, queue: &mut VecDeque<Event>) {
        for signal in signals {
            match signal {
                PresenterSignal::KeyguardDone { authenticated } => {
                    queue.push_back(Event::KeyguardDone { authenticated, wakeup: true })
                }
                PresenterSignal::PokeWakelock { hold } => queue.push_back(Event::PokeWakelock(hold)),
                PresenterSignal::DoneDrawing => queue.push_back(Event::DoneDrawing),
                PresenterSignal::Notice(notice) => self.emit(KeyguardEvent::Notice { notice }),
            }
        }
    }

    /// Post `event` back to this task after `after`. The timer holds only a
    /// weak sender so it never keeps a stopped mediator alive.
    fn schedule(&self, after: Duration, event: Event) {
        let weak = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(tx) = weak.upgrade() {
                let _ = tx.send(Command::Event(event));
            }
        });
    }

    // ── Publishing ─────────────────────────────────────────────────────

    fn publish(&mut self) {
        let snapshot = self.machine.snapshot(&self.inputs());
        self.status.store(snapshot);
        if snapshot.state != self.last_state {
            tracing::info!(
                from = ?self.last_state,
                to = ?snapshot.state,
                hidden = snapshot.hidden,
                "keyguard state changed"
            );
            self.last_state = snapshot.state;
            self.emit(KeyguardEvent::StateChanged { state: snapshot.state });
        }
    }

    fn emit(&self, event: KeyguardEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            match e {
                mpsc::error::TrySendError::Full(event) => {
                    log::warn!("[mediator] event channel full, dropping {:?}", event)
                }
                mpsc::error::TrySendError::Closed(_) => {}
            }
        }
    }
}
