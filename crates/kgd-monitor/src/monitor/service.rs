//! The update monitor service.
//!
//! Holds the current [`DeviceFacts`] behind a lock that is only ever held
//! long enough to swap in a new snapshot, so reads are cheap and safe from
//! any thread. Fact changes fan out to observer channels; a no-op delta
//! never notifies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use kgd_core::{BatteryStatus, PhoneCallState, SimState};
use tokio::sync::mpsc;

use super::decode;
use super::types::{DeviceFacts, FactEvent, Notification};

pub type ObserverId = u64;

pub type UpdateMonitorState = Arc<UpdateMonitor>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObserverKind {
    AllFacts,
    SimOnly,
}

struct Observer {
    id: ObserverId,
    kind: ObserverKind,
    tx: mpsc::UnboundedSender<FactEvent>,
}

impl Observer {
    fn wants(&self, event: &FactEvent) -> bool {
        self.kind == ObserverKind::AllFacts || event.is_sim()
    }
}

pub struct UpdateMonitor {
    facts: RwLock<Arc<DeviceFacts>>,
    observers: Mutex<Vec<Observer>>,
    next_observer_id: AtomicU64,
}

/// Posts notifications to the monitor's delivery task.
#[derive(Debug)]
pub struct MonitorHandle {
    tx: mpsc::UnboundedSender<Notification>,
    /// Tokio join handle for the delivery task.
    pub join_handle: tokio::task::JoinHandle<()>,
}

impl MonitorHandle {
    /// Queue a notification. Returns `false` once the delivery task is gone.
    pub fn post(&self, notification: Notification) -> bool {
        self.tx.send(notification).is_ok()
    }
}

impl UpdateMonitor {
    pub fn new() -> UpdateMonitorState {
        Self::with_facts(DeviceFacts::default())
    }

    pub fn with_facts(facts: DeviceFacts) -> UpdateMonitorState {
        Arc::new(Self {
            facts: RwLock::new(Arc::new(facts)),
            observers: Mutex::new(Vec::new()),
            next_observer_id: AtomicU64::new(1),
        })
    }

    /// Start the single delivery task that applies posted notifications in
    /// order.
    pub fn spawn_delivery(self: &Arc<Self>) -> MonitorHandle {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let monitor = Arc::clone(self);
        let join_handle = tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                monitor.apply(notification);
            }
            log::debug!("[monitor] delivery task stopped");
        });
        MonitorHandle { tx, join_handle }
    }

    // ── Reads ──────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Arc<DeviceFacts> {
        Arc::clone(&self.facts.read().unwrap_or_else(|p| p.into_inner()))
    }

    pub fn sim_state(&self) -> SimState {
        self.snapshot().sim_state
    }

    pub fn is_device_provisioned(&self) -> bool {
        self.snapshot().device_provisioned
    }

    pub fn phone_state(&self) -> PhoneCallState {
        self.snapshot().phone_state
    }

    pub fn battery(&self) -> BatteryStatus {
        self.snapshot().battery
    }

    pub fn failed_attempts(&self) -> u32 {
        self.snapshot().failed_unlock_attempts
    }

    // ── Observers ──────────────────────────────────────────────────────

    /// Subscribe to every fact change. The current state is replayed to the
    /// new observer immediately. Registering the same channel twice is a
    /// caller bug: it is logged and `None` is returned.
    pub fn register_fact_observer(
        &self,
        tx: mpsc::UnboundedSender<FactEvent>,
    ) -> Option<ObserverId> {
        self.register(tx, ObserverKind::AllFacts)
    }

    /// Subscribe to SIM state changes only.
    pub fn register_sim_state_observer(
        &self,
        tx: mpsc::UnboundedSender<FactEvent>,
    ) -> Option<ObserverId> {
        self.register(tx, ObserverKind::SimOnly)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(|p| p.into_inner());
        let before = observers.len();
        observers.retain(|o| o.id != id);
        observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    fn register(
        &self,
        tx: mpsc::UnboundedSender<FactEvent>,
        kind: ObserverKind,
    ) -> Option<ObserverId> {
        let mut observers = self.observers.lock().unwrap_or_else(|p| p.into_inner());
        if observers.iter().any(|o| o.tx.same_channel(&tx)) {
            log::error!("[monitor] observer already registered, ignoring ({:?})", kind);
            return None;
        }
        let id = self.next_observer_id.fetch_add(1, Ordering::Relaxed);
        let observer = Observer { id, kind, tx };
        for event in Self::current_state_events(&self.snapshot()) {
            if observer.wants(&event) {
                let _ = observer.tx.send(event);
            }
        }
        observers.push(observer);
        Some(id)
    }

    fn current_state_events(facts: &DeviceFacts) -> Vec<FactEvent> {
        let mut events = vec![
            FactEvent::BatteryChanged { status: facts.battery },
            FactEvent::TimeChanged,
            FactEvent::CarrierTextChanged { carrier: facts.carrier.clone() },
            FactEvent::RingerModeChanged { mode: facts.ringer_mode },
            FactEvent::PhoneStateChanged { state: facts.phone_state },
        ];
        if facts.device_provisioned {
            events.push(FactEvent::DeviceProvisioned);
        }
        if facts.sim_state != SimState::Unknown {
            events.push(FactEvent::SimStateChanged { state: facts.sim_state });
        }
        events
    }

    fn dispatch(&self, events: Vec<FactEvent>) {
        if events.is_empty() {
            return;
        }
        let mut observers = self.observers.lock().unwrap_or_else(|p| p.into_inner());
        observers.retain(|o| !o.tx.is_closed());
        for event in events {
            for observer in observers.iter().filter(|o| o.wants(&event)) {
                let _ = observer.tx.send(event.clone());
            }
        }
    }

    /// Swap in a modified copy of the facts; returns what `f` reported.
    fn mutate<F>(&self, f: F) -> Vec<FactEvent>
    where
        F: FnOnce(&mut DeviceFacts) -> Vec<FactEvent>,
    {
        let mut slot = self.facts.write().unwrap_or_else(|p| p.into_inner());
        let mut next = DeviceFacts::clone(&slot);
        let events = f(&mut next);
        if next != **slot {
            *slot = Arc::new(next);
        }
        events
    }

    // ── Writes ─────────────────────────────────────────────────────────

    /// Decode and apply one notification, notifying observers of any
    /// resulting change.
    pub fn apply(&self, notification: Notification) {
        log::debug!("[monitor] {:?}", notification);
        let events = match notification {
            Notification::TimeTick => vec![FactEvent::TimeChanged],
            Notification::BatteryChanged(status) => self.mutate(|facts| {
                let interesting = facts.battery.is_interesting_change(&status);
                facts.battery = status;
                if interesting {
                    vec![FactEvent::BatteryChanged { status }]
                } else {
                    vec![]
                }
            }),
            Notification::SimStateChanged { state, reason } => {
                let decoded = decode::decode_sim_state(&state, reason.as_deref());
                self.set_sim_state(decoded)
            }
            Notification::CarrierInfo { show_plmn, plmn, show_spn, spn } => {
                let carrier = decode::decode_carrier(show_plmn, plmn, show_spn, spn);
                self.mutate(|facts| {
                    if facts.carrier == carrier {
                        return vec![];
                    }
                    facts.carrier = carrier.clone();
                    vec![FactEvent::CarrierTextChanged { carrier }]
                })
            }
            Notification::RingerModeChanged(mode) => self.mutate(|facts| {
                if facts.ringer_mode == mode {
                    return vec![];
                }
                facts.ringer_mode = mode;
                vec![FactEvent::RingerModeChanged { mode }]
            }),
            Notification::PhoneStateChanged(raw) => match PhoneCallState::from_broadcast(&raw) {
                Some(state) => self.mutate(|facts| {
                    if facts.phone_state == state {
                        return vec![];
                    }
                    facts.phone_state = state;
                    vec![FactEvent::PhoneStateChanged { state }]
                }),
                None => {
                    log::warn!("[monitor] unrecognised phone state {:?}", raw);
                    vec![]
                }
            },
            Notification::DeviceProvisioned(provisioned) => self.mutate(|facts| {
                if !provisioned {
                    if facts.device_provisioned {
                        log::warn!("[monitor] ignoring provisioned -> unprovisioned");
                    }
                    return vec![];
                }
                if facts.device_provisioned {
                    return vec![];
                }
                facts.device_provisioned = true;
                vec![FactEvent::DeviceProvisioned]
            }),
        };
        self.dispatch(events);
    }

    fn set_sim_state(&self, state: SimState) -> Vec<FactEvent> {
        if state == SimState::Unknown {
            log::debug!("[monitor] dropping unknown SIM state");
            return vec![];
        }
        self.mutate(|facts| {
            if facts.sim_state == state {
                return vec![];
            }
            log::info!("[monitor] SIM {:?} -> {:?}", facts.sim_state, state);
            facts.sim_state = state;
            vec![FactEvent::SimStateChanged { state }]
        })
    }

    /// The user entered a correct SIM PIN. Applied synchronously so the
    /// next query sees `Ready` before telephony confirms.
    pub fn report_sim_pin_unlocked(&self) {
        let events = self.set_sim_state(SimState::Ready);
        self.dispatch(events);
    }

    /// Returns the new failure count.
    pub fn report_failed_attempt(&self) -> u32 {
        let mut count = 0;
        self.mutate(|facts| {
            facts.failed_unlock_attempts = facts.failed_unlock_attempts.saturating_add(1);
            count = facts.failed_unlock_attempts;
            vec![]
        });
        count
    }

    pub fn clear_failed_attempts(&self) {
        self.mutate(|facts| {
            facts.failed_unlock_attempts = 0;
            vec![]
        });
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
