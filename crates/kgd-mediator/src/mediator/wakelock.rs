use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use kgd_core::{PowerControl, WakeLockKind};

/// The mediator's wake locks. Not reference counted: acquiring a held lock
/// and releasing a free one are no-ops.
pub struct WakeLockSet {
    power: Arc<dyn PowerControl>,
    held: Mutex<HashSet<WakeLockKind>>,
}

impl WakeLockSet {
    pub fn new(power: Arc<dyn PowerControl>) -> Self {
        Self { power, held: Mutex::new(HashSet::new()) }
    }

    pub fn acquire(&self, kind: WakeLockKind) {
        let newly = self.held.lock().unwrap_or_else(|p| p.into_inner()).insert(kind);
        if newly {
            log::debug!("[wakelock] acquire {:?}", kind);
            self.power.acquire_wake_lock(kind);
        }
    }

    pub fn release(&self, kind: WakeLockKind) {
        let was_held = self.held.lock().unwrap_or_else(|p| p.into_inner()).remove(&kind);
        if was_held {
            log::debug!("[wakelock] release {:?}", kind);
            self.power.release_wake_lock(kind);
        }
    }

    pub fn is_held(&self, kind: WakeLockKind) -> bool {
        self.held.lock().unwrap_or_else(|p| p.into_inner()).contains(&kind)
    }

    pub fn power(&self) -> &Arc<dyn PowerControl> {
        &self.power
    }
}
