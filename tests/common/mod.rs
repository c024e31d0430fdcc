#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use kgd_lib::kgd_core::headless::{
    HeadlessNotifier, HeadlessPower, HeadlessStatusBar, MemoryCredentialStore,
};
use kgd_lib::kgd_core::{KeyguardConfig, RingerMode, SimState};
use kgd_lib::kgd_mediator::{KeyguardEvent, KeyguardMediatorHandle};
use kgd_lib::kgd_monitor::{DeviceFacts, Notification};
use kgd_lib::kgd_power_menu::{PowerMenuConfig, PowerMenuHandler};
use kgd_lib::kgd_presenter::{HeadlessHost, HeadlessScreens, HostProbe, ScreenProbe};
use kgd_lib::{KeyguardPolicy, PolicyConfig, PolicyDeps};
use tokio::sync::mpsc;

/// Records power menu dispatches by name.
#[derive(Default)]
pub struct MenuRecorder {
    calls: Mutex<Vec<&'static str>>,
}

impl MenuRecorder {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

impl PowerMenuHandler for MenuRecorder {
    fn shutdown(&self) {
        self.record("shutdown");
    }
    fn reboot(&self) {
        self.record("reboot");
    }
    fn reboot_safe_mode(&self) {
        self.record("safe_mode");
    }
    fn take_screenshot(&self) {
        self.record("screenshot");
    }
    fn request_bug_report(&self) {
        self.record("bug_report");
    }
    fn choose_profile(&self) {
        self.record("profile");
    }
    fn is_airplane_mode_on(&self) -> bool {
        false
    }
    fn set_airplane_mode(&self, _on: bool) {
        self.record("airplane");
    }
    fn ringer_mode(&self) -> RingerMode {
        RingerMode::Normal
    }
    fn set_ringer_mode(&self, _mode: RingerMode) {
        self.record("ringer");
    }
}

pub struct Rig {
    pub policy: KeyguardPolicy,
    pub events: mpsc::Receiver<KeyguardEvent>,
    pub power: Arc<HeadlessPower>,
    pub notifier: Arc<HeadlessNotifier>,
    pub status_bar: Arc<HeadlessStatusBar>,
    pub credentials: Arc<MemoryCredentialStore>,
    pub menu: Arc<MenuRecorder>,
    pub host: HostProbe,
    pub screens: ScreenProbe,
}

impl Rig {
    pub fn keyguard(&self) -> KeyguardMediatorHandle {
        self.policy.keyguard().clone()
    }

    /// Apply a broadcast synchronously and let the mediator react to it.
    pub async fn deliver(&self, notification: Notification) {
        self.policy.monitor().apply(notification);
        self.policy.keyguard().sync().await.unwrap();
    }

    pub fn drain_events(&mut self) -> Vec<KeyguardEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

pub fn provisioned() -> DeviceFacts {
    DeviceFacts {
        sim_state: SimState::Ready,
        device_provisioned: true,
        ..DeviceFacts::default()
    }
}

pub struct RigBuilder {
    config: PolicyConfig,
    facts: DeviceFacts,
    credentials: MemoryCredentialStore,
    host: HeadlessHost,
}

impl RigBuilder {
    pub fn new() -> Self {
        Self {
            config: PolicyConfig::default(),
            facts: provisioned(),
            credentials: MemoryCredentialStore::new(),
            host: HeadlessHost::new(),
        }
    }

    pub fn keyguard(mut self, f: impl FnOnce(&mut KeyguardConfig)) -> Self {
        f(&mut self.config.keyguard);
        self
    }

    pub fn power_menu(mut self, config: PowerMenuConfig) -> Self {
        self.config.power_menu = config;
        self
    }

    pub fn facts(mut self, facts: DeviceFacts) -> Self {
        self.facts = facts;
        self
    }

    pub fn pattern(mut self, pattern: &[u8]) -> Self {
        self.credentials = MemoryCredentialStore::with_pattern(pattern);
        self
    }

    pub fn credentials(mut self, credentials: MemoryCredentialStore) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn deferred_draw(mut self) -> Self {
        self.host = HeadlessHost::deferred_draw();
        self
    }

    pub fn start(self) -> Rig {
        let power = Arc::new(HeadlessPower::new());
        let notifier = Arc::new(HeadlessNotifier::new());
        let status_bar = Arc::new(HeadlessStatusBar::new());
        let credentials = Arc::new(self.credentials);
        let menu = Arc::new(MenuRecorder::default());
        let screens = HeadlessScreens::new();
        let screen_probe = screens.probe();
        let host_probe = self.host.probe();

        let (policy, events) = KeyguardPolicy::start(
            self.config,
            self.facts,
            PolicyDeps {
                credentials: credentials.clone(),
                host: Box::new(self.host),
                screens: Box::new(screens),
                power: power.clone(),
                status_bar: Some(status_bar.clone()),
                notifier: Some(notifier.clone()),
                menu_handler: menu.clone(),
            },
        )
        .unwrap();

        Rig {
            policy,
            events,
            power,
            notifier,
            status_bar,
            credentials,
            menu,
            host: host_probe,
            screens: screen_probe,
        }
    }
}

/// Secure device with a pattern, booted and showing.
pub async fn booted_secure() -> Rig {
    let rig = RigBuilder::new().pattern(&[0, 3, 6, 7, 8]).start();
    rig.keyguard().on_system_ready().unwrap();
    rig.keyguard().sync().await.unwrap();
    rig
}
