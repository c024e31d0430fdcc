//! # kgd
//!
//! Keyguard policy core. Wires the [`UpdateMonitor`], the
//! [`LockScreenPresenter`], the keyguard mediator and the [`PowerMenu`]
//! together behind one [`KeyguardPolicy`].

pub mod config;
pub mod logging;

use std::sync::Arc;

pub use kgd_core;
pub use kgd_mediator;
pub use kgd_monitor;
pub use kgd_power_menu;
pub use kgd_presenter;

use kgd_core::{CredentialStore, KeyguardResult, PowerControl, StatusBar, SystemNotifier};
use kgd_mediator::{launch, KeyguardEvent, KeyguardMediatorHandle, MediatorDeps};
use kgd_monitor::{DeviceFacts, MonitorHandle, Notification, UpdateMonitor, UpdateMonitorState};
use kgd_power_menu::{PowerMenu, PowerMenuHandler};
use kgd_presenter::{LockScreenPresenter, PresenterDeps, ScreenFactory, WindowHost};
use tokio::sync::mpsc;

pub use config::PolicyConfig;
pub use logging::{init_logging, LogFormat};

/// Platform services the policy drives.
pub struct PolicyDeps {
    pub credentials: Arc<dyn CredentialStore>,
    pub host: Box<dyn WindowHost>,
    pub screens: Box<dyn ScreenFactory>,
    pub power: Arc<dyn PowerControl>,
    pub status_bar: Option<Arc<dyn StatusBar>>,
    pub notifier: Option<Arc<dyn SystemNotifier>>,
    pub menu_handler: Arc<dyn PowerMenuHandler>,
}

/// A running keyguard policy.
pub struct KeyguardPolicy {
    monitor: UpdateMonitorState,
    monitor_handle: MonitorHandle,
    handle: KeyguardMediatorHandle,
    mediator_task: tokio::task::JoinHandle<()>,
    power_menu: PowerMenu,
}

impl KeyguardPolicy {
    /// Validate `config` and start the monitor and mediator tasks. Returns
    /// the policy and the mediator's status event stream.
    pub fn start(
        config: PolicyConfig,
        facts: DeviceFacts,
        deps: PolicyDeps,
    ) -> KeyguardResult<(Self, mpsc::Receiver<KeyguardEvent>)> {
        config.keyguard.validate()?;
        let PolicyConfig { keyguard, power_menu } = config;

        let monitor = UpdateMonitor::with_facts(facts);
        let monitor_handle = monitor.spawn_delivery();

        let presenter = LockScreenPresenter::new(
            keyguard.clone(),
            PresenterDeps {
                monitor: Arc::clone(&monitor),
                credentials: deps.credentials,
                host: deps.host,
                screens: deps.screens,
            },
        );
        let mediator = launch(
            keyguard,
            MediatorDeps {
                monitor: Arc::clone(&monitor),
                presenter,
                power: deps.power,
                status_bar: deps.status_bar,
                notifier: deps.notifier,
            },
        );
        log::info!("[policy] keyguard policy started");

        let policy = Self {
            monitor,
            monitor_handle,
            handle: mediator.handle,
            mediator_task: mediator.join_handle,
            power_menu: PowerMenu::new(power_menu, deps.menu_handler),
        };
        Ok((policy, mediator.event_rx))
    }

    pub fn keyguard(&self) -> &KeyguardMediatorHandle {
        &self.handle
    }

    pub fn monitor(&self) -> &UpdateMonitorState {
        &self.monitor
    }

    /// Queue a platform broadcast for the update monitor.
    pub fn post(&self, notification: Notification) -> bool {
        self.monitor_handle.post(notification)
    }

    /// Open the power menu filtered by the current lock state.
    pub fn show_power_menu(&mut self) -> &mut PowerMenu {
        let provisioned = self.monitor.is_device_provisioned();
        self.power_menu.show(&self.handle, provisioned);
        &mut self.power_menu
    }

    pub fn power_menu(&mut self) -> &mut PowerMenu {
        &mut self.power_menu
    }

    /// Stop both tasks and wait for the mediator to finish.
    pub async fn shutdown(self) {
        if self.handle.shutdown().is_err() {
            log::debug!("[policy] mediator already stopped");
        }
        if let Err(e) = self.mediator_task.await {
            log::error!("[policy] mediator task failed: {}", e);
        }
        self.monitor_handle.join_handle.abort();
        log::info!("[policy] keyguard policy stopped");
    }
}
