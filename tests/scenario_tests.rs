//! End-to-end keyguard flows through a fully wired policy.

mod common;

use std::time::Duration;

use common::{booted_secure, RigBuilder};
use kgd_lib::kgd_core::{ScreenOffReason, UnlockMethod, WakeLockKind};
use kgd_lib::kgd_mediator::{KeyguardEvent, KeyguardState};
use kgd_lib::kgd_monitor::Notification;
use kgd_lib::kgd_power_menu::{PowerMenuAction, PowerMenuConfig};
use kgd_lib::kgd_presenter::{AttemptOutcome, ScreenEvent, ScreenKind, UserInput};
use tokio::time::{sleep, Instant};

const PATTERN: [u8; 5] = [0, 3, 6, 7, 8];

// ── SIM lock ────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn sim_pin_while_hidden_shows_sim_unlock() {
    let rig = RigBuilder::new().start();
    let keyguard = rig.keyguard();
    keyguard.on_system_ready().unwrap();
    keyguard.sync().await.unwrap();
    assert_eq!(keyguard.state(), KeyguardState::ShowingInsecureSlide);

    let outcome = keyguard.submit(UserInput::GoToUnlockScreen).await.unwrap();
    assert_eq!(outcome, AttemptOutcome::Accepted);
    assert_eq!(keyguard.state(), KeyguardState::Hidden);

    rig.screens.clear();
    rig.deliver(Notification::SimStateChanged {
        state: "LOCKED".into(),
        reason: Some("PIN".into()),
    })
    .await;

    assert_eq!(keyguard.state(), KeyguardState::ShowingSecure);
    assert!(rig
        .screens
        .events()
        .contains(&ScreenEvent::Created(ScreenKind::Unlock(UnlockMethod::SimPin))));
    assert!(rig.host.record().needs_input);

    rig.credentials.set_sim_pin("1234");
    let outcome = keyguard.submit(UserInput::SimPin("0000".into())).await.unwrap();
    assert!(matches!(outcome, AttemptOutcome::Rejected { .. }));
    assert_eq!(keyguard.state(), KeyguardState::ShowingSecure);

    let outcome = keyguard.submit(UserInput::SimPin("1234".into())).await.unwrap();
    assert_eq!(outcome, AttemptOutcome::Accepted);
    keyguard.sync().await.unwrap();
    assert_eq!(keyguard.state(), KeyguardState::Hidden);
}

#[tokio::test(start_paused = true)]
async fn sim_puk_replaces_pin() {
    let rig = RigBuilder::new().start();
    let keyguard = rig.keyguard();
    keyguard.on_system_ready().unwrap();
    keyguard.sync().await.unwrap();
    rig.deliver(Notification::SimStateChanged {
        state: "LOCKED".into(),
        reason: Some("PUK".into()),
    })
    .await;
    assert_eq!(keyguard.state(), KeyguardState::ShowingSecure);

    rig.credentials.set_sim_puk("12345678");
    let outcome = keyguard
        .submit(UserInput::SimPuk { puk: "12345678".into(), new_pin: "4321".into() })
        .await
        .unwrap();
    assert_eq!(outcome, AttemptOutcome::Accepted);
    keyguard.sync().await.unwrap();
    assert_eq!(keyguard.state(), KeyguardState::Hidden);
}

// ── External disable / re-enable ────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn reenable_blocks_until_draw_timeout() {
    let rig = RigBuilder::new().pattern(&PATTERN).deferred_draw().start();
    let keyguard = rig.keyguard();
    keyguard.on_system_ready().unwrap();
    keyguard.sync().await.unwrap();
    assert_eq!(keyguard.state(), KeyguardState::ShowingSecure);

    keyguard.set_keyguard_enabled(false).await.unwrap();
    assert_eq!(keyguard.state(), KeyguardState::Hidden);
    assert!(keyguard.snapshot().input_restricted);
    assert!(!rig.host.record().attached);

    let started = Instant::now();
    keyguard.set_keyguard_enabled(true).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(2000));
    assert_eq!(keyguard.state(), KeyguardState::ShowingSecure);
    assert!(rig.host.record().attached);
}

#[tokio::test(start_paused = true)]
async fn reenable_returns_on_draw() {
    let rig = RigBuilder::new().pattern(&PATTERN).start();
    let keyguard = rig.keyguard();
    keyguard.on_system_ready().unwrap();
    keyguard.set_keyguard_enabled(false).await.unwrap();

    let started = Instant::now();
    keyguard.set_keyguard_enabled(true).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(2000));
    assert_eq!(keyguard.state(), KeyguardState::ShowingSecure);
}

#[test]
fn blocking_reenable_from_plain_thread() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let rig = runtime.block_on(async {
        let rig = RigBuilder::new().pattern(&PATTERN).start();
        rig.keyguard().on_system_ready().unwrap();
        rig.keyguard().set_keyguard_enabled(false).await.unwrap();
        rig
    });

    let keyguard = rig.keyguard();
    std::thread::spawn(move || keyguard.set_keyguard_enabled_blocking(true))
        .join()
        .unwrap()
        .unwrap();
    assert_eq!(rig.keyguard().state(), KeyguardState::ShowingSecure);
    drop(rig);
}

// ── Two-stage delayed lock ──────────────────────────────────────────────

fn two_stage() -> RigBuilder {
    RigBuilder::new().pattern(&PATTERN).keyguard(|c| {
        c.separate_slide_delay = true;
        c.slide_timeout_delay_ms = 0;
        c.lock_after_timeout_ms = 5000;
    })
}

async fn unlock(keyguard: &kgd_lib::kgd_mediator::KeyguardMediatorHandle) {
    keyguard.submit(UserInput::GoToUnlockScreen).await.unwrap();
    let outcome = keyguard.submit(UserInput::Pattern(PATTERN.to_vec())).await.unwrap();
    assert_eq!(outcome, AttemptOutcome::Accepted);
    assert_eq!(keyguard.state(), KeyguardState::Hidden);
}

#[tokio::test(start_paused = true)]
async fn slide_escalates_after_security_delay() {
    let rig = two_stage().start();
    let keyguard = rig.keyguard();
    keyguard.on_system_ready().unwrap();
    unlock(&keyguard).await;

    keyguard.on_screen_turned_off(ScreenOffReason::Timeout).unwrap();
    keyguard.sync().await.unwrap();
    assert_eq!(keyguard.state(), KeyguardState::ShowingInsecureSlide);

    sleep(Duration::from_millis(5100)).await;
    keyguard.sync().await.unwrap();
    assert_eq!(keyguard.state(), KeyguardState::ShowingSecure);
}

#[tokio::test(start_paused = true)]
async fn screen_on_cancels_escalation() {
    let rig = two_stage().start();
    let keyguard = rig.keyguard();
    keyguard.on_system_ready().unwrap();
    unlock(&keyguard).await;

    keyguard.on_screen_turned_off(ScreenOffReason::Timeout).unwrap();
    keyguard.sync().await.unwrap();
    assert_eq!(keyguard.state(), KeyguardState::ShowingInsecureSlide);

    sleep(Duration::from_millis(3000)).await;
    keyguard.on_screen_turned_on().unwrap();
    sleep(Duration::from_millis(4000)).await;
    keyguard.sync().await.unwrap();
    assert_eq!(keyguard.state(), KeyguardState::ShowingInsecureSlide);

    // The slide screen still dismisses without a credential.
    let outcome = keyguard.submit(UserInput::GoToUnlockScreen).await.unwrap();
    assert_eq!(outcome, AttemptOutcome::Accepted);
    assert_eq!(keyguard.state(), KeyguardState::Hidden);
}

#[tokio::test(start_paused = true)]
async fn keyguard_timeout_secures_slide_screen() {
    let rig = two_stage().start();
    let keyguard = rig.keyguard();
    keyguard.on_system_ready().unwrap();
    unlock(&keyguard).await;

    keyguard.on_screen_turned_off(ScreenOffReason::Timeout).unwrap();
    keyguard.sync().await.unwrap();
    assert_eq!(keyguard.state(), KeyguardState::ShowingInsecureSlide);

    keyguard.do_keyguard_timeout().unwrap();
    keyguard.on_screen_turned_on().unwrap();
    sleep(Duration::from_millis(6000)).await;
    keyguard.sync().await.unwrap();
    assert_eq!(keyguard.state(), KeyguardState::ShowingSecure);

    // Sliding now leads to the pattern screen instead of unlocking.
    keyguard.submit(UserInput::GoToUnlockScreen).await.unwrap();
    assert_eq!(keyguard.state(), KeyguardState::ShowingSecure);
    unlock_from_pattern(&keyguard).await;
}

async fn unlock_from_pattern(keyguard: &kgd_lib::kgd_mediator::KeyguardMediatorHandle) {
    let outcome = keyguard.submit(UserInput::Pattern(PATTERN.to_vec())).await.unwrap();
    assert_eq!(outcome, AttemptOutcome::Accepted);
    assert_eq!(keyguard.state(), KeyguardState::Hidden);
}

#[tokio::test(start_paused = true)]
async fn screen_off_during_slide_rearms_escalation() {
    let rig = two_stage().start();
    let keyguard = rig.keyguard();
    keyguard.on_system_ready().unwrap();
    unlock(&keyguard).await;

    keyguard.on_screen_turned_off(ScreenOffReason::Timeout).unwrap();
    sleep(Duration::from_millis(1000)).await;
    keyguard.on_screen_turned_on().unwrap();
    sleep(Duration::from_millis(1000)).await;
    keyguard.on_screen_turned_off(ScreenOffReason::User).unwrap();

    sleep(Duration::from_millis(4900)).await;
    keyguard.sync().await.unwrap();
    assert_eq!(keyguard.state(), KeyguardState::ShowingInsecureSlide);

    sleep(Duration::from_millis(200)).await;
    keyguard.sync().await.unwrap();
    assert_eq!(keyguard.state(), KeyguardState::ShowingSecure);
}

#[tokio::test(start_paused = true)]
async fn proximity_screen_off_never_locks() {
    let rig = RigBuilder::new().pattern(&PATTERN).start();
    let keyguard = rig.keyguard();
    keyguard.on_system_ready().unwrap();
    unlock(&keyguard).await;

    keyguard.on_screen_turned_off(ScreenOffReason::ProximitySensor).unwrap();
    sleep(Duration::from_secs(60)).await;
    keyguard.sync().await.unwrap();
    assert_eq!(keyguard.state(), KeyguardState::Hidden);
}

// ── Verification ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn verify_while_enabled_fails_without_ui() {
    let rig = booted_secure().await;
    let keyguard = rig.keyguard();
    rig.screens.clear();

    assert!(!keyguard.verify_unlock().await);
    assert_eq!(keyguard.state(), KeyguardState::ShowingSecure);
    assert!(rig.screens.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancelled_verification_resolves_false() {
    let rig = booted_secure().await;
    let keyguard = rig.keyguard();
    keyguard.set_keyguard_enabled(false).await.unwrap();

    let pending = {
        let keyguard = keyguard.clone();
        tokio::spawn(async move { keyguard.verify_unlock().await })
    };
    sleep(Duration::from_millis(10)).await;
    assert_eq!(keyguard.state(), KeyguardState::VerifyingExternal);

    keyguard.submit(UserInput::GoToLockScreen).await.unwrap();
    assert!(!pending.await.unwrap());
    assert_eq!(keyguard.state(), KeyguardState::Hidden);
}

// ── Authentication side effects ─────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn unlock_reports_user_present() {
    let mut rig = booted_secure().await;
    let keyguard = rig.keyguard();
    assert_eq!(rig.power.user_activity_enabled(), Some(false));

    unlock(&keyguard).await;

    assert_eq!(rig.notifier.user_present_count(), 1);
    assert_eq!(rig.notifier.lock_screen_shown(), Some(false));
    assert_eq!(rig.power.user_activity_enabled(), Some(true));
    assert!(!rig.power.is_held(WakeLockKind::Poke));
    assert_eq!(rig.status_bar.last_flags(), Some(Default::default()));

    let events = rig.drain_events();
    assert_eq!(
        events,
        vec![
            KeyguardEvent::StateChanged { state: KeyguardState::ShowingSecure },
            KeyguardEvent::UserPresent,
            KeyguardEvent::StateChanged { state: KeyguardState::Hidden },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn provisioning_announces_user_present() {
    let facts = kgd_lib::kgd_monitor::DeviceFacts {
        device_provisioned: false,
        ..common::provisioned()
    };
    let rig = RigBuilder::new().facts(facts).start();
    let keyguard = rig.keyguard();
    keyguard.on_system_ready().unwrap();
    keyguard.sync().await.unwrap();
    assert_eq!(keyguard.state(), KeyguardState::Hidden);
    assert!(keyguard.is_input_restricted());

    rig.deliver(Notification::DeviceProvisioned(true)).await;
    assert_eq!(rig.notifier.user_present_count(), 1);
    assert!(!keyguard.is_input_restricted());
}

#[tokio::test(start_paused = true)]
async fn call_ending_with_screen_off_relocks() {
    let rig = RigBuilder::new().pattern(&PATTERN).start();
    let keyguard = rig.keyguard();
    keyguard.on_system_ready().unwrap();
    unlock(&keyguard).await;

    rig.deliver(Notification::PhoneStateChanged("OFFHOOK".into())).await;
    keyguard.on_screen_turned_off(ScreenOffReason::ProximitySensor).unwrap();
    keyguard.sync().await.unwrap();
    assert_eq!(keyguard.state(), KeyguardState::Hidden);
    rig.deliver(Notification::PhoneStateChanged("IDLE".into())).await;
    assert_eq!(keyguard.state(), KeyguardState::ShowingSecure);
}

// ── Power menu ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn power_menu_follows_lock_state() {
    let config = PowerMenuConfig {
        entries: vec![PowerMenuAction::Reboot, PowerMenuAction::Profile],
        ..PowerMenuConfig::default()
    };
    let mut rig = RigBuilder::new().pattern(&PATTERN).power_menu(config).start();
    let keyguard = rig.keyguard();
    keyguard.on_system_ready().unwrap();
    keyguard.sync().await.unwrap();

    let visible: Vec<_> = rig
        .policy
        .show_power_menu()
        .visible_items()
        .into_iter()
        .map(|i| i.action)
        .collect();
    assert_eq!(visible, vec![PowerMenuAction::Reboot]);
    rig.policy.power_menu().dismiss();

    unlock(&keyguard).await;
    let menu = rig.policy.show_power_menu();
    assert_eq!(menu.visible_items().len(), 2);
    menu.press(1).unwrap();
    assert_eq!(rig.menu.calls(), vec!["profile"]);
}
