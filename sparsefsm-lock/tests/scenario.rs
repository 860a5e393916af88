//! End-to-end combination lock scenarios.

use sparsefsm_core::{ActionPhase, Diagnostic, EngineConfig, StateKey, UnresolvedPolicy};
use sparsefsm_lock::{CombinationLock, LockConfig, LockEvent, LockState};

fn lock_with(combination: Vec<u8>, start_locked: bool) -> CombinationLock {
    CombinationLock::new(
        &LockConfig {
            combination,
            start_locked,
        },
        EngineConfig::default(),
    )
}

fn state(key: LockState) -> Option<StateKey<LockState>> {
    Some(StateKey::Id(key))
}

#[test]
fn starts_locked_when_hardware_is_locked() {
    let lock = lock_with(vec![0, 0, 0], true);

    assert!(lock.engine().diagnostics().is_empty());
    assert_eq!(lock.state(), state(LockState::Locked));
    assert!(lock.hardware().is_locked());
}

#[test]
fn starts_unlocked_when_hardware_is_open() {
    let lock = lock_with(vec![0, 0, 0], false);
    assert_eq!(lock.state(), state(LockState::Unlocked));
    assert!(!lock.hardware().is_locked());
}

#[test]
fn correct_combination_unlocks() {
    let lock = lock_with(vec![0, 0, 0], true);

    lock.press(0).unwrap();
    lock.press(0).unwrap();
    assert_eq!(lock.state(), state(LockState::Locked));
    assert_eq!(lock.hardware().entered(), vec![0, 0]);

    lock.press(0).unwrap();
    assert_eq!(lock.state(), state(LockState::Unlocked));
    assert!(!lock.hardware().is_locked());
}

#[test]
fn wrong_combination_stays_locked() {
    let lock = lock_with(vec![4, 2], true);

    lock.press(4).unwrap();
    lock.press(1).unwrap();
    assert_eq!(lock.state(), state(LockState::Locked));
    assert!(lock.hardware().entered().is_empty());

    lock.press(4).unwrap();
    lock.press(2).unwrap();
    assert_eq!(lock.state(), state(LockState::Unlocked));
}

#[test]
fn unlocked_fallback_swallows_unrelated_events() {
    let lock = lock_with(vec![0, 0, 0], false);

    lock.send(LockEvent::Garbage).unwrap();
    lock.press(5).unwrap();
    // Unlocked's own fallback wins over the default state's Shutdown.
    lock.send(LockEvent::Shutdown).unwrap();

    assert_eq!(lock.state(), state(LockState::Unlocked));
    assert_eq!(lock.hardware().ignored(), 3);
    assert!(!lock.engine().is_halted());
}

#[test]
fn garbage_while_locked_halts_the_machine() {
    let lock = lock_with(vec![0, 0, 0], true);

    let err = lock.send(LockEvent::Garbage).unwrap_err();
    assert_eq!(
        err,
        vec![Diagnostic::UnresolvedEvent {
            state: "Locked".to_string(),
            event: "Garbage".to_string(),
        }]
    );
    assert!(lock.engine().is_halted());
    assert_eq!(lock.state(), state(LockState::Locked));

    assert_eq!(lock.press(0).unwrap_err(), vec![Diagnostic::Halted]);
    assert!(lock.hardware().entered().is_empty());

    assert!(lock.reset().is_empty());
    assert!(!lock.engine().is_halted());
    assert_eq!(lock.state(), state(LockState::Locked));
}

#[test]
fn shutdown_is_handled_by_the_default_state() {
    let lock = lock_with(vec![0, 0, 0], false);

    lock.send(LockEvent::SetCombo).unwrap();
    assert_eq!(lock.state(), state(LockState::SettingCombo));

    lock.send(LockEvent::Shutdown).unwrap();
    assert_eq!(lock.state(), state(LockState::Locked));
    assert!(lock.hardware().is_locked());

    // Already locked: handled in place, no state change.
    lock.send(LockEvent::Shutdown).unwrap();
    assert_eq!(lock.state(), state(LockState::Locked));
}

#[test]
fn setting_a_new_combination() {
    let lock = lock_with(vec![0, 0, 0], false);

    lock.send(LockEvent::SetCombo).unwrap();
    lock.press(1).unwrap();
    lock.press(2).unwrap();
    lock.press(3).unwrap();

    assert_eq!(lock.state(), state(LockState::Locked));
    assert_eq!(lock.hardware().combination(), vec![1, 2, 3]);

    for digit in [0, 0, 0] {
        lock.press(digit).unwrap();
    }
    assert_eq!(lock.state(), state(LockState::Locked));

    for digit in [1, 2, 3] {
        lock.press(digit).unwrap();
    }
    assert_eq!(lock.state(), state(LockState::Unlocked));
}

#[test]
fn digit_without_payload_fails_the_action() {
    let lock = lock_with(vec![0, 0, 0], true);

    let err = lock.send(LockEvent::Digit).unwrap_err();
    assert!(matches!(
        &err[..],
        [Diagnostic::ActionFailed { phase: ActionPhase::Transition, action, .. }]
            if action == "check_digit"
    ));
    assert_eq!(lock.state(), state(LockState::Locked));
    assert!(lock.engine().is_halted());
}

#[test]
fn fall_to_default_policy_keeps_running() {
    let lock = CombinationLock::new(
        &LockConfig::default(),
        EngineConfig::new().with_unresolved_policy(UnresolvedPolicy::FallToDefault),
    );

    lock.send(LockEvent::Garbage).unwrap();
    assert_eq!(lock.state(), Some(StateKey::Default));

    lock.send(LockEvent::Shutdown).unwrap();
    assert_eq!(lock.state(), state(LockState::Locked));
}
