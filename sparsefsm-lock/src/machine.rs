//! The combination lock machine.
//!
//! ```text
//! Initial --Lock--> Locked --Open--> Unlocked --SetCombo--> SettingCombo
//!                    ^  |  Digit (stay)   |  * (stay)          |  Digit (stay)
//!                    |  +-----------------+--Lock--------------+--Lock
//! (default): Shutdown -> Locked
//! ```

use crate::hardware::{LockConfig, LockError, LockHardware};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sparsefsm_core::{
    Action, ActionContext, ActionError, Diagnostic, Engine, EngineConfig, StateDef, StateKey,
    Target,
};
use std::sync::Arc;

/// Lock states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockState {
    Initial,
    Locked,
    Unlocked,
    SettingCombo,
}

/// Lock events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockEvent {
    Digit,
    Lock,
    Open,
    SetCombo,
    Shutdown,
    /// Not handled anywhere except by Unlocked's fallback.
    Garbage,
}

impl std::str::FromStr for LockEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "digit" => Ok(LockEvent::Digit),
            "lock" => Ok(LockEvent::Lock),
            "open" => Ok(LockEvent::Open),
            "setcombo" | "set-combo" => Ok(LockEvent::SetCombo),
            "shutdown" => Ok(LockEvent::Shutdown),
            "garbage" => Ok(LockEvent::Garbage),
            other => Err(format!("unknown lock event: {}", other)),
        }
    }
}

pub type LockEngine = Engine<LockState, LockEvent, Value>;
pub type LockStateDef = StateDef<LockState, LockEvent, Value>;
type LockContext<'a> = ActionContext<'a, LockState, LockEvent, Value>;

/// Payload for a digit event.
pub fn digit_payload(digit: u8) -> Value {
    json!({ "digit": digit })
}

fn read_digit(payload: Option<&Value>) -> Result<u8, LockError> {
    let value = payload
        .and_then(|p| p.get("digit"))
        .and_then(Value::as_u64)
        .ok_or(LockError::MissingDigit)?;
    if value > 9 {
        return Err(LockError::InvalidDigit(value));
    }
    Ok(value as u8)
}

fn submit(ctx: &LockContext<'_>, event: LockEvent) -> Result<(), ActionError> {
    ctx.submit_event(event, Value::Null).map_err(|diagnostics| {
        let reasons: Vec<String> = diagnostics.iter().map(|d| d.to_string()).collect();
        ActionError::new(reasons.join("; "))
    })
}

/// Builds the lock's state definitions around `hardware`.
pub fn definitions(hardware: &Arc<LockHardware>) -> Vec<LockStateDef> {
    let hw = Arc::clone(hardware);
    let check_hardware = Action::new("check_hardware", move |ctx: &LockContext<'_>, _| {
        if hw.is_locked() {
            submit(ctx, LockEvent::Lock)
        } else {
            submit(ctx, LockEvent::Open)
        }
    });

    let hw = Arc::clone(hardware);
    let engage = Action::new("engage_bolt", move |_, _| {
        hw.set_locked(true);
        hw.clear_entered();
        Ok(())
    });

    let hw = Arc::clone(hardware);
    let check_digit = Action::new("check_digit", move |ctx: &LockContext<'_>, payload| {
        let digit = read_digit(payload).map_err(|e| ActionError::new(e.to_string()))?;
        match hw.enter_digit(digit) {
            Some(true) => submit(ctx, LockEvent::Open),
            Some(false) => {
                tracing::info!(target: "sparsefsm::lock", "wrong combination entered");
                Ok(())
            }
            None => Ok(()),
        }
    });

    let hw = Arc::clone(hardware);
    let release = Action::new("release_bolt", move |_, _| {
        hw.set_locked(false);
        Ok(())
    });

    let hw = Arc::clone(hardware);
    let ignore = Action::new("ignore_input", move |ctx: &LockContext<'_>, _| {
        hw.record_ignored();
        tracing::debug!(
            target: "sparsefsm::lock",
            event = ?ctx.event(),
            "input ignored while unlocked"
        );
        Ok(())
    });

    let hw = Arc::clone(hardware);
    let begin_combo = Action::new("begin_combo", move |_, _| {
        hw.begin_combination();
        Ok(())
    });

    let hw = Arc::clone(hardware);
    let record_combo = Action::new("record_combo_digit", move |ctx: &LockContext<'_>, payload| {
        let digit = read_digit(payload).map_err(|e| ActionError::new(e.to_string()))?;
        if hw.record_combination_digit(digit) {
            tracing::info!(target: "sparsefsm::lock", "new combination stored");
            submit(ctx, LockEvent::Lock)?;
        }
        Ok(())
    });

    let power_down = Action::new("power_down", |_, _| {
        tracing::info!(target: "sparsefsm::lock", "shutdown requested");
        Ok(())
    });

    vec![
        StateDef::new(LockState::Initial)
            .on_entry(check_hardware)
            .on(LockEvent::Lock, LockState::Locked)
            .on(LockEvent::Open, LockState::Unlocked),
        StateDef::new(LockState::Locked)
            .on_entry(engage)
            .on_with(LockEvent::Digit, Target::Stay, check_digit)
            .on(LockEvent::Open, LockState::Unlocked),
        StateDef::new(LockState::Unlocked)
            .on_entry(release)
            .on(LockEvent::Lock, LockState::Locked)
            .on(LockEvent::SetCombo, LockState::SettingCombo)
            .otherwise(Target::Stay, Some(ignore)),
        StateDef::new(LockState::SettingCombo)
            .on_entry(begin_combo)
            .on_with(LockEvent::Digit, Target::Stay, record_combo)
            .on(LockEvent::Lock, LockState::Locked),
        StateDef::default_state().on_with(LockEvent::Shutdown, LockState::Locked, power_down),
    ]
}

/// A lock: the engine plus the hardware its actions drive.
pub struct CombinationLock {
    engine: LockEngine,
    hardware: Arc<LockHardware>,
}

impl CombinationLock {
    pub fn new(config: &LockConfig, engine_config: EngineConfig) -> Self {
        let hardware = Arc::new(LockHardware::new(config));
        let engine = Engine::with_config(definitions(&hardware), LockState::Initial, engine_config);
        Self { engine, hardware }
    }

    /// Submits a keypad digit.
    pub fn press(&self, digit: u8) -> Result<(), Vec<Diagnostic>> {
        self.engine.submit_event(LockEvent::Digit, digit_payload(digit))
    }

    /// Submits any event without payload.
    pub fn send(&self, event: LockEvent) -> Result<(), Vec<Diagnostic>> {
        self.engine.submit_event(event, Value::Null)
    }

    /// Current state; `None` if the machine never started.
    pub fn state(&self) -> Option<StateKey<LockState>> {
        self.engine.current_state()
    }

    /// Restarts the machine after a halt. The hardware keeps its registers.
    pub fn reset(&self) -> Vec<Diagnostic> {
        self.engine.restart()
    }

    pub fn engine(&self) -> &LockEngine {
        &self.engine
    }

    pub fn hardware(&self) -> &LockHardware {
        &self.hardware
    }
}
