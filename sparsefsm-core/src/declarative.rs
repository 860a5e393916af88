//! Declarative machine tables.
//!
//! Tables use a JSON (or YAML) DSL with string identifiers. Actions are
//! referenced by name and bound through an [`ActionRegistry`]:
//!
//! ```json
//! {
//!   "initial": "locked",
//!   "states": [
//!     {"name": "locked", "entry": "clear", "transitions": [
//!       {"event": "digit", "action": "push_digit"},
//!       {"event": "open", "to": "unlocked"}
//!     ]},
//!     {"name": "unlocked", "transitions": [
//!       {"event": "lock", "to": "locked"},
//!       {"event": "*", "action": "ignore"}
//!     ]},
//!     {"transitions": [{"event": "shutdown", "to": "locked"}]}
//!   ]
//! }
//! ```
//!
//! - a state without `name` is the default state
//! - event `"*"` is the state's fallback transition
//! - a transition without `to` stays in its state; `to: "*"` targets the default state

use crate::definition::{Action, EventKey, StateDef, StateKey, Target, TransitionDef};
use crate::engine::ActionContext;
use crate::error::{ActionError, CoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Reserved token for the default event and the default-state target.
pub const WILDCARD: &str = "*";

/// Engine type for declarative tables.
pub type DynamicEngine = crate::engine::Engine<String, String, Value>;

/// State definition type for declarative tables.
pub type DynamicStateDef = StateDef<String, String, Value>;

/// A transition as written in a table file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    /// Event name, or `"*"`.
    pub event: String,

    /// Target state, `"*"` for the default state, absent to stay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    /// Registered action name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// A state as written in a table file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSpec {
    /// State name; absent for the default state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<String>,

    #[serde(default)]
    pub transitions: Vec<TransitionSpec>,
}

/// A whole machine as written in a table file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Initial state name.
    pub initial: String,

    /// States in declaration order.
    pub states: Vec<StateSpec>,

    /// Optional metadata, ignored by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl TableSpec {
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, CoreError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Loads a table file. `.yaml`/`.yml` files are read as YAML, anything
    /// else as JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    /// Returns the table as JSON.
    pub fn to_json(&self) -> Result<Value, CoreError> {
        Ok(serde_json::to_value(self)?)
    }

    /// CRC32C of the canonical JSON encoding, for integrity checks.
    pub fn checksum(&self) -> Result<String, CoreError> {
        let json_bytes = serde_json::to_vec(self)?;
        Ok(format!("{:08x}", crc32c::crc32c(&json_bytes)))
    }

    /// Every action name referenced by the table, in declaration order.
    pub fn action_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for state in &self.states {
            names.extend(state.entry.as_deref());
            names.extend(state.exit.as_deref());
            names.extend(state.transitions.iter().filter_map(|t| t.action.as_deref()));
        }
        names
    }

    /// Builds engine definitions, binding action names through `registry`.
    ///
    /// Structural problems (duplicates, undeclared targets) are left for
    /// validation to report; only unbindable names fail here.
    pub fn build<P>(
        &self,
        registry: &ActionRegistry<P>,
    ) -> Result<(Vec<StateDef<String, String, P>>, StateKey<String>), CoreError> {
        if self.initial == WILDCARD {
            return Err(CoreError::InvalidTable {
                reason: "initial state cannot be the default state".to_string(),
            });
        }

        let mut definitions = Vec::with_capacity(self.states.len());
        for state in &self.states {
            let key = match state.name.as_deref() {
                None => StateKey::Default,
                Some(WILDCARD) => {
                    return Err(CoreError::InvalidTable {
                        reason: format!("'{}' is reserved and cannot name a state", WILDCARD),
                    })
                }
                Some(name) => StateKey::Id(name.to_string()),
            };
            let state_label = key.to_string();

            let mut def = StateDef::with_key(key);
            if let Some(name) = &state.entry {
                def = def.on_entry(registry.resolve(&state_label, name)?);
            }
            if let Some(name) = &state.exit {
                def = def.on_exit(registry.resolve(&state_label, name)?);
            }

            for t in &state.transitions {
                let event = if t.event == WILDCARD {
                    EventKey::Any
                } else {
                    EventKey::Id(t.event.clone())
                };
                let target = match t.to.as_deref() {
                    None => Target::Stay,
                    Some(WILDCARD) => Target::default_state(),
                    Some(name) => Target::To(StateKey::Id(name.to_string())),
                };
                let mut transition: TransitionDef<String, String, P> =
                    TransitionDef::new(event, target);
                if let Some(name) = &t.action {
                    transition = transition.with_action(registry.resolve(&state_label, name)?);
                }
                def = def.transition(transition);
            }

            definitions.push(def);
        }

        Ok((definitions, StateKey::Id(self.initial.clone())))
    }
}

/// Named actions available to declarative tables.
pub struct ActionRegistry<P> {
    actions: HashMap<String, Action<String, String, P>>,
}

impl<P> ActionRegistry<P> {
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Registers an action under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(&ActionContext<'_, String, String, P>, Option<&P>) -> Result<(), ActionError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        self.actions.insert(name.clone(), Action::new(name, func));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Action<String, String, P>> {
        self.actions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    fn resolve(&self, state: &str, name: &str) -> Result<Action<String, String, P>, CoreError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| CoreError::UnknownAction {
                state: state.to_string(),
                name: name.to_string(),
            })
    }
}

impl<P> Default for ActionRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}
