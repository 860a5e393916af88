//! Compiled transition model.
//!
//! [`MachineTable::compile`] turns a list of [`StateDef`]s into the runtime
//! structure the engine walks. Compilation never fails: every problem is
//! recorded as a [`Diagnostic`] and the offending entry is dropped, so a
//! caller sees all errors of a definition set at once.

use crate::definition::{label, Action, EventKey, Ident, StateDef, StateKey, Target};
use crate::error::Diagnostic;
use std::collections::{HashMap, HashSet};

/// A transition with its destination resolved.
#[derive(Debug, Clone)]
pub struct Transition<S, E, P> {
    /// Triggering event as declared.
    pub event: EventKey<E>,

    /// Destination. `Target::Stay` is already rewritten to the owning state.
    pub next: StateKey<S>,

    /// Optional action.
    pub action: Option<Action<S, E, P>>,
}

/// Runtime form of a state.
#[derive(Debug, Clone)]
pub struct CompiledState<S, E, P> {
    key: StateKey<S>,
    entry: Option<Action<S, E, P>>,
    exit: Option<Action<S, E, P>>,
    transitions: HashMap<E, Transition<S, E, P>>,
    fallback: Option<Transition<S, E, P>>,
}

impl<S: Ident, E: Ident, P> CompiledState<S, E, P> {
    pub fn key(&self) -> &StateKey<S> {
        &self.key
    }

    pub fn entry(&self) -> Option<&Action<S, E, P>> {
        self.entry.as_ref()
    }

    pub fn exit(&self) -> Option<&Action<S, E, P>> {
        self.exit.as_ref()
    }

    /// Finds the transition this state takes for `event`: the exact match
    /// first, then the state's own fallback.
    pub fn lookup(&self, event: &E) -> Option<&Transition<S, E, P>> {
        self.transitions.get(event).or(self.fallback.as_ref())
    }

    /// Returns the explicit transition for `event`, ignoring the fallback.
    pub fn transition(&self, event: &E) -> Option<&Transition<S, E, P>> {
        self.transitions.get(event)
    }

    pub fn fallback(&self) -> Option<&Transition<S, E, P>> {
        self.fallback.as_ref()
    }

    /// Number of explicit (non-fallback) transitions.
    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    /// Compiles one state definition.
    ///
    /// `declared` holds every state key the table will contain; transitions
    /// naming anything else are dropped.
    fn compile(
        def: &StateDef<S, E, P>,
        declared: &HashSet<StateKey<S>>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Self {
        let state_label = def.key.to_string();

        if def.transitions.is_empty() {
            diagnostics.push(Diagnostic::EmptyState {
                state: state_label.clone(),
            });
        }

        // First declaration of each event wins, whatever its target.
        let mut kept = Vec::with_capacity(def.transitions.len());
        let mut seen_events = HashSet::new();
        let mut seen_fallback = false;

        for t in &def.transitions {
            match &t.event {
                EventKey::Any if seen_fallback => {
                    diagnostics.push(Diagnostic::DuplicateDefaultTransition {
                        state: state_label.clone(),
                    });
                }
                EventKey::Any => {
                    seen_fallback = true;
                    kept.push(t);
                }
                EventKey::Id(event) if !seen_events.insert(event) => {
                    diagnostics.push(Diagnostic::DuplicateTransition {
                        state: state_label.clone(),
                        event: label(event),
                    });
                }
                EventKey::Id(_) => kept.push(t),
            }
        }

        let mut transitions = HashMap::new();
        let mut fallback = None;

        for t in kept {
            let next = match &t.target {
                Target::Stay => def.key.clone(),
                Target::To(key) => key.clone(),
            };

            if !declared.contains(&next) {
                diagnostics.push(Diagnostic::UndeclaredTarget {
                    state: state_label.clone(),
                    event: t.event.to_string(),
                    target: next.to_string(),
                });
                continue;
            }

            let compiled = Transition {
                event: t.event.clone(),
                next,
                action: t.action.clone(),
            };

            match &t.event {
                EventKey::Any => fallback = Some(compiled),
                EventKey::Id(event) => {
                    transitions.insert(event.clone(), compiled);
                }
            }
        }

        Self {
            key: def.key.clone(),
            entry: def.entry.clone(),
            exit: def.exit.clone(),
            transitions,
            fallback,
        }
    }
}

/// All compiled states of one machine plus the optional default state.
#[derive(Debug, Clone)]
pub struct MachineTable<S, E, P> {
    states: HashMap<S, CompiledState<S, E, P>>,
    default_state: Option<CompiledState<S, E, P>>,
    /// State ids in declaration order.
    order: Vec<S>,
    initial: Option<S>,
}

impl<S: Ident, E: Ident, P> MachineTable<S, E, P> {
    /// Compiles and validates a definition set.
    ///
    /// Returns the table and every diagnostic found. The table's initial
    /// state is set only if `initial` names a declared, non-default state.
    pub fn compile(
        definitions: &[StateDef<S, E, P>],
        initial: &StateKey<S>,
    ) -> (Self, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();

        // Partition into the default state and named states, dropping duplicates.
        let mut default_def = None;
        let mut named = Vec::new();
        let mut declared = HashSet::new();

        for def in definitions {
            match &def.key {
                StateKey::Default => {
                    if default_def.is_some() {
                        diagnostics.push(Diagnostic::DuplicateDefaultState);
                        continue;
                    }
                    default_def = Some(def);
                }
                StateKey::Id(id) => {
                    if declared.contains(&def.key) {
                        diagnostics.push(Diagnostic::DuplicateState { state: label(id) });
                        continue;
                    }
                    named.push((id, def));
                }
            }
            declared.insert(def.key.clone());
        }

        let mut states = HashMap::with_capacity(named.len());
        let mut order = Vec::with_capacity(named.len());
        for (id, def) in named {
            states.insert(
                id.clone(),
                CompiledState::compile(def, &declared, &mut diagnostics),
            );
            order.push(id.clone());
        }

        let default_state =
            default_def.map(|def| CompiledState::compile(def, &declared, &mut diagnostics));

        let initial = match initial {
            StateKey::Default => {
                diagnostics.push(Diagnostic::DefaultInitialState);
                None
            }
            StateKey::Id(id) if states.contains_key(id) => Some(id.clone()),
            StateKey::Id(id) => {
                diagnostics.push(Diagnostic::UndeclaredInitialState { state: label(id) });
                None
            }
        };

        for diagnostic in &diagnostics {
            tracing::warn!(
                target: "sparsefsm::table",
                category = "validate",
                code = diagnostic.error_code(),
                "{}",
                diagnostic
            );
        }

        let table = Self {
            states,
            default_state,
            order,
            initial,
        };
        (table, diagnostics)
    }

    /// Looks up a compiled state by key.
    pub fn state(&self, key: &StateKey<S>) -> Option<&CompiledState<S, E, P>> {
        match key {
            StateKey::Default => self.default_state.as_ref(),
            StateKey::Id(id) => self.states.get(id),
        }
    }

    pub fn default_state(&self) -> Option<&CompiledState<S, E, P>> {
        self.default_state.as_ref()
    }

    /// Returns true if `key` names a state in this table.
    pub fn contains(&self, key: &StateKey<S>) -> bool {
        self.state(key).is_some()
    }

    /// The validated initial state, if it passed validation.
    pub fn initial(&self) -> Option<&S> {
        self.initial.as_ref()
    }

    /// Named states in declaration order.
    pub fn states(&self) -> impl Iterator<Item = &CompiledState<S, E, P>> {
        self.order.iter().filter_map(|id| self.states.get(id))
    }

    /// Number of named states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
