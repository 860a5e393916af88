//! Event processing engine - owns the compiled table, the current state and
//! the event queue.
//!
//! All mutable state sits behind one re-entrant lock per engine. A call to
//! [`Engine::submit_event`] takes the lock and drains the queue before
//! returning; calls made by actions on the same thread enqueue and return
//! immediately, leaving the event to the active drain loop. Calls from other
//! threads block until the drain completes.
//!
//! Actions run while the lock is held. An action that blocks, blocks the
//! machine.

use crate::config::{EngineConfig, UnresolvedPolicy};
use crate::definition::{label, Action, Ident, StateDef, StateKey};
use crate::error::{ActionPhase, Diagnostic};
use crate::table::{MachineTable, Transition};
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;

/// A queued event.
#[derive(Debug, Clone)]
pub struct Envelope<E, P> {
    pub event: E,
    pub payload: P,
}

/// Handle passed to every action.
pub struct ActionContext<'a, S, E, P> {
    engine: &'a Engine<S, E, P>,
    state: &'a StateKey<S>,
    event: Option<&'a E>,
}

impl<'a, S: Ident, E: Ident, P: Send + 'static> ActionContext<'a, S, E, P> {
    /// Queues an event on the machine running this action.
    ///
    /// The event is processed after everything already queued, once the
    /// current event is fully resolved.
    pub fn submit_event(&self, event: E, payload: P) -> Result<(), Vec<Diagnostic>> {
        self.engine.submit_event(event, payload)
    }

    /// The state this action belongs to.
    pub fn state(&self) -> &StateKey<S> {
        self.state
    }

    /// The event being resolved; `None` for the start-up entry action.
    pub fn event(&self) -> Option<&E> {
        self.event
    }

    pub fn engine(&self) -> &Engine<S, E, P> {
        self.engine
    }
}

struct Inner<S, E, P> {
    definitions: Arc<[StateDef<S, E, P>]>,
    initial: StateKey<S>,
    table: Arc<MachineTable<S, E, P>>,
    current: Option<StateKey<S>>,
    queue: VecDeque<Envelope<E, P>>,
    processing: bool,
    halted: bool,
    diagnostics: Vec<Diagnostic>,
}

/// The state machine engine.
pub struct Engine<S, E, P> {
    config: EngineConfig,
    inner: ReentrantMutex<RefCell<Inner<S, E, P>>>,
}

/// Clears the processing flag when a drain ends, including by panic.
struct DrainGuard<'a, S: Ident, E: Ident, P: Send + 'static> {
    engine: &'a Engine<S, E, P>,
}

impl<S: Ident, E: Ident, P: Send + 'static> Drop for DrainGuard<'_, S, E, P> {
    fn drop(&mut self) {
        self.engine.with_inner(|inner| inner.processing = false);
    }
}

impl<S: Ident, E: Ident, P: Send + 'static> Engine<S, E, P> {
    /// Compiles `definitions` and starts the machine in `initial`.
    ///
    /// Always returns an engine; check [`Engine::diagnostics`] or
    /// [`Engine::is_started`] before relying on it.
    pub fn new(definitions: Vec<StateDef<S, E, P>>, initial: impl Into<StateKey<S>>) -> Self {
        Self::with_config(definitions, initial, EngineConfig::default())
    }

    /// Same as [`Engine::new`] with an explicit configuration.
    pub fn with_config(
        definitions: Vec<StateDef<S, E, P>>,
        initial: impl Into<StateKey<S>>,
        config: EngineConfig,
    ) -> Self {
        let definitions: Arc<[StateDef<S, E, P>]> = definitions.into();
        let initial = initial.into();
        let (table, diagnostics) = MachineTable::compile(&definitions, &initial);

        let engine = Self {
            config,
            inner: ReentrantMutex::new(RefCell::new(Inner {
                definitions,
                initial,
                table: Arc::new(table),
                current: None,
                queue: VecDeque::new(),
                processing: false,
                halted: false,
                diagnostics,
            })),
        };
        engine.start();
        engine
    }

    /// Replaces the definitions, clears all runtime state and diagnostics,
    /// and starts again.
    ///
    /// Returns the diagnostics of the new definition set. Not allowed from
    /// inside an action.
    pub fn reinitialize(
        &self,
        definitions: Vec<StateDef<S, E, P>>,
        initial: impl Into<StateKey<S>>,
    ) -> Vec<Diagnostic> {
        self.reset(definitions.into(), initial.into())
    }

    /// Reinitializes with the current definitions.
    pub fn restart(&self) -> Vec<Diagnostic> {
        let (definitions, initial) =
            self.with_inner(|inner| (Arc::clone(&inner.definitions), inner.initial.clone()));
        self.reset(definitions, initial)
    }

    fn reset(
        &self,
        definitions: Arc<[StateDef<S, E, P>]>,
        initial: StateKey<S>,
    ) -> Vec<Diagnostic> {
        let _guard = self.inner.lock();

        if self.with_inner(|inner| inner.processing) {
            return vec![Diagnostic::Busy];
        }

        let (table, diagnostics) = MachineTable::compile(&definitions, &initial);
        self.with_inner(|inner| {
            inner.definitions = definitions;
            inner.initial = initial;
            inner.table = Arc::new(table);
            inner.current = None;
            inner.queue.clear();
            inner.halted = false;
            inner.diagnostics = diagnostics;
        });
        self.start();
        self.diagnostics()
    }

    /// Enters the initial state, runs its entry action and drains whatever
    /// that action queued.
    fn start(&self) {
        let _guard = self.inner.lock();

        let (table, has_errors) =
            self.with_inner(|inner| (Arc::clone(&inner.table), !inner.diagnostics.is_empty()));

        let Some(initial) = table.initial().cloned() else {
            tracing::warn!(target: "sparsefsm::engine", "machine not started: invalid initial state");
            return;
        };
        if has_errors && !self.config.start_with_errors {
            tracing::warn!(target: "sparsefsm::engine", "machine not started: definition errors");
            return;
        }

        let key = StateKey::Id(initial);
        self.with_inner(|inner| {
            inner.current = Some(key.clone());
            inner.processing = true;
        });
        let drain = DrainGuard { engine: self };

        tracing::debug!(
            target: "sparsefsm::engine",
            category = "enter",
            state = %key,
            "entering initial state"
        );

        let state = table.state(&key).expect("initial state is compiled");
        if let Some(entry) = state.entry() {
            let ctx = ActionContext {
                engine: self,
                state: &key,
                event: None,
            };
            if let Err(e) = entry.run(&ctx, None) {
                let diagnostic = action_failed(&key, ActionPhase::Entry, entry, e);
                tracing::error!(
                    target: "sparsefsm::engine",
                    category = "action_failed",
                    state = %key,
                    action = entry.name(),
                    "{}",
                    diagnostic
                );
                self.with_inner(|inner| {
                    inner.current = None;
                    inner.queue.clear();
                    inner.diagnostics.push(diagnostic);
                });
                return;
            }
        }

        // Start-up failures are kept in `diagnostics()`; there is no caller to return them to.
        let _ = self.drain();
        drop(drain);
    }

    /// Queues an event and, unless a drain is already running on this
    /// thread, processes the queue to completion.
    ///
    /// Returns the diagnostics produced by this call.
    pub fn submit_event(&self, event: E, payload: P) -> Result<(), Vec<Diagnostic>> {
        let _guard = self.inner.lock();

        let refused = self.with_inner(|inner| {
            if inner.halted {
                return Some(Diagnostic::Halted);
            }
            if inner.current.is_none() {
                return Some(Diagnostic::NotStarted);
            }
            None
        });
        if let Some(diagnostic) = refused {
            tracing::debug!(
                target: "sparsefsm::engine",
                category = "submit",
                event = %label(&event),
                "event refused: {}",
                diagnostic
            );
            return Err(vec![diagnostic]);
        }

        tracing::debug!(
            target: "sparsefsm::engine",
            category = "submit",
            event = %label(&event),
            "event submitted"
        );

        let nested = self.with_inner(|inner| {
            inner.queue.push_back(Envelope { event, payload });
            std::mem::replace(&mut inner.processing, true)
        });
        if nested {
            return Ok(());
        }

        let _drain = DrainGuard { engine: self };
        self.drain()
    }

    /// Processes queued events until the queue is empty or a hard failure
    /// halts the machine.
    fn drain(&self) -> Result<(), Vec<Diagnostic>> {
        let mut produced = Vec::new();

        loop {
            let next = self.with_inner(|inner| {
                let envelope = inner.queue.pop_front()?;
                let current = inner.current.clone()?;
                Some((envelope, current, Arc::clone(&inner.table)))
            });
            let Some((envelope, current, table)) = next else {
                break;
            };

            match self.process(&table, current, envelope) {
                Ok(()) => {}
                Err(diagnostic) => {
                    let discarded = self.with_inner(|inner| {
                        let discarded = inner.queue.len();
                        inner.queue.clear();
                        inner.halted = true;
                        inner.diagnostics.push(diagnostic.clone());
                        discarded
                    });
                    tracing::error!(
                        target: "sparsefsm::engine",
                        category = failure_category(&diagnostic),
                        discarded,
                        "machine halted: {}",
                        diagnostic
                    );
                    produced.push(diagnostic);
                    break;
                }
            }
        }

        if produced.is_empty() {
            Ok(())
        } else {
            Err(produced)
        }
    }

    /// Resolves one event against the current state, then the default state.
    fn process(
        &self,
        table: &MachineTable<S, E, P>,
        current: StateKey<S>,
        envelope: Envelope<E, P>,
    ) -> Result<(), Diagnostic> {
        let state = table
            .state(&current)
            .expect("current state is always a compiled state");

        let resolved = state.lookup(&envelope.event).or_else(|| {
            table
                .default_state()
                .and_then(|default| default.lookup(&envelope.event))
        });

        let Some(transition) = resolved else {
            return self.unresolved(table, current, envelope);
        };

        tracing::debug!(
            target: "sparsefsm::engine",
            category = "resolve",
            state = %current,
            event = %label(&envelope.event),
            next = %transition.next,
            action = transition.action.as_ref().map(|a| a.name()),
            "event resolved"
        );

        self.fire(table, &current, transition, &envelope)
    }

    /// Runs a transition's action and applies its state change.
    fn fire(
        &self,
        table: &MachineTable<S, E, P>,
        current: &StateKey<S>,
        transition: &Transition<S, E, P>,
        envelope: &Envelope<E, P>,
    ) -> Result<(), Diagnostic> {
        if let Some(action) = &transition.action {
            let ctx = ActionContext {
                engine: self,
                state: current,
                event: Some(&envelope.event),
            };
            action
                .run(&ctx, Some(&envelope.payload))
                .map_err(|e| self.report(current, ActionPhase::Transition, action, e))?;
        }

        if transition.next != *current {
            self.change_state(table, current, &transition.next, envelope)?;
        }
        Ok(())
    }

    fn unresolved(
        &self,
        table: &MachineTable<S, E, P>,
        current: StateKey<S>,
        envelope: Envelope<E, P>,
    ) -> Result<(), Diagnostic> {
        let event = label(&envelope.event);

        match self.config.unresolved {
            UnresolvedPolicy::Halt => {
                tracing::error!(
                    target: "sparsefsm::engine",
                    category = "unresolved",
                    state = %current,
                    event = %event,
                    "no transition for event"
                );
                Err(Diagnostic::UnresolvedEvent {
                    state: current.to_string(),
                    event,
                })
            }
            UnresolvedPolicy::FallToDefault => {
                tracing::warn!(
                    target: "sparsefsm::engine",
                    category = "unresolved",
                    state = %current,
                    event = %event,
                    "no transition for event, falling back to default state"
                );
                let next = StateKey::Default;
                if table.contains(&next) && next != current {
                    self.change_state(table, &current, &next, &envelope)?;
                }
                Ok(())
            }
        }
    }

    /// Exit the current state, move the pointer, enter the next one.
    ///
    /// A failing exit action leaves the pointer untouched. A failing entry
    /// action moves it back to `from`.
    fn change_state(
        &self,
        table: &MachineTable<S, E, P>,
        from: &StateKey<S>,
        to: &StateKey<S>,
        envelope: &Envelope<E, P>,
    ) -> Result<(), Diagnostic> {
        let from_state = table
            .state(from)
            .expect("current state is always a compiled state");
        let to_state = table
            .state(to)
            .expect("validated transitions only target compiled states");

        if let Some(exit) = from_state.exit() {
            let ctx = ActionContext {
                engine: self,
                state: from,
                event: Some(&envelope.event),
            };
            exit.run(&ctx, Some(&envelope.payload))
                .map_err(|e| self.report(from, ActionPhase::Exit, exit, e))?;
        }
        tracing::debug!(
            target: "sparsefsm::engine",
            category = "exit",
            state = %from,
            "state exited"
        );

        self.with_inner(|inner| inner.current = Some(to.clone()));

        tracing::debug!(
            target: "sparsefsm::engine",
            category = "enter",
            state = %to,
            "state entered"
        );
        if let Some(entry) = to_state.entry() {
            let ctx = ActionContext {
                engine: self,
                state: to,
                event: Some(&envelope.event),
            };
            if let Err(e) = entry.run(&ctx, Some(&envelope.payload)) {
                self.with_inner(|inner| inner.current = Some(from.clone()));
                return Err(self.report(to, ActionPhase::Entry, entry, e));
            }
        }
        Ok(())
    }

    fn report(
        &self,
        state: &StateKey<S>,
        phase: ActionPhase,
        action: &Action<S, E, P>,
        error: crate::error::ActionError,
    ) -> Diagnostic {
        let diagnostic = action_failed(state, phase, action, error);
        tracing::error!(
            target: "sparsefsm::engine",
            category = "action_failed",
            state = %state,
            action = action.name(),
            "{}",
            diagnostic
        );
        diagnostic
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner<S, E, P>) -> R) -> R {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        f(&mut inner)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// The current state, or `None` if the machine never started.
    pub fn current_state(&self) -> Option<StateKey<S>> {
        self.with_inner(|inner| inner.current.clone())
    }

    /// All diagnostics accumulated since the last (re)initialization.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.with_inner(|inner| inner.diagnostics.clone())
    }

    pub fn is_started(&self) -> bool {
        self.with_inner(|inner| inner.current.is_some())
    }

    pub fn is_halted(&self) -> bool {
        self.with_inner(|inner| inner.halted)
    }

    /// Number of events waiting in the queue.
    pub fn pending_events(&self) -> usize {
        self.with_inner(|inner| inner.queue.len())
    }

    /// The definitions the machine was built from, unmodified.
    pub fn definitions(&self) -> Arc<[StateDef<S, E, P>]> {
        self.with_inner(|inner| Arc::clone(&inner.definitions))
    }

    /// The compiled table.
    pub fn table(&self) -> Arc<MachineTable<S, E, P>> {
        self.with_inner(|inner| Arc::clone(&inner.table))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Trace category of a diagnostic that halted the machine.
fn failure_category(diagnostic: &Diagnostic) -> &'static str {
    match diagnostic {
        Diagnostic::UnresolvedEvent { .. } => "unresolved",
        _ => "action_failed",
    }
}

fn action_failed<S: Ident, E, P>(
    state: &StateKey<S>,
    phase: ActionPhase,
    action: &Action<S, E, P>,
    error: crate::error::ActionError,
) -> Diagnostic {
    Diagnostic::ActionFailed {
        state: state.to_string(),
        phase,
        action: action.name().to_string(),
        reason: error.to_string(),
    }
}
