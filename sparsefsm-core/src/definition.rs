//! State machine definition types.
//!
//! Definitions are the raw, declarative input to the engine. They are built
//! once by the embedding application and never mutated afterwards:
//!
//! ```
//! use sparsefsm_core::{Action, StateDef, Target};
//!
//! #[derive(Debug, Clone, PartialEq, Eq, Hash)]
//! enum Door { Closed, Open }
//!
//! #[derive(Debug, Clone, PartialEq, Eq, Hash)]
//! enum Cmd { Push, Pull, Knock }
//!
//! let defs: Vec<StateDef<Door, Cmd, ()>> = vec![
//!     StateDef::new(Door::Closed)
//!         .on(Cmd::Push, Door::Open)
//!         .on_with(Cmd::Knock, Target::Stay, Action::new("answer", |_, _| Ok(()))),
//!     StateDef::new(Door::Open).on(Cmd::Pull, Door::Closed),
//! ];
//! assert_eq!(defs[0].transitions.len(), 2);
//! ```

use crate::engine::ActionContext;
use crate::error::ActionError;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Identifier types for states and events.
///
/// Identifiers are opaque tokens: only equality, hashing and a debug
/// rendering (used in diagnostics and logs) are required.
pub trait Ident: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> Ident for T where T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// A state identifier, or the reserved default-state identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StateKey<S> {
    /// The machine-wide fallback state.
    Default,
    /// A named state.
    Id(S),
}

impl<S> StateKey<S> {
    pub fn is_default(&self) -> bool {
        matches!(self, StateKey::Default)
    }

    /// Returns the named identifier, if any.
    pub fn id(&self) -> Option<&S> {
        match self {
            StateKey::Default => None,
            StateKey::Id(id) => Some(id),
        }
    }
}

impl<S> From<S> for StateKey<S> {
    fn from(id: S) -> Self {
        StateKey::Id(id)
    }
}

impl<S: fmt::Debug> fmt::Display for StateKey<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateKey::Default => write!(f, "(default)"),
            StateKey::Id(id) => write!(f, "{}", label(id)),
        }
    }
}

/// An event identifier, or the reserved default-event identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey<E> {
    /// Matches any event the state has no explicit transition for.
    Any,
    /// A specific event.
    Id(E),
}

impl<E> EventKey<E> {
    pub fn is_any(&self) -> bool {
        matches!(self, EventKey::Any)
    }
}

impl<E> From<E> for EventKey<E> {
    fn from(id: E) -> Self {
        EventKey::Id(id)
    }
}

impl<E: fmt::Debug> fmt::Display for EventKey<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKey::Any => write!(f, "*"),
            EventKey::Id(id) => write!(f, "{}", label(id)),
        }
    }
}

/// Destination of a transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target<S> {
    /// Remain in the state that owns the transition.
    Stay,
    /// Move to the given state.
    To(StateKey<S>),
}

impl<S> Target<S> {
    /// Targets the machine-wide default state.
    pub fn default_state() -> Self {
        Target::To(StateKey::Default)
    }
}

impl<S> From<S> for Target<S> {
    fn from(id: S) -> Self {
        Target::To(StateKey::Id(id))
    }
}

/// Callback signature shared by entry, exit and transition actions.
///
/// The payload is `None` only for the entry action run at start-up.
pub type ActionFn<S, E, P> =
    dyn Fn(&ActionContext<'_, S, E, P>, Option<&P>) -> Result<(), ActionError> + Send + Sync;

/// A named action callback.
///
/// The name is fixed at definition time and is what diagrams and
/// diagnostics display.
pub struct Action<S, E, P> {
    name: String,
    func: Arc<ActionFn<S, E, P>>,
}

impl<S, E, P> Action<S, E, P> {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&ActionContext<'_, S, E, P>, Option<&P>) -> Result<(), ActionError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn run(
        &self,
        ctx: &ActionContext<'_, S, E, P>,
        payload: Option<&P>,
    ) -> Result<(), ActionError> {
        (self.func)(ctx, payload)
    }
}

impl<S, E, P> Clone for Action<S, E, P> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            func: Arc::clone(&self.func),
        }
    }
}

impl<S, E, P> fmt::Debug for Action<S, E, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Action").field(&self.name).finish()
    }
}

/// One event-triggered edge as declared.
#[derive(Debug, Clone)]
pub struct TransitionDef<S, E, P> {
    /// Triggering event, or `EventKey::Any` for the state's fallback.
    pub event: EventKey<E>,

    /// Destination, or `Target::Stay`.
    pub target: Target<S>,

    /// Optional action run when the transition fires.
    pub action: Option<Action<S, E, P>>,
}

impl<S, E, P> TransitionDef<S, E, P> {
    pub fn new(event: impl Into<EventKey<E>>, target: impl Into<Target<S>>) -> Self {
        Self {
            event: event.into(),
            target: target.into(),
            action: None,
        }
    }

    pub fn with_action(mut self, action: Action<S, E, P>) -> Self {
        self.action = Some(action);
        self
    }
}

/// A state as declared.
#[derive(Debug, Clone)]
pub struct StateDef<S, E, P> {
    /// State identifier, or `StateKey::Default` for the default state.
    pub key: StateKey<S>,

    /// Runs when the state becomes current.
    pub entry: Option<Action<S, E, P>>,

    /// Runs when the state stops being current.
    pub exit: Option<Action<S, E, P>>,

    /// Transitions in declaration order.
    pub transitions: Vec<TransitionDef<S, E, P>>,
}

impl<S, E, P> StateDef<S, E, P> {
    /// Declares a named state.
    pub fn new(id: S) -> Self {
        Self::with_key(StateKey::Id(id))
    }

    /// Declares the machine-wide default state.
    pub fn default_state() -> Self {
        Self::with_key(StateKey::Default)
    }

    pub fn with_key(key: StateKey<S>) -> Self {
        Self {
            key,
            entry: None,
            exit: None,
            transitions: Vec::new(),
        }
    }

    pub fn on_entry(mut self, action: Action<S, E, P>) -> Self {
        self.entry = Some(action);
        self
    }

    pub fn on_exit(mut self, action: Action<S, E, P>) -> Self {
        self.exit = Some(action);
        self
    }

    /// Adds a transition without an action.
    pub fn on(mut self, event: impl Into<EventKey<E>>, target: impl Into<Target<S>>) -> Self {
        self.transitions.push(TransitionDef::new(event, target));
        self
    }

    /// Adds a transition with an action.
    pub fn on_with(
        mut self,
        event: impl Into<EventKey<E>>,
        target: impl Into<Target<S>>,
        action: Action<S, E, P>,
    ) -> Self {
        self.transitions
            .push(TransitionDef::new(event, target).with_action(action));
        self
    }

    /// Adds the state's fallback transition, taken for any event without an
    /// explicit transition.
    pub fn otherwise(
        mut self,
        target: impl Into<Target<S>>,
        action: Option<Action<S, E, P>>,
    ) -> Self {
        self.transitions.push(TransitionDef {
            event: EventKey::Any,
            target: target.into(),
            action,
        });
        self
    }

    pub fn transition(mut self, transition: TransitionDef<S, E, P>) -> Self {
        self.transitions.push(transition);
        self
    }
}

/// Renders an identifier for logs and diagnostics, without the quotes `Debug`
/// puts around strings.
pub fn label<T: fmt::Debug + ?Sized>(value: &T) -> String {
    let rendered = format!("{:?}", value);
    rendered
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .map(str::to_string)
        .unwrap_or(rendered)
}
