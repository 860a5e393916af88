//! # sparsefsm-core
//!
//! Sparse, semi-hierarchical state machine engine.
//!
//! This crate provides:
//! - State and transition definitions with named actions
//! - Table compilation and validation with collected diagnostics
//! - The event processing engine (queueing, re-entrancy, state changes)
//! - Declarative JSON/YAML tables bound through an action registry

pub mod config;
pub mod declarative;
pub mod definition;
pub mod engine;
pub mod error;
pub mod table;

pub use config::{EngineConfig, UnresolvedPolicy};
pub use declarative::{ActionRegistry, DynamicEngine, TableSpec};
pub use definition::{Action, EventKey, Ident, StateDef, StateKey, Target, TransitionDef};
pub use engine::{ActionContext, Engine, Envelope};
pub use error::{ActionError, ActionPhase, CoreError, Diagnostic};
pub use table::{CompiledState, MachineTable, Transition};
