//! # sparsefsm-lock
//!
//! A combination lock driven by the sparsefsm engine. Used to exercise the
//! engine end to end: self-submitted events, a local fallback, the default
//! state and unresolved-event halting.

pub mod hardware;
pub mod machine;

pub use hardware::{LockConfig, LockError, LockHardware};
pub use machine::{
    definitions, digit_payload, CombinationLock, LockEngine, LockEvent, LockState, LockStateDef,
};
