//! Benchmark fixtures shared by the bench targets.

use sparsefsm_core::{Action, StateDef, Target};

/// A ring of `n` states where `Next` advances and `Tick` stays.
pub fn ring(n: u32) -> Vec<StateDef<u32, RingEvent, u64>> {
    (0..n)
        .map(|i| {
            StateDef::new(i)
                .on(RingEvent::Next, (i + 1) % n)
                .on_with(
                    RingEvent::Tick,
                    Target::Stay,
                    Action::new("tick", |_, _| Ok(())),
                )
        })
        .chain(std::iter::once(
            StateDef::default_state().on(RingEvent::Reset, 0u32),
        ))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RingEvent {
    Next,
    Tick,
    Reset,
}
