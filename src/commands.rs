//! Command execution.

use crate::config::Config;
use colored::Colorize;
use serde_json::Value;
use sparsefsm_core::{ActionRegistry, Diagnostic, MachineTable, TableSpec};
use sparsefsm_diagram::DiagramFormat;
use sparsefsm_lock::{definitions, CombinationLock, LockEvent, LockHardware};
use std::path::Path;
use std::sync::Arc;

/// Outcome of `validate`.
pub struct Validation {
    pub output: String,
    pub diagnostics: usize,
}

/// Applies one input token to the lock: a bare digit presses that key,
/// anything else must name a lock event.
pub fn apply_input(lock: &CombinationLock, token: &str) -> Result<(), String> {
    let result = match token.parse::<u64>() {
        Ok(digit) if digit > 9 => {
            return Err(format!("invalid digit {}: expected 0-9", digit));
        }
        Ok(digit) => lock.press(digit as u8),
        Err(_) => lock.send(token.parse::<LockEvent>()?),
    };
    result.map_err(|diagnostics| format_diagnostics(&diagnostics))
}

/// Runs a scripted lock session and returns one line per input.
pub fn run(config: &Config, events: &[String]) -> String {
    let lock = CombinationLock::new(&config.lock, config.engine.clone());
    let mut output = startup_report(&lock);

    for token in events {
        let line = match apply_input(&lock, token) {
            Ok(()) => format!("{:>10} -> {}", token, format_state(&lock)),
            Err(e) => format!("{:>10} -> {}", token, e.red()),
        };
        output.push_str(&line);
        output.push('\n');
    }

    output.push_str(&format!(
        "{} {}",
        "final:".bold(),
        format_state(&lock)
    ));
    output
}

/// Renders the lock machine, or the table in `file` when given.
pub fn diagram(
    config: &Config,
    format: DiagramFormat,
    file: Option<&Path>,
) -> Result<String, Box<dyn std::error::Error>> {
    match file {
        Some(path) => {
            let spec = TableSpec::from_file(path)?;
            let (defs, _) = spec.build(&placeholder_registry(&spec))?;
            Ok(sparsefsm_diagram::render(&defs, format))
        }
        None => {
            let hardware = Arc::new(LockHardware::new(&config.lock));
            Ok(sparsefsm_diagram::render(&definitions(&hardware), format))
        }
    }
}

/// Validates a declarative table and reports its diagnostics.
pub fn validate(path: &Path) -> Result<Validation, Box<dyn std::error::Error>> {
    let spec = TableSpec::from_file(path)?;
    let checksum = spec.checksum()?;
    let (defs, initial) = spec.build(&placeholder_registry(&spec))?;
    let (table, diagnostics) = MachineTable::compile(&defs, &initial);

    let mut output = format!(
        "{} {} ({} states, default state: {}, checksum: {})\n",
        if diagnostics.is_empty() {
            "Valid".green()
        } else {
            "Invalid".red()
        },
        path.display().to_string().cyan(),
        table.len(),
        if table.default_state().is_some() {
            "yes"
        } else {
            "no"
        },
        checksum
    );
    for d in &diagnostics {
        output.push_str(&format!("  {} {}\n", d.error_code().yellow(), d));
    }

    Ok(Validation {
        output,
        diagnostics: diagnostics.len(),
    })
}

/// Binds every action a table names to a no-op, so its structure can be
/// checked without the real behavior.
fn placeholder_registry(spec: &TableSpec) -> ActionRegistry<Value> {
    let mut registry = ActionRegistry::new();
    for name in spec.action_names() {
        registry.register(name, |_, _| Ok(()));
    }
    registry
}

/// Reports why the lock did not start, if it did not.
pub fn startup_report(lock: &CombinationLock) -> String {
    let diagnostics = lock.engine().diagnostics();
    if diagnostics.is_empty() {
        return String::new();
    }
    format!("{}\n", format_diagnostics(&diagnostics).yellow())
}

pub fn format_state(lock: &CombinationLock) -> String {
    let engine = lock.engine();
    let state = match engine.current_state() {
        Some(key) => key.to_string().cyan().to_string(),
        None => "not started".red().to_string(),
    };
    let bolt = if lock.hardware().is_locked() {
        "bolt engaged".dimmed()
    } else {
        "bolt released".dimmed()
    };
    if engine.is_halted() {
        format!("{} ({}, {})", state, bolt, "halted".red())
    } else {
        format!("{} ({})", state, bolt)
    }
}

pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| format!("[{}] {}", d.error_code(), d))
        .collect::<Vec<_>>()
        .join("\n")
}
