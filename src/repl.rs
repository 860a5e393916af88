//! Interactive REPL driving a combination lock.

use crate::commands::{apply_input, format_diagnostics, format_state, startup_report};
use crate::config::Config;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use sparsefsm_diagram::DiagramFormat;
use sparsefsm_lock::{definitions, CombinationLock, LockHardware};
use std::path::PathBuf;
use std::sync::Arc;

const HELP_TEXT: &str = r#"
Available commands:
  help                  Show this help

  digit <n>, <n>        Press keypad digit n (0-9)
  lock                  Engage the lock
  open                  Release the lock directly
  setcombo              Start entering a new combination
  shutdown              Power down (handled by the default state)
  garbage               Send an event no state expects

  state                 Show the current state
  diag                  Show recorded diagnostics
  reset                 Restart the machine from its initial state
  diagram [dot|mermaid] Print the machine as a graph

  quit, exit            Exit the REPL
"#;

pub fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "sparsefsm combination lock".bold().cyan());

    let lock = CombinationLock::new(&config.lock, config.engine.clone());
    print!("{}", startup_report(&lock));
    println!("State: {}", format_state(&lock));

    let rl_config = rustyline::Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(rl_config)?;

    let history_path = history_path();
    let _ = rl.load_history(&history_path);

    println!("Type 'help' for available commands.\n");

    loop {
        let prompt = format!("{} ", "lock>".cyan());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match execute_repl_command(&lock, config, line) {
                    Ok(Some(output)) => println!("{}\n", output),
                    Ok(None) => break,
                    Err(e) => println!("{}: {}\n", "Error".red(), e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                println!("{}: {:?}", "Error".red(), err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);
    Ok(())
}

fn history_path() -> PathBuf {
    home::home_dir()
        .map(|h| h.join(".sparsefsm_history"))
        .unwrap_or_else(|| ".sparsefsm_history".into())
}

/// Executes one REPL line. `Ok(None)` ends the session.
fn execute_repl_command(
    lock: &CombinationLock,
    config: &Config,
    line: &str,
) -> Result<Option<String>, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.is_empty() {
        return Ok(Some(String::new()));
    }

    let cmd = parts[0].to_lowercase();
    let args = &parts[1..];

    match cmd.as_str() {
        "help" | "?" => Ok(Some(HELP_TEXT.to_string())),

        "quit" | "exit" | "q" => Ok(None),

        "digit" | "d" => {
            let Some(digit) = args.first() else {
                return Ok(Some("Usage: digit <n>".to_string()));
            };
            apply_input(lock, digit)?;
            Ok(Some(format_state(lock)))
        }

        "state" | "s" => Ok(Some(format_state(lock))),

        "diag" => {
            let diagnostics = lock.engine().diagnostics();
            if diagnostics.is_empty() {
                Ok(Some("No diagnostics".green().to_string()))
            } else {
                Ok(Some(format_diagnostics(&diagnostics).yellow().to_string()))
            }
        }

        "reset" => {
            let diagnostics = lock.reset();
            if diagnostics.is_empty() {
                Ok(Some(format!("{} {}", "Restarted:".green(), format_state(lock))))
            } else {
                Err(format_diagnostics(&diagnostics))
            }
        }

        "diagram" => {
            let format = match args.first() {
                Some(f) => f.parse::<DiagramFormat>().map_err(|e| e.to_string())?,
                None => DiagramFormat::Dot,
            };
            let hardware = Arc::new(LockHardware::new(&config.lock));
            Ok(Some(sparsefsm_diagram::render(&definitions(&hardware), format)))
        }

        _ => {
            apply_input(lock, &cmd)?;
            Ok(Some(format_state(lock)))
        }
    }
}
