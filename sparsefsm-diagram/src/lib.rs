//! # sparsefsm-diagram
//!
//! Renders state machine definitions as text graphs.
//!
//! Works on the definitions as written (before compilation), so duplicate or
//! dangling entries that validation would drop still show up. Nodes are
//! states, edges are transitions labeled `event` or `event / action`. The
//! default state is drawn dashed and the fallback event is shown as `*`.

use serde::{Deserialize, Serialize};
use sparsefsm_core::{Ident, StateDef, StateKey, Target};
use std::collections::HashMap;
use std::fmt::Write;
use thiserror::Error;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramFormat {
    /// Graphviz DOT.
    #[default]
    Dot,
    /// Mermaid `stateDiagram-v2`.
    Mermaid,
}

#[derive(Debug, Error)]
#[error("unknown diagram format '{0}' (expected 'dot' or 'mermaid')")]
pub struct UnknownFormat(String);

impl std::str::FromStr for DiagramFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dot" | "graphviz" => Ok(DiagramFormat::Dot),
            "mermaid" => Ok(DiagramFormat::Mermaid),
            other => Err(UnknownFormat(other.to_string())),
        }
    }
}

/// Renders `definitions` in the requested format.
pub fn render<S: Ident, E: Ident, P>(
    definitions: &[StateDef<S, E, P>],
    format: DiagramFormat,
) -> String {
    match format {
        DiagramFormat::Dot => to_dot(definitions),
        DiagramFormat::Mermaid => to_mermaid(definitions),
    }
}

/// One edge, flattened out of the definitions.
struct Edge {
    from: String,
    to: String,
    label: String,
}

fn edges<S: Ident, E: Ident, P>(definitions: &[StateDef<S, E, P>]) -> Vec<Edge> {
    let mut edges = Vec::new();
    for def in definitions {
        let from = def.key.to_string();
        for t in &def.transitions {
            let to = match &t.target {
                Target::Stay => from.clone(),
                Target::To(key) => key.to_string(),
            };
            let label = match &t.action {
                Some(action) => format!("{} / {}", t.event, action.name()),
                None => t.event.to_string(),
            };
            edges.push(Edge {
                from: from.clone(),
                to,
                label,
            });
        }
    }
    edges
}

fn node_label<S: Ident, E, P>(def: &StateDef<S, E, P>) -> String {
    let mut label = def.key.to_string();
    if let Some(entry) = &def.entry {
        label.push_str(&format!("\nentry / {}", entry.name()));
    }
    if let Some(exit) = &def.exit {
        label.push_str(&format!("\nexit / {}", exit.name()));
    }
    label
}

/// Renders Graphviz DOT.
pub fn to_dot<S: Ident, E: Ident, P>(definitions: &[StateDef<S, E, P>]) -> String {
    let mut out = String::new();
    out.push_str("digraph machine {\n");
    out.push_str("    rankdir=LR;\n");
    out.push_str("    node [shape=box, style=rounded];\n");

    let mut seen = Vec::new();
    for def in definitions {
        let name = def.key.to_string();
        if seen.contains(&name) {
            continue;
        }
        let style = if matches!(def.key, StateKey::Default) {
            ", style=\"rounded,dashed\""
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "    \"{}\" [label=\"{}\"{}];",
            dot_escape(&name),
            dot_escape(&node_label(def)),
            style
        );
        seen.push(name);
    }

    for edge in edges(definitions) {
        let _ = writeln!(
            out,
            "    \"{}\" -> \"{}\" [label=\"{}\"];",
            dot_escape(&edge.from),
            dot_escape(&edge.to),
            dot_escape(&edge.label)
        );
    }

    out.push_str("}\n");
    out
}

/// Renders a Mermaid state diagram.
pub fn to_mermaid<S: Ident, E: Ident, P>(definitions: &[StateDef<S, E, P>]) -> String {
    let mut out = String::new();
    out.push_str("stateDiagram-v2\n");

    // Mermaid ids must be plain words; map every state label to s0, s1, ...
    let mut ids: HashMap<String, String> = HashMap::new();
    let mut id_for = |name: &str, out: &mut String| -> String {
        if let Some(id) = ids.get(name) {
            return id.clone();
        }
        let id = format!("s{}", ids.len());
        let _ = writeln!(out, "    state \"{}\" as {}", mermaid_escape(name), id);
        ids.insert(name.to_string(), id.clone());
        id
    };

    for def in definitions {
        id_for(&def.key.to_string(), &mut out);
    }

    for def in definitions {
        let id = id_for(&def.key.to_string(), &mut out);
        if let Some(entry) = &def.entry {
            let _ = writeln!(out, "    {} : entry / {}", id, mermaid_escape(entry.name()));
        }
        if let Some(exit) = &def.exit {
            let _ = writeln!(out, "    {} : exit / {}", id, mermaid_escape(exit.name()));
        }
    }

    for edge in edges(definitions) {
        let from = id_for(&edge.from, &mut out);
        let to = id_for(&edge.to, &mut out);
        let _ = writeln!(out, "    {} --> {} : {}", from, to, mermaid_escape(&edge.label));
    }

    out
}

fn dot_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn mermaid_escape(s: &str) -> String {
    s.replace('"', "'").replace(':', "#58;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparsefsm_core::Action;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    enum St {
        Locked,
        Unlocked,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    enum Ev {
        Digit,
        Open,
        Lock,
        Shutdown,
    }

    fn noop(name: &str) -> Action<St, Ev, ()> {
        Action::new(name, |_, _| Ok(()))
    }

    fn sample() -> Vec<StateDef<St, Ev, ()>> {
        vec![
            StateDef::new(St::Locked)
                .on_entry(noop("clear_input"))
                .on_with(Ev::Digit, Target::Stay, noop("check_digit"))
                .on(Ev::Open, St::Unlocked),
            StateDef::new(St::Unlocked)
                .on(Ev::Lock, St::Locked)
                .otherwise(Target::Stay, Some(noop("ignore_input"))),
            StateDef::default_state().on(Ev::Shutdown, St::Locked),
        ]
    }

    #[test]
    fn test_dot_output() {
        let dot = to_dot(&sample());

        assert!(dot.starts_with("digraph machine {"));
        assert!(dot.contains("\"Locked\" [label=\"Locked\\nentry / clear_input\"];"));
        assert!(dot.contains("\"(default)\" [label=\"(default)\", style=\"rounded,dashed\"];"));
        assert!(dot.contains("\"Locked\" -> \"Locked\" [label=\"Digit / check_digit\"];"));
        assert!(dot.contains("\"Locked\" -> \"Unlocked\" [label=\"Open\"];"));
        assert!(dot.contains("\"Unlocked\" -> \"Unlocked\" [label=\"* / ignore_input\"];"));
        assert!(dot.contains("\"(default)\" -> \"Locked\" [label=\"Shutdown\"];"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn test_mermaid_output() {
        let mermaid = render(&sample(), DiagramFormat::Mermaid);

        assert!(mermaid.starts_with("stateDiagram-v2\n"));
        assert!(mermaid.contains("state \"Locked\" as s0"));
        assert!(mermaid.contains("state \"Unlocked\" as s1"));
        assert!(mermaid.contains("state \"(default)\" as s2"));
        assert!(mermaid.contains("s0 : entry / clear_input"));
        assert!(mermaid.contains("s0 --> s0 : Digit / check_digit"));
        assert!(mermaid.contains("s2 --> s0 : Shutdown"));
    }

    #[test]
    fn test_dangling_target_gets_a_node() {
        let defs: Vec<StateDef<St, Ev, ()>> = vec![StateDef::new(St::Locked).on(Ev::Open, St::Unlocked)];
        let mermaid = to_mermaid(&defs);
        assert!(mermaid.contains("state \"Unlocked\" as s1"));
        assert!(mermaid.contains("s0 --> s1 : Open"));
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("DOT".parse::<DiagramFormat>().unwrap(), DiagramFormat::Dot);
        assert_eq!(
            "mermaid".parse::<DiagramFormat>().unwrap(),
            DiagramFormat::Mermaid
        );
        assert!("svg".parse::<DiagramFormat>().is_err());
    }
}
