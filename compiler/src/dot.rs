// dot.rs - Graphviz DOT output for binding models
//
// Renders the expression graph of a model: one node per expression, one
// edge per dependency once the model is sealed, structural child edges
// before that.
//
// Preconditions: none; an unsealed model renders without dependency edges.
// Postconditions: returns a valid DOT string.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::fmt::{self, Write};

use crate::expr::{Expr, ExprKind};
use crate::model::Model;

/// Emit the model as a Graphviz DOT string.
pub fn emit_dot(model: &Model) -> String {
    let mut buf = String::new();
    let _ = write_dot(&mut buf, model);
    buf
}

fn write_dot(buf: &mut String, model: &Model) -> fmt::Result {
    writeln!(buf, "digraph bindings {{")?;
    writeln!(buf, "    rankdir=BT;")?;
    writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10];")?;
    writeln!(buf, "    edge [fontname=\"Helvetica\", fontsize=9];")?;
    writeln!(buf)?;

    for expr in model.iter() {
        writeln!(
            buf,
            "    {} [label=\"{}\"{}];",
            expr.id(),
            escape(&node_label(model, expr)),
            node_attrs(expr)
        )?;
    }
    writeln!(buf)?;

    for expr in model.iter() {
        if !model.is_sealed() {
            for child in expr.children() {
                writeln!(buf, "    {} -> {} [color=gray60];", expr.id(), child)?;
            }
            continue;
        }
        for dep in expr.dependencies() {
            let mut attrs = Vec::new();
            if dep.mandatory {
                attrs.push("style=bold".to_string());
            }
            if let Some(guard) = dep.guard {
                attrs.push("style=dashed".to_string());
                let branch = if guard.branch { "T" } else { "F" };
                attrs.push(format!("label=\"{} {branch}\"", guard.predicate));
            }
            if attrs.is_empty() {
                writeln!(buf, "    {} -> {};", expr.id(), dep.target)?;
            } else {
                writeln!(buf, "    {} -> {} [{}];", expr.id(), dep.target, attrs.join(", "))?;
            }
        }
    }

    writeln!(buf, "}}")
}

fn node_label(model: &Model, expr: &Expr) -> String {
    let mut label = expr.key().to_string();
    if let Some(flag) = expr.flag() {
        label.push_str(&format!("\nflag {flag}"));
    }
    if let (Some(t), Some(f)) = (expr.requirement_flag(true), expr.requirement_flag(false)) {
        label.push_str(&format!("\nreq T={t} F={f}"));
    }
    if model.is_sealed() && expr.is_dynamic() {
        label.push_str(&format!("\ninvalid {}", expr.invalid_flags()));
    }
    label
}

fn node_attrs(expr: &Expr) -> String {
    let shape = match expr.kind() {
        ExprKind::Ternary | ExprKind::Logical(_) => "diamond",
        ExprKind::Identifier { .. } | ExprKind::StaticIdentifier { .. } => "box",
        ExprKind::Symbol { .. } => "plaintext",
        _ => "ellipse",
    };
    let mut attrs = format!(", shape={shape}");
    if expr.is_binding() {
        attrs.push_str(", peripheries=2");
    }
    if !expr.is_dynamic() {
        attrs.push_str(", style=dashed, color=gray50");
    }
    attrs
}

fn escape(label: &str) -> String {
    label
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
