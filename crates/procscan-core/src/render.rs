//! reStructuredText rendering.
//!
//! Blocks are written back with canonical indentation so a step's content
//! can be stored as text and re-emitted later. [`render_procedure`] renders
//! one variation of a procedure for callers that write extraction output.

use std::fmt::Write as _;

use crate::block::{BlockId, BlockKind, BlockTree, IncludeState};
use crate::model::{Procedure, ProcedureFormat, Step};

const ADORNMENTS: [char; 6] = ['=', '-', '~', '^', '"', '\''];

/// Render `ids` as top-level text, one blank line between blocks.
///
/// Expanded includes are inlined.
pub fn blocks_to_rst(tree: &BlockTree, ids: &[BlockId]) -> String {
    let mut lines = Vec::new();
    write_blocks(tree, ids, 0, &mut lines);
    lines.join("\n")
}

fn write_blocks(tree: &BlockTree, ids: &[BlockId], indent: usize, out: &mut Vec<String>) {
    for (i, &id) in ids.iter().enumerate() {
        if i > 0 {
            out.push(String::new());
        }
        write_block(tree, id, indent, out);
    }
}

fn write_block(tree: &BlockTree, id: BlockId, indent: usize, out: &mut Vec<String>) {
    let pad = " ".repeat(indent);
    let children = tree.children(id);

    let (header, options, child_indent): (String, Vec<String>, usize) = match tree.kind(id) {
        BlockKind::Prose { text } => {
            for line in text.lines() {
                out.push(if line.is_empty() {
                    String::new()
                } else {
                    format!("{}{}", pad, line)
                });
            }
            return;
        }
        BlockKind::Heading { text, level, .. } => {
            let adornment = ADORNMENTS[(*level as usize).saturating_sub(1) % ADORNMENTS.len()];
            out.push(format!("{}{}", pad, text));
            out.push(format!(
                "{}{}",
                pad,
                adornment.to_string().repeat(text.chars().count())
            ));
            return;
        }
        BlockKind::Include {
            state: IncludeState::Expanded(_),
            ..
        } => {
            write_blocks(tree, children, indent, out);
            return;
        }
        BlockKind::Include { target, .. } => {
            out.push(format!("{}.. include:: {}", pad, target));
            return;
        }
        BlockKind::ListItem { marker, text } => {
            let marker = format!("{}. ", marker.as_written());
            let width = marker.len();
            (format!("{}{}", marker, text), Vec::new(), indent + width)
        }
        BlockKind::Procedure => (".. procedure::".to_string(), Vec::new(), indent + 3),
        BlockKind::Step { title } => (format!(".. step:: {}", title), Vec::new(), indent + 3),
        BlockKind::Composable { options, defaults } => {
            let mut attrs = vec![format!(":options: {}", options.join(", "))];
            if !defaults.is_empty() {
                attrs.push(format!(":defaults: {}", defaults.join(", ")));
            }
            (".. composable-tutorial::".to_string(), attrs, indent + 3)
        }
        BlockKind::ConditionalContent { selections } => (
            ".. selected-content::".to_string(),
            vec![format!(":selections: {}", selections.join(", "))],
            indent + 3,
        ),
        BlockKind::TabGroup { directive } => (format!(".. {}::", directive), Vec::new(), indent + 3),
        BlockKind::Tab { id, title } => (
            format!(".. tab:: {}", title),
            vec![format!(":tabid: {}", id)],
            indent + 3,
        ),
    };

    out.push(format!("{}{}", pad, header.trim_end()));
    let option_pad = " ".repeat(child_indent);
    for option in options {
        out.push(format!("{}{}", option_pad, option));
    }
    if !children.is_empty() {
        out.push(String::new());
        write_blocks(tree, children, child_indent, out);
    }
}

/// Render `procedure` as reStructuredText.
///
/// With `label` set, each step's content for that variation follows its
/// general content. Without one, every variation's content follows in
/// label order, each introduced by a `.. variation: <label>` comment.
/// Directive and YAML procedures come out as a `procedure` directive, the
/// others as a numbered list.
pub fn render_procedure(procedure: &Procedure, label: Option<&str>) -> String {
    let mut out = String::new();
    match procedure.format {
        ProcedureFormat::Directive | ProcedureFormat::YamlSteps => {
            out.push_str(".. procedure::\n   :style: normal\n\n");
            write_directive_steps(&mut out, &procedure.steps, 3, label);
        }
        ProcedureFormat::OrderedList | ProcedureFormat::NumberedHeadings => {
            for (i, step) in procedure.steps.iter().enumerate() {
                let _ = writeln!(out, "{}. {}\n", i + 1, step.title);
                write_step_body(&mut out, step, 3, label);
            }
        }
    }
    while out.ends_with("\n\n") {
        out.pop();
    }
    out
}

fn write_directive_steps(out: &mut String, steps: &[Step], indent: usize, label: Option<&str>) {
    let pad = " ".repeat(indent);
    for step in steps {
        let _ = writeln!(out, "{}.. step:: {}\n", pad, step.title);
        write_step_body(out, step, indent + 3, label);
    }
}

fn write_step_body(out: &mut String, step: &Step, indent: usize, label: Option<&str>) {
    write_indented(out, &step.content, indent);
    match label {
        Some(label) => {
            if let Some(variant) = step.variant_content.get(label) {
                write_indented(out, variant, indent);
            }
        }
        None => {
            for (label, variant) in &step.variant_content {
                let _ = writeln!(out, "{}.. variation: {}\n", " ".repeat(indent), label);
                write_indented(out, variant, indent);
            }
        }
    }
    if !step.nested_steps.is_empty() {
        let _ = writeln!(out, "{}.. procedure::\n", " ".repeat(indent));
        write_directive_steps(out, &step.nested_steps, indent + 3, label);
    }
}

fn write_indented(out: &mut String, text: &str, indent: usize) {
    if text.trim().is_empty() {
        return;
    }
    let pad = " ".repeat(indent);
    for line in text.lines() {
        if line.trim().is_empty() {
            out.push('\n');
        } else {
            let _ = writeln!(out, "{}{}", pad, line);
        }
    }
    out.push('\n');
}
