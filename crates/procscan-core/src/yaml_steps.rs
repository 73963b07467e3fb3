//! Generated steps files.
//!
//! Some documentation sets keep procedures in multi-document YAML files
//! (`steps-<name>.yaml`) that the docs build turns into a `procedure`
//! directive. [`to_rst`] performs the same conversion so the result can go
//! through the ordinary scanner.

use std::fmt::Write as _;
use std::path::Path;

use serde::Deserialize;

use crate::text::normalize_whitespace;

/// Title fields appear both as plain strings and as `{text: ...}` maps.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Title {
    Plain(String),
    Rich { text: String },
}

impl Title {
    fn text(&self) -> &str {
        match self {
            Title::Plain(text) | Title::Rich { text } => text.trim(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Action {
    heading: Option<Title>,
    pre: Option<String>,
    language: Option<String>,
    code: Option<String>,
    content: Option<String>,
    post: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Actions {
    Many(Vec<Action>),
    One(Action),
}

#[derive(Debug, Deserialize)]
struct YamlStep {
    title: Option<Title>,
    stepnum: Option<u32>,
    pre: Option<String>,
    action: Option<Actions>,
    content: Option<String>,
    post: Option<String>,
}

/// Check whether `path` names a generated steps file.
pub fn is_steps_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "yaml")
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("steps-"))
}

/// Convert a steps file into a `procedure` directive.
///
/// Documents that do not decode as a step are skipped. Fails only when no
/// document decodes at all.
pub fn to_rst(yaml: &str) -> Result<String, serde_yaml::Error> {
    let mut steps = Vec::new();
    let mut first_error = None;

    for document in serde_yaml::Deserializer::from_str(yaml) {
        match YamlStep::deserialize(document) {
            Ok(step) => steps.push(step),
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }

    if steps.is_empty() {
        if let Some(err) = first_error {
            return Err(err);
        }
    }

    let mut out = String::from(".. procedure::\n   :style: normal\n\n");
    for (index, step) in steps.iter().enumerate() {
        let number = step.stepnum.unwrap_or(index as u32 + 1);
        let title = match step.title.as_ref().map(|t| normalize_whitespace(t.text())) {
            Some(title) if !title.is_empty() => title,
            _ => format!("Step {}", number),
        };
        let _ = writeln!(out, "   .. step:: {}\n", title);

        push_block(&mut out, step.pre.as_deref(), 6);
        match &step.action {
            Some(Actions::One(action)) => push_action(&mut out, action),
            Some(Actions::Many(actions)) => actions.iter().for_each(|a| push_action(&mut out, a)),
            None => {}
        }
        push_block(&mut out, step.content.as_deref(), 6);
        push_block(&mut out, step.post.as_deref(), 6);
    }
    Ok(out)
}

fn push_action(out: &mut String, action: &Action) {
    if let Some(heading) = action.heading.as_ref().map(Title::text) {
        push_block(out, Some(heading), 6);
    }
    push_block(out, action.pre.as_deref(), 6);
    if let Some(code) = action.code.as_deref() {
        let language = action.language.as_deref().unwrap_or("none");
        let _ = writeln!(out, "      .. code-block:: {}\n", language);
        push_block(out, Some(code), 9);
    }
    push_block(out, action.content.as_deref(), 6);
    push_block(out, action.post.as_deref(), 6);
}

fn push_block(out: &mut String, text: Option<&str>, indent: usize) {
    let Some(text) = text.map(str::trim_end).filter(|t| !t.trim().is_empty()) else {
        return;
    };
    let pad = " ".repeat(indent);
    for line in text.trim_start_matches('\n').lines() {
        if line.trim().is_empty() {
            out.push('\n');
        } else {
            let _ = writeln!(out, "{}{}", pad, line);
        }
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_each_document_to_a_step() {
        let yaml = "title: Import the key\nstepnum: 1\npre: |\n  Run the command.\naction:\n  language: sh\n  code: |\n    wget key\n---\ntitle:\n  text: Install\nstepnum: 2\n";
        let rst = to_rst(yaml).expect("valid steps file");
        assert!(rst.starts_with(".. procedure::"));
        assert!(rst.contains("   .. step:: Import the key"));
        assert!(rst.contains("      .. code-block:: sh"));
        assert!(rst.contains("         wget key"));
        assert!(rst.contains("   .. step:: Install"));
    }

    #[test]
    fn test_is_steps_file() {
        assert!(is_steps_file(Path::new("/inc/steps-install.yaml")));
        assert!(!is_steps_file(Path::new("/inc/install.yaml")));
        assert!(!is_steps_file(Path::new("/inc/steps-install.rst")));
    }

    #[test]
    fn test_multiline_title_is_joined() {
        let yaml = "title: |\n  Import\n  the key\nstepnum: 1\n---\ntitle:\n  text: \"Start\\n  the service\"\nstepnum: 2\n";
        let rst = to_rst(yaml).expect("valid steps file");
        assert!(rst.contains("   .. step:: Import the key\n"));
        assert!(rst.contains("   .. step:: Start the service\n"));
    }

    #[test]
    fn test_blank_title_falls_back_to_number() {
        let rst = to_rst("title: \"  \"\nstepnum: 3\n").expect("valid steps file");
        assert!(rst.contains("   .. step:: Step 3\n"));
    }
}
