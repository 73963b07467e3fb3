//! Variation detection.
//!
//! Three patterns produce labels:
//!
//! - `selected-content` blocks, labelled by their resolved selections
//! - tab groups inside a step, labelled by tab id and, inside a composable
//!   wrapper, combined with each selection (`driver=nodejs; async`)
//! - tab groups wrapping whole procedures, which become a [`TabSet`] in the
//!   grouping engine
//!
//! Tab groups nested in another tab's content are not resolved. They stay
//! in the step content as opaque text.
//!
//! [`TabSet`]: crate::model::TabSet

use std::collections::BTreeMap;

use crate::block::{BlockId, BlockKind, BlockTree};
use crate::model::{canonical_order, ComposableInfo, Variation};
use crate::render::blocks_to_rst;

/// Where a step sits relative to variation containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariationScope<'a> {
    /// Options of the enclosing composable wrapper.
    pub composable: Option<&'a ComposableInfo>,
    /// The step is inside a tab of a top-level tab set.
    pub inside_tab: bool,
}

/// Variations of a single step.
#[derive(Debug, Clone, Default)]
pub struct StepVariations {
    /// Labels in canonical order.
    pub variations: Vec<Variation>,
    /// Rendered content specific to each label.
    pub content: BTreeMap<String, String>,
    /// Blocks that belong to every variation.
    pub general: Vec<BlockId>,
}

struct Conditional {
    selections: Vec<String>,
    general: Vec<BlockId>,
    tabs: Vec<(String, Vec<BlockId>)>,
}

/// Turn raw `selections` into `axis=value` entries.
///
/// Entries already written as `axis=value` are kept. Positional values are
/// paired with the wrapper's declared options when the counts match and
/// kept bare otherwise.
pub fn resolve_selections(selections: &[String], options: &[String]) -> Vec<String> {
    let positional = selections.len() == options.len();
    selections
        .iter()
        .enumerate()
        .map(|(i, value)| {
            if let Some((axis, value)) = value.split_once('=') {
                format!("{}={}", axis.trim(), value.trim())
            } else if positional {
                format!("{}={}", options[i], value)
            } else {
                value.clone()
            }
        })
        .collect()
}

/// Collect the variations of a step whose content is `content`.
pub fn step_variations(tree: &BlockTree, content: &[BlockId], scope: VariationScope<'_>) -> StepVariations {
    let options: &[String] = scope.composable.map(|c| c.options.as_slice()).unwrap_or(&[]);
    let mut general = Vec::new();
    let mut conditionals = Vec::new();
    let mut step_tabs = Vec::new();

    for &id in content {
        match tree.kind(id) {
            BlockKind::ConditionalContent { selections } => {
                let mut conditional = Conditional {
                    selections: resolve_selections(selections, options),
                    general: Vec::new(),
                    tabs: Vec::new(),
                };
                for inner in tree.content_of(id) {
                    if !scope.inside_tab && matches!(tree.kind(inner), BlockKind::TabGroup { .. }) {
                        conditional.tabs.extend(tabs_of(tree, inner));
                    } else {
                        conditional.general.push(inner);
                    }
                }
                conditionals.push(conditional);
            }
            BlockKind::TabGroup { .. } if !scope.inside_tab => step_tabs.extend(tabs_of(tree, id)),
            _ => general.push(id),
        }
    }

    let mut found = StepVariations {
        general,
        ..StepVariations::default()
    };

    for conditional in &conditionals {
        let base = blocks_to_rst(tree, &conditional.general);
        let mut tabs: Vec<&(String, Vec<BlockId>)> = conditional.tabs.iter().collect();
        if scope.composable.is_some() {
            tabs.extend(step_tabs.iter());
        }

        if tabs.is_empty() {
            found.add(Variation::selection(conditional.selections.clone()), base.clone());
            continue;
        }
        for (tab, blocks) in tabs {
            let variation = Variation::new(conditional.selections.clone(), Some(tab.clone()));
            found.add(variation, join(&base, &blocks_to_rst(tree, blocks)));
        }
    }

    if conditionals.is_empty() || scope.composable.is_none() {
        for (tab, blocks) in &step_tabs {
            found.add(Variation::tab(tab.clone()), blocks_to_rst(tree, blocks));
        }
    }

    canonical_order(&mut found.variations);
    found
}

impl StepVariations {
    fn add(&mut self, variation: Variation, content: String) {
        self.content
            .entry(variation.label.clone())
            .and_modify(|existing| *existing = join(existing, &content))
            .or_insert(content);
        self.variations.push(variation);
    }
}

/// Tabs of a tab group as `(id, content)` in document order.
pub fn tabs_of(tree: &BlockTree, group: BlockId) -> Vec<(String, Vec<BlockId>)> {
    tree.content_of(group)
        .into_iter()
        .filter_map(|tab| match tree.kind(tab) {
            BlockKind::Tab { id, .. } => Some((id.clone(), tree.content_of(tab))),
            _ => None,
        })
        .collect()
}

fn join(first: &str, second: &str) -> String {
    match (first.trim().is_empty(), second.trim().is_empty()) {
        (true, _) => second.to_string(),
        (_, true) => first.to_string(),
        _ => format!("{}\n\n{}", first, second),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_positional_selections_pair_with_options() {
        let resolved = resolve_selections(&strings(&["driver", "nodejs"]), &strings(&["interface", "language"]));
        assert_eq!(resolved, strings(&["interface=driver", "language=nodejs"]));
    }

    #[test]
    fn test_explicit_and_mismatched_selections() {
        assert_eq!(
            resolve_selections(&strings(&["driver=nodejs"]), &strings(&["driver", "deployment"])),
            strings(&["driver=nodejs"])
        );
        assert_eq!(
            resolve_selections(&strings(&["nodejs"]), &strings(&["driver", "deployment"])),
            strings(&["nodejs"])
        );
    }
}
