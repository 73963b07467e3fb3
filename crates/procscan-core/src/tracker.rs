//! Sub-procedure tracking.
//!
//! Consecutive list items inside a step form runs. The first item fixes
//! the run's [`MarkerType`] and `#.` continuations inherit it, so item
//! labels are always derived from position. A paragraph, a heading, or
//! two other blocks in a row end a run, as does an explicit marker that
//! contradicts the run's type or restarts the count.

use crate::block::{BlockId, BlockKind, BlockTree, ListMarker};
use crate::error::{Diagnostic, Diagnostics};
use crate::model::{MarkerType, SubProcedure, SubStep};
use crate::span::Span;

/// Consecutive non-list blocks that end a run.
const RUN_GAP: usize = 2;

/// A run of list item blocks with derived labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub marker_type: MarkerType,
    /// Label and block of each item.
    pub items: Vec<(String, BlockId)>,
}

impl Run {
    fn start(marker: ListMarker, id: BlockId) -> Self {
        let (marker_type, label) = match marker {
            ListMarker::Numeric(n) => (MarkerType::Numeric, n.to_string()),
            ListMarker::Alpha(c) => (MarkerType::Alphabetic, c.to_string()),
            ListMarker::Continuation => (MarkerType::Numeric, "1".to_string()),
        };
        Self {
            marker_type,
            items: vec![(label, id)],
        }
    }

    fn last_label(&self) -> &str {
        self.items.last().map_or("", |(label, _)| label.as_str())
    }

    /// `None` once a numeric run has reached the largest representable marker.
    fn next_label(&self) -> Option<String> {
        let last = self.last_label();
        match self.marker_type {
            MarkerType::Numeric => match last.parse::<u32>() {
                Ok(n) => n.checked_add(1).map(|next| next.to_string()),
                Err(_) => Some("1".to_string()),
            },
            MarkerType::Alphabetic => Some(next_alpha(last)),
        }
    }
}

/// Split `ids` into runs of list items.
///
/// Blocks that are not list items only act as separators.
pub fn runs(tree: &BlockTree, ids: &[BlockId], diagnostics: &mut Diagnostics) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    let mut open = false;
    let mut gap = 0;

    for &id in ids {
        let marker = match tree.kind(id) {
            BlockKind::ListItem { marker, .. } => *marker,
            BlockKind::Prose { text } if !text.starts_with("..") => {
                open = false;
                continue;
            }
            BlockKind::Heading { .. } => {
                open = false;
                continue;
            }
            _ => {
                gap += 1;
                if gap >= RUN_GAP {
                    open = false;
                }
                continue;
            }
        };
        gap = 0;

        let continued = match runs.last().filter(|_| open) {
            Some(run) => continue_run(tree, run, marker, id, diagnostics),
            None => None,
        };
        match (continued, runs.last_mut()) {
            (Some(label), Some(run)) => run.items.push((label, id)),
            _ => {
                runs.push(Run::start(marker, id));
                open = true;
            }
        }
    }

    runs
}

/// Label for `marker` as the next item of `run`, or `None` when it starts
/// a new run.
fn continue_run(
    tree: &BlockTree,
    run: &Run,
    marker: ListMarker,
    id: BlockId,
    diagnostics: &mut Diagnostics,
) -> Option<String> {
    let expected = run.next_label();
    let written = match marker {
        ListMarker::Continuation => match expected {
            Some(label) => return Some(label),
            None => {
                diagnostics.push(
                    Diagnostic::unknown_marker("#", run.last_label(), tree.get(id).span)
                        .in_file(tree.source_of(id)),
                );
                return None;
            }
        },
        ListMarker::Numeric(n) if run.marker_type == MarkerType::Numeric && n != 1 => n.to_string(),
        ListMarker::Alpha(c)
            if run.marker_type == MarkerType::Alphabetic && !c.eq_ignore_ascii_case(&'a') =>
        {
            c.to_string()
        }
        // Restart or a marker of the other type.
        _ => return None,
    };
    let expected = expected.unwrap_or_else(|| run.last_label().to_string());
    if !written.eq_ignore_ascii_case(&expected) {
        diagnostics.push(
            Diagnostic::unknown_marker(&written, &expected, tree.get(id).span)
                .in_file(tree.source_of(id)),
        );
    }
    Some(written)
}

/// Group the list items among `ids` into sub-procedures, recursively.
pub fn track_sub_procedures(
    tree: &BlockTree,
    ids: &[BlockId],
    diagnostics: &mut Diagnostics,
) -> Vec<SubProcedure> {
    runs(tree, ids, diagnostics)
        .into_iter()
        .map(|run| to_sub_procedure(tree, run, diagnostics))
        .collect()
}

fn to_sub_procedure(tree: &BlockTree, run: Run, diagnostics: &mut Diagnostics) -> SubProcedure {
    let first = run.items.first().map(|(_, id)| tree.get(*id).span);
    let last = run.items.last().map(|(_, id)| tree.get(*id).span);
    let span = match (first, last) {
        (Some(first), Some(last)) => first.merge(last),
        _ => Span::default(),
    };

    let items = run
        .items
        .into_iter()
        .map(|(label, id)| {
            let text = match tree.kind(id) {
                BlockKind::ListItem { text, .. } => text.clone(),
                _ => String::new(),
            };
            let nested = tree.content_of(id);
            SubStep {
                label,
                text,
                sub_procedures: track_sub_procedures(tree, &nested, diagnostics),
            }
        })
        .collect();

    SubProcedure {
        marker_type: run.marker_type,
        items,
        span,
    }
}

/// Next alphabetic label: `a` to `b`, `z` to `aa`, `az` to `ba`.
///
/// Case follows the input.
pub fn next_alpha(label: &str) -> String {
    if label.is_empty() {
        return "a".to_string();
    }
    let upper = label.chars().all(|c| c.is_ascii_uppercase());
    let (first, last) = if upper { ('A', 'Z') } else { ('a', 'z') };

    let mut chars: Vec<char> = label.chars().collect();
    let mut i = chars.len();
    loop {
        if i == 0 {
            chars.insert(0, first);
            break;
        }
        i -= 1;
        if chars[i] == last {
            chars[i] = first;
        } else {
            chars[i] = (chars[i] as u8 + 1) as char;
            break;
        }
    }
    chars.into_iter().collect()
}
