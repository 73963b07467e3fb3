//! Canonical procedure model.
//!
//! Every surface syntax ends up as the same [`Procedure`] / [`Step`] /
//! [`SubProcedure`] shape. Entities are built once per parse pass and are
//! not mutated after the grouping engine receives them.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::span::Span;

/// Ordering scheme of a sub-procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerType {
    Numeric,
    Alphabetic,
}

impl MarkerType {
    pub fn as_str(self) -> &'static str {
        match self {
            MarkerType::Numeric => "numeric",
            MarkerType::Alphabetic => "alphabetic",
        }
    }
}

/// One item of a [`SubProcedure`].
///
/// `label` is derived from the run's position, never copied from a `#.`
/// marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubStep {
    pub label: String,
    pub text: String,
    /// Lists nested inside this item.
    pub sub_procedures: Vec<SubProcedure>,
}

/// A run of ordered-list items inside a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubProcedure {
    pub marker_type: MarkerType,
    pub items: Vec<SubStep>,
    pub span: Span,
}

impl SubProcedure {
    /// Labels of the items in order.
    pub fn labels(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.label.as_str()).collect()
    }

    fn depth(&self) -> usize {
        1 + self
            .items
            .iter()
            .flat_map(|item| item.sub_procedures.iter())
            .map(SubProcedure::depth)
            .max()
            .unwrap_or(0)
    }
}

/// A labelled alternative rendering.
///
/// The label combines conditional-content selections and a tab id, for
/// example `driver=nodejs`, `python` or `driver=nodejs; async`. Ordering is
/// by label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Variation {
    pub label: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub selections: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab: Option<String>,
}

impl Variation {
    /// A variation from conditional-content selections alone.
    pub fn selection(selections: Vec<String>) -> Self {
        Self::new(selections, None)
    }

    /// A bare tab identifier.
    pub fn tab(id: impl Into<String>) -> Self {
        Self::new(Vec::new(), Some(id.into()))
    }

    /// Selections combined with a tab.
    pub fn new(selections: Vec<String>, tab: Option<String>) -> Self {
        let mut label = selections.join(", ");
        if let Some(tab) = &tab {
            if !label.is_empty() {
                label.push_str("; ");
            }
            label.push_str(tab);
        }
        Self {
            label,
            selections,
            tab,
        }
    }
}

impl fmt::Display for Variation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Sort and deduplicate variations.
///
/// Everything that feeds a hash or a view goes through here.
pub fn canonical_order(variations: &mut Vec<Variation>) {
    variations.sort();
    variations.dedup_by(|a, b| a.label == b.label);
}

/// One instruction unit of a procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub title: String,
    /// Content outside any variation, whitespace-normalized.
    pub body: String,
    /// Content outside any variation as reStructuredText.
    pub content: String,
    pub sub_procedures: Vec<SubProcedure>,
    /// Variations found in this step, in canonical order.
    pub variations: Vec<Variation>,
    /// Content specific to each variation, keyed by label.
    pub variant_content: BTreeMap<String, String>,
    /// Steps of a procedure nested in this step. Never promoted.
    pub nested_steps: Vec<Step>,
    pub span: Span,
}

impl Step {
    /// Whether the step owns sub-procedures or nested steps.
    pub fn has_sub_steps(&self) -> bool {
        !self.sub_procedures.is_empty() || !self.nested_steps.is_empty()
    }

    /// Nesting depth counting this step as 1.
    pub fn depth(&self) -> usize {
        let lists = self
            .sub_procedures
            .iter()
            .map(SubProcedure::depth)
            .max()
            .unwrap_or(0);
        let nested = self.nested_steps.iter().map(Step::depth).max().unwrap_or(0);
        1 + lists.max(nested)
    }
}

/// Surface syntax a procedure was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcedureFormat {
    /// `.. procedure::` with `.. step::` children.
    Directive,
    /// A top-level ordered list.
    OrderedList,
    /// Numbered headings under a "Procedure" heading.
    NumberedHeadings,
    /// A generated `steps-*.yaml` file.
    YamlSteps,
}

impl ProcedureFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcedureFormat::Directive => "directive",
            ProcedureFormat::OrderedList => "ordered-list",
            ProcedureFormat::NumberedHeadings => "numbered-headings",
            ProcedureFormat::YamlSteps => "yaml-steps",
        }
    }
}

/// Options declared by an enclosing `composable-tutorial`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComposableInfo {
    pub options: Vec<String>,
    pub defaults: Vec<String>,
}

/// Fixed-width content digest, hex encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct IdentityHash(String);

impl IdentityHash {
    pub(crate) fn from_hex(hex: String) -> Self {
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First six hex digits, enough to tell output files apart.
    pub fn short(&self) -> &str {
        self.0.get(..6).unwrap_or(&self.0)
    }
}

impl fmt::Display for IdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle of a procedure inside a [`ProcedureSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ProcedureId(pub usize);

/// Handle of a tab set inside a [`ProcedureSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TabSetId(pub usize);

/// One logical procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Procedure {
    /// Section title above the procedure; empty when there is none.
    pub heading: String,
    pub format: ProcedureFormat,
    pub steps: Vec<Step>,
    /// Tab set this procedure was split out of.
    pub tab_set: Option<TabSetId>,
    pub tab_id: Option<String>,
    pub composable: Option<ComposableInfo>,
    /// Every variation of the procedure, in canonical order.
    pub variations: Vec<Variation>,
    pub has_sub_steps: bool,
    pub hash: IdentityHash,
    pub span: Span,
    pub file: Option<PathBuf>,
}

impl Procedure {
    /// Variation labels in canonical order.
    pub fn labels(&self) -> Vec<&str> {
        self.variations.iter().map(|v| v.label.as_str()).collect()
    }

    /// Deepest step nesting.
    pub fn max_depth(&self) -> usize {
        self.steps.iter().map(Step::depth).max().unwrap_or(0)
    }
}

/// Procedures realized as sibling tabs of one top-level tab group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabSet {
    pub heading: String,
    /// Tab ids in sorted order.
    pub tab_ids: Vec<String>,
    /// Member procedures, one per tab, in tab-id order.
    pub procedures: Vec<(String, ProcedureId)>,
}
