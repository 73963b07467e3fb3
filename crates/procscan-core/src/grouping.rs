//! Procedure assembly and the two read views.
//!
//! The assembler walks an expanded block tree in document order, tracking
//! the current section heading, and turns every recognized pattern into
//! [`Procedure`]s. The resulting [`ProcedureSet`] is then read either
//! through [`AnalysisView`] (one entry per heading) or [`ExtractionView`]
//! (one unit per heading and content hash).

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::block::{BlockId, BlockKind, BlockTree};
use crate::error::{Diagnostic, Diagnostics};
use crate::hasher::{content_digest, identity_hash};
use crate::model::{
    canonical_order, ComposableInfo, IdentityHash, Procedure, ProcedureFormat, ProcedureId, Step,
    TabSet, TabSetId, Variation,
};
use crate::render::blocks_to_rst;
use crate::span::Span;
use crate::text::{normalize_whitespace, slugify};
use crate::tracker::{runs, track_sub_procedures};
use crate::variation::{resolve_selections, step_variations, tabs_of, VariationScope};
use crate::yaml_steps::is_steps_file;

/// All procedures of one parsed document tree.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcedureSet {
    procedures: Vec<Procedure>,
    tab_sets: Vec<TabSet>,
}

impl ProcedureSet {
    /// Procedures in document order.
    pub fn procedures(&self) -> &[Procedure] {
        &self.procedures
    }

    pub fn get(&self, id: ProcedureId) -> Option<&Procedure> {
        self.procedures.get(id.0)
    }

    pub fn tab_sets(&self) -> &[TabSet] {
        &self.tab_sets
    }

    pub fn tab_set(&self, id: TabSetId) -> Option<&TabSet> {
        self.tab_sets.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProcedureId, &Procedure)> {
        self.procedures
            .iter()
            .enumerate()
            .map(|(i, p)| (ProcedureId(i), p))
    }

    /// Group procedures by heading.
    pub fn analysis(&self) -> AnalysisView<'_> {
        let mut entries: Vec<AnalysisEntry<'_>> = Vec::new();
        let mut hashes: Vec<BTreeSet<&IdentityHash>> = Vec::new();
        let mut labels: Vec<BTreeSet<&str>> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();

        for (id, procedure) in self.iter() {
            let slot = *index.entry(procedure.heading.as_str()).or_insert_with(|| {
                entries.push(AnalysisEntry {
                    heading: &procedure.heading,
                    appearances: 0,
                    distinct: 0,
                    labels: Vec::new(),
                    max_depth: 0,
                    procedures: Vec::new(),
                    tab_set: None,
                });
                hashes.push(BTreeSet::new());
                labels.push(BTreeSet::new());
                entries.len() - 1
            });

            let entry = &mut entries[slot];
            entry.appearances += 1;
            entry.max_depth = entry.max_depth.max(procedure.max_depth());
            entry.procedures.push(id);
            entry.tab_set = entry.tab_set.or(procedure.tab_set);
            hashes[slot].insert(&procedure.hash);
            labels[slot].extend(procedure.labels());
        }

        for ((entry, hashes), labels) in entries.iter_mut().zip(hashes).zip(labels) {
            entry.distinct = hashes.len();
            entry.labels = labels.into_iter().collect();
        }
        AnalysisView { entries }
    }

    /// One unit per distinct heading and hash.
    pub fn extraction(&self) -> ExtractionView<'_> {
        let mut units: Vec<ExtractionUnit<'_>> = Vec::new();
        let mut index: HashMap<(&str, &IdentityHash), usize> = HashMap::new();

        for (id, procedure) in self.iter() {
            let key = (procedure.heading.as_str(), &procedure.hash);
            if let Some(&slot) = index.get(&key) {
                let unit = &mut units[slot];
                for label in procedure.labels() {
                    if !unit.labels.contains(&label) {
                        unit.labels.push(label);
                    }
                }
                unit.labels.sort_unstable();
                continue;
            }
            index.insert(key, units.len());
            units.push(ExtractionUnit {
                procedure: id,
                heading: &procedure.heading,
                hash: &procedure.hash,
                short_hash: procedure.hash.short(),
                steps: &procedure.steps,
                labels: procedure.labels(),
                tab_id: procedure.tab_id.as_deref(),
            });
        }
        ExtractionView { units }
    }
}

/// One heading of the analysis view.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisEntry<'a> {
    pub heading: &'a str,
    /// Procedures found under this heading, one per tab for tab sets.
    pub appearances: usize,
    /// Distinct identity hashes among them.
    pub distinct: usize,
    /// Variation and tab labels, sorted.
    pub labels: Vec<&'a str>,
    pub max_depth: usize,
    pub procedures: Vec<ProcedureId>,
    pub tab_set: Option<TabSetId>,
}

/// Procedures grouped by heading, in order of first appearance.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisView<'a> {
    pub entries: Vec<AnalysisEntry<'a>>,
}

impl<'a> AnalysisView<'a> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnalysisEntry<'a>> {
        self.entries.iter()
    }

    /// Sum of appearances over all headings.
    pub fn total_appearances(&self) -> usize {
        self.entries.iter().map(|e| e.appearances).sum()
    }
}

/// One output the extraction caller should write.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionUnit<'a> {
    pub procedure: ProcedureId,
    pub heading: &'a str,
    pub hash: &'a IdentityHash,
    pub short_hash: &'a str,
    pub steps: &'a [Step],
    /// Selection and tab labels the content applies to, sorted.
    pub labels: Vec<&'a str>,
    pub tab_id: Option<&'a str>,
}

impl<'a> ExtractionUnit<'a> {
    /// `<heading>-<first step>-<short hash>`, slugified.
    ///
    /// `fallback` stands in for an empty heading.
    pub fn file_stem(&self, fallback: &str) -> String {
        let mut heading = slugify(self.heading);
        if heading.is_empty() {
            heading = slugify(fallback);
        }
        let first = self
            .steps
            .first()
            .map(|s| slugify(&s.title))
            .unwrap_or_default();

        [heading.as_str(), first.as_str(), self.short_hash]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-")
    }

    /// The unit's own label matching `label`, either exactly or as one
    /// part of a combined `selection; tab` label.
    pub fn matching_label(&self, label: &str) -> Option<&'a str> {
        self.labels
            .iter()
            .copied()
            .find(|l| *l == label)
            .or_else(|| {
                self.labels
                    .iter()
                    .copied()
                    .find(|l| l.split("; ").any(|part| part == label))
            })
    }

    pub fn applies_to(&self, label: &str) -> bool {
        self.matching_label(label).is_some()
    }
}

/// Units in order of first appearance.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionView<'a> {
    pub units: Vec<ExtractionUnit<'a>>,
}

impl<'a> ExtractionView<'a> {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtractionUnit<'a>> {
        self.units.iter()
    }

    /// Keep only units that apply to `label`.
    pub fn filter_selection(self, label: &str) -> Self {
        Self {
            units: self
                .units
                .into_iter()
                .filter(|unit| unit.applies_to(label))
                .collect(),
        }
    }
}

/// Builds procedures from an expanded block tree.
pub(crate) struct Assembler<'t> {
    tree: &'t BlockTree,
    generic_headings: &'t [String],
    procedures: Vec<Procedure>,
    tab_sets: Vec<TabSet>,
    diagnostics: Diagnostics,
}

impl<'t> Assembler<'t> {
    pub(crate) fn new(tree: &'t BlockTree, generic_headings: &'t [String]) -> Self {
        Self {
            tree,
            generic_headings,
            procedures: Vec::new(),
            tab_sets: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Assemble every procedure in the tree.
    pub(crate) fn run(mut self) -> (ProcedureSet, Diagnostics) {
        let roots = self.tree.root_content();
        let mut heading = String::new();
        self.walk(&roots, &mut heading, VariationScope::default());
        self.finish()
    }

    fn finish(mut self) -> (ProcedureSet, Diagnostics) {
        for procedure in &mut self.procedures {
            procedure.hash = identity_hash(procedure);
        }
        for (i, procedure) in self.procedures.iter().enumerate() {
            if let (Some(set), Some(tab)) = (procedure.tab_set, &procedure.tab_id) {
                if let Some(tab_set) = self.tab_sets.get_mut(set.0) {
                    tab_set.procedures.push((tab.clone(), ProcedureId(i)));
                }
            }
        }
        for tab_set in &mut self.tab_sets {
            tab_set.procedures.sort();
        }
        (
            ProcedureSet {
                procedures: self.procedures,
                tab_sets: self.tab_sets,
            },
            self.diagnostics,
        )
    }

    fn walk(&mut self, ids: &[BlockId], heading: &mut String, scope: VariationScope<'_>) {
        let tree = self.tree;
        let mut i = 0;
        while i < ids.len() {
            let id = ids[i];
            match tree.kind(id) {
                BlockKind::Heading { text, .. } => {
                    let text = text.trim();
                    let lower = text.to_lowercase();
                    if lower == "procedure" || lower == "steps" {
                        *heading = text.to_string();
                        let next = ids[i + 1..]
                            .iter()
                            .position(|&b| matches!(tree.kind(b), BlockKind::Heading { .. }))
                            .map(|p| i + 1 + p);
                        if let Some(first) = next.filter(|&k| {
                            matches!(tree.kind(ids[k]), BlockKind::Heading { numbered: true, .. })
                        }) {
                            self.walk(&ids[i + 1..first], heading, scope);
                            i = self.numbered_headings(ids, first, heading, scope);
                            continue;
                        }
                    } else if !text.is_empty() && !self.is_generic(&lower) {
                        *heading = text.to_string();
                    }
                }
                BlockKind::Composable { options, defaults } => {
                    let info = ComposableInfo {
                        options: options.clone(),
                        defaults: defaults.clone(),
                    };
                    self.composable(id, &info, heading);
                }
                BlockKind::TabGroup { .. } if !scope.inside_tab => self.tab_set(id, heading, scope),
                BlockKind::Procedure => {
                    if let Some(procedure) = self.directive_procedure(id, heading, scope) {
                        self.procedures.push(procedure);
                    }
                }
                BlockKind::ListItem { .. } => {
                    let end = ids[i..]
                        .iter()
                        .position(|&b| !matches!(tree.kind(b), BlockKind::ListItem { .. }))
                        .map_or(ids.len(), |p| i + p);
                    self.list_procedures(&ids[i..end], heading, scope);
                    i = end;
                    continue;
                }
                BlockKind::Step { .. } => {
                    self.diagnostics.push(
                        Diagnostic::stray("step", "a procedure", tree.get(id).span)
                            .in_file(tree.source_of(id)),
                    );
                }
                BlockKind::ConditionalContent { .. } => {
                    let inner = tree.content_of(id);
                    self.walk(&inner, heading, scope);
                }
                BlockKind::TabGroup { .. }
                | BlockKind::Tab { .. }
                | BlockKind::Include { .. }
                | BlockKind::Prose { .. } => {}
            }
            i += 1;
        }
    }

    fn is_generic(&self, lower: &str) -> bool {
        self.generic_headings
            .iter()
            .any(|generic| generic.eq_ignore_ascii_case(lower))
    }

    /// Numbered headings after a "Procedure" heading, each one a step.
    ///
    /// Ends at the first heading at or above the steps' level that is not
    /// itself a numbered step. Returns the index after the procedure.
    fn numbered_headings(
        &mut self,
        ids: &[BlockId],
        start: usize,
        heading: &str,
        scope: VariationScope<'_>,
    ) -> usize {
        let tree = self.tree;
        let step_level = match tree.kind(ids[start]) {
            BlockKind::Heading { level, .. } => *level,
            _ => return start,
        };

        let mut parts: Vec<(String, Vec<BlockId>, Span)> = Vec::new();
        let mut j = start;
        while j < ids.len() {
            let id = ids[j];
            let span = tree.get(id).span;
            match tree.kind(id) {
                BlockKind::Heading {
                    text,
                    level,
                    numbered: true,
                } if *level == step_level => {
                    parts.push((strip_number(text).to_string(), Vec::new(), span));
                }
                BlockKind::Heading { level, .. } if *level <= step_level => break,
                _ => {
                    if let Some((_, content, part_span)) = parts.last_mut() {
                        content.push(id);
                        *part_span = part_span.merge(span);
                    }
                }
            }
            j += 1;
        }

        let steps: Vec<Step> = parts
            .into_iter()
            .map(|(title, content, span)| self.build_step(&title, &content, span, scope))
            .collect();
        if let Some(procedure) = self.procedure(heading, ProcedureFormat::NumberedHeadings, steps, ids[start], scope) {
            self.procedures.push(procedure);
        }
        j
    }

    fn composable(&mut self, id: BlockId, info: &ComposableInfo, heading: &mut String) {
        let tree = self.tree;
        let scope = VariationScope {
            composable: Some(info),
            inside_tab: false,
        };

        let mut pending: Vec<BlockId> = Vec::new();
        let mut conditionals: Vec<(BlockId, Variation, String)> = Vec::new();
        for child in tree.content_of(id) {
            if let BlockKind::ConditionalContent { selections } = tree.kind(child) {
                self.walk(&pending, heading, scope);
                pending.clear();
                let variation = Variation::selection(resolve_selections(selections, &info.options));
                conditionals.push((child, variation, heading.clone()));
            } else {
                pending.push(child);
            }
        }
        self.walk(&pending, heading, scope);

        // Procedures inside selected-content blocks: identical content found
        // under several selections is one procedure carrying all of them.
        let mut groups: Vec<(IdentityHash, Procedure)> = Vec::new();
        for (block, variation, mut local_heading) in conditionals {
            let start = self.procedures.len();
            let inner = tree.content_of(block);
            self.walk(&inner, &mut local_heading, scope);
            let produced: Vec<Procedure> = self.procedures.drain(start..).collect();

            for mut procedure in produced {
                let digest = content_digest(&procedure);
                match groups
                    .iter_mut()
                    .find(|(d, p)| *d == digest && p.heading == procedure.heading)
                {
                    Some((_, existing)) => existing.variations.push(variation.clone()),
                    None => {
                        procedure.variations.push(variation.clone());
                        groups.push((digest, procedure));
                    }
                }
            }
        }
        for (_, mut procedure) in groups {
            canonical_order(&mut procedure.variations);
            self.procedures.push(procedure);
        }
    }

    /// A top-level tab group whose tabs each hold a procedure.
    fn tab_set(&mut self, group: BlockId, heading: &str, scope: VariationScope<'_>) {
        let set = TabSetId(self.tab_sets.len());
        let tab_scope = VariationScope {
            composable: scope.composable,
            inside_tab: true,
        };

        let mut members = Vec::new();
        for (tab_id, content) in tabs_of(self.tree, group) {
            let start = self.procedures.len();
            let mut local_heading = heading.to_string();
            self.walk(&content, &mut local_heading, tab_scope);
            let produced: Vec<Procedure> = self.procedures.drain(start..).collect();

            if let Some(mut procedure) = produced.into_iter().next() {
                procedure.heading = heading.to_string();
                procedure.tab_set = Some(set);
                procedure.variations.push(Variation::tab(tab_id.clone()));
                canonical_order(&mut procedure.variations);
                procedure.tab_id = Some(tab_id);
                members.push(procedure);
            }
        }
        if members.is_empty() {
            return;
        }

        let mut tab_ids: Vec<String> = members.iter().filter_map(|p| p.tab_id.clone()).collect();
        tab_ids.sort();
        tab_ids.dedup();
        self.tab_sets.push(TabSet {
            heading: heading.to_string(),
            tab_ids,
            procedures: Vec::new(),
        });
        self.procedures.extend(members);
    }

    fn directive_procedure(&mut self, id: BlockId, heading: &str, scope: VariationScope<'_>) -> Option<Procedure> {
        let steps = self.directive_steps(id, scope);
        let format = match self.tree.source_of(id) {
            Some(path) if is_steps_file(path) => ProcedureFormat::YamlSteps,
            _ => ProcedureFormat::Directive,
        };
        self.procedure(heading, format, steps, id, scope)
    }

    fn directive_steps(&mut self, id: BlockId, scope: VariationScope<'_>) -> Vec<Step> {
        let tree = self.tree;
        tree.content_of(id)
            .into_iter()
            .filter_map(|child| match tree.kind(child) {
                BlockKind::Step { title } => Some((child, title)),
                _ => None,
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|(child, title)| {
                let content = tree.content_of(child);
                self.build_step(title, &content, tree.get(child).span, scope)
            })
            .collect()
    }

    fn list_procedures(&mut self, items: &[BlockId], heading: &str, scope: VariationScope<'_>) {
        let tree = self.tree;
        for run in runs(tree, items, &mut self.diagnostics) {
            let Some(&(_, first)) = run.items.first() else {
                continue;
            };
            let steps = run
                .items
                .iter()
                .map(|&(_, item)| {
                    let title = match tree.kind(item) {
                        BlockKind::ListItem { text, .. } => text.as_str(),
                        _ => "",
                    };
                    let content = tree.content_of(item);
                    self.build_step(title, &content, tree.get(item).span, scope)
                })
                .collect();
            if let Some(procedure) = self.procedure(heading, ProcedureFormat::OrderedList, steps, first, scope) {
                self.procedures.push(procedure);
            }
        }
    }

    fn build_step(&mut self, title: &str, content: &[BlockId], span: Span, scope: VariationScope<'_>) -> Step {
        let tree = self.tree;
        let found = step_variations(tree, content, scope);

        let mut general = Vec::with_capacity(found.general.len());
        let mut nested_steps = Vec::new();
        for &id in &found.general {
            if matches!(tree.kind(id), BlockKind::Procedure) {
                nested_steps.extend(self.directive_steps(id, scope));
            } else {
                general.push(id);
            }
        }

        let text = blocks_to_rst(tree, &general);
        Step {
            title: normalize_whitespace(title),
            body: normalize_whitespace(&text),
            content: text,
            sub_procedures: track_sub_procedures(tree, &general, &mut self.diagnostics),
            variations: found.variations,
            variant_content: found.content,
            nested_steps,
            span,
        }
    }

    /// Wrap steps into a procedure; `None` when there are no steps.
    fn procedure(
        &self,
        heading: &str,
        format: ProcedureFormat,
        steps: Vec<Step>,
        anchor: BlockId,
        scope: VariationScope<'_>,
    ) -> Option<Procedure> {
        if steps.is_empty() {
            return None;
        }
        let mut variations: Vec<Variation> = steps.iter().flat_map(|s| s.variations.iter().cloned()).collect();
        canonical_order(&mut variations);

        let span = steps
            .iter()
            .fold(self.tree.get(anchor).span, |acc, step| acc.merge(step.span));
        Some(Procedure {
            heading: heading.to_string(),
            format,
            has_sub_steps: steps.iter().any(Step::has_sub_steps),
            steps,
            tab_set: None,
            tab_id: None,
            composable: scope.composable.cloned(),
            variations,
            hash: IdentityHash::default(),
            span,
            file: self.tree.source_of(anchor).map(|p| p.to_path_buf()),
        })
    }
}

/// `"2. Configure"` becomes `"Configure"`.
fn strip_number(text: &str) -> &str {
    let rest = text.trim_start().trim_start_matches(|c: char| c.is_ascii_digit());
    rest.strip_prefix('.').unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_number() {
        assert_eq!(strip_number("2. Configure"), "Configure");
        assert_eq!(strip_number("10.Start"), "Start");
    }
}
