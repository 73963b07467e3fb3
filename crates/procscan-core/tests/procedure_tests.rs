//! Integration tests for procedure assembly, variations and grouping

use procscan_core::scanner::scan;
use procscan_core::tracker::track_sub_procedures;
use procscan_core::{
    parse_str, render_procedure, DiagnosticKind, Diagnostics, MarkerType, ParseOptions, ProcedureFormat,
    ProcedureParser,
};
use rstest::rstest;

// ============================================================================
// Fixtures
// ============================================================================

const TWO_STEP_DIRECTIVE: &str = r#"Create a Cluster
================

.. procedure::

   .. step:: Open the console

      Sign in first.

   .. step:: Create the cluster

      Pick a tier.
"#;

const TWO_STEP_LIST: &str = r#"Create a Cluster
================

1. Open the console

   Sign in first.

2. Create the cluster

   Pick a tier.
"#;

const COMPOSABLE_STEP: &str = r#"Connect
=======

.. composable-tutorial::
   :options: driver
   :defaults: nodejs

   .. procedure::

      .. step:: Install the driver

         .. selected-content::
            :selections: nodejs

            Run ``npm install mongodb``.

         .. selected-content::
            :selections: python

            Run ``pip install pymongo``.

      .. step:: Connect

         Use your connection string.
"#;

const PLATFORM_TABS: &str = r#"Install the Server
==================

.. tabs::

   .. tab:: Linux
      :tabid: linux

      .. procedure::

         .. step:: Download

            Use the package manager.

   .. tab:: macOS
      :tabid: macos

      .. procedure::

         .. step:: Download

            Use Homebrew.

   .. tab:: Windows
      :tabid: windows

      1. Download the installer
      2. Run the installer
"#;

// ============================================================================
// Sub-Procedure Tracking Tests
// ============================================================================

#[test]
fn test_continuation_markers_are_labelled_by_position() {
    let result = scan("a. Open the file\n#. Edit the setting\n#. Save it\n");
    let mut diagnostics = Diagnostics::new();
    let subs = track_sub_procedures(&result.tree, result.tree.roots(), &mut diagnostics);

    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].marker_type, MarkerType::Alphabetic);
    assert_eq!(subs[0].labels(), ["a", "b", "c"]);
    assert!(diagnostics.is_empty());
}

#[rstest]
#[case("1. One\n#. Two\n1. Three\n#. Four\n", 2)]
#[case("1. One\n2. Two\na. Three\n", 2)]
#[case("a. One\nb. Two\n\nSome text.\n\nc. Three\n", 2)]
#[case("1. One\n\n   Details.\n\n#. Two\n", 1)]
fn test_run_boundaries(#[case] input: &str, #[case] expected: usize) {
    let result = scan(input);
    let mut diagnostics = Diagnostics::new();
    let subs = track_sub_procedures(&result.tree, result.tree.roots(), &mut diagnostics);
    assert_eq!(subs.len(), expected);
}

#[test]
fn test_skipped_marker_is_kept_and_reported() {
    let result = scan("1. One\n3. Three\n");
    let mut diagnostics = Diagnostics::new();
    let subs = track_sub_procedures(&result.tree, result.tree.roots(), &mut diagnostics);

    assert_eq!(subs[0].labels(), ["1", "3"]);
    assert!(diagnostics.contains_kind(DiagnosticKind::UnknownMarker));
}

#[test]
fn test_continuation_after_largest_marker_starts_new_run() {
    let result = scan("4294967295. First\n#. Second\n");
    let mut diagnostics = Diagnostics::new();
    let subs = track_sub_procedures(&result.tree, result.tree.roots(), &mut diagnostics);

    assert_eq!(subs.len(), 2);
    assert_eq!(subs[0].labels(), ["4294967295"]);
    assert_eq!(subs[1].labels(), ["1"]);
    assert!(diagnostics.contains_kind(DiagnosticKind::UnknownMarker));

    let outcome = parse_str("4294967295. First\n#. Second\n");
    assert_eq!(outcome.procedures.len(), 2);
    assert!(outcome.diagnostics.contains_kind(DiagnosticKind::UnknownMarker));
}

#[test]
fn test_nested_sub_procedures() {
    let input = "1. Open the menu\n\n   a. Click File\n   #. Click Open\n\n2. Pick a file\n";
    let result = scan(input);
    let mut diagnostics = Diagnostics::new();
    let subs = track_sub_procedures(&result.tree, result.tree.roots(), &mut diagnostics);

    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].marker_type, MarkerType::Numeric);
    let nested = &subs[0].items[0].sub_procedures;
    assert_eq!(nested.len(), 1);
    assert_eq!(nested[0].marker_type, MarkerType::Alphabetic);
    assert_eq!(nested[0].labels(), ["a", "b"]);
}

#[test]
fn test_step_sub_procedures() {
    let input = r#".. procedure::

   .. step:: Configure

      a. Open the file
      #. Edit the setting
      #. Save it
"#;
    let outcome = parse_str(input);
    let procedure = &outcome.procedures.procedures()[0];
    let step = &procedure.steps[0];

    assert_eq!(step.sub_procedures.len(), 1);
    assert_eq!(step.sub_procedures[0].labels(), ["a", "b", "c"]);
    assert!(procedure.has_sub_steps);
    assert_eq!(procedure.max_depth(), 2);
}

// ============================================================================
// Procedure Format Tests
// ============================================================================

#[test]
fn test_directive_and_list_are_equivalent() {
    let directive = parse_str(TWO_STEP_DIRECTIVE);
    let list = parse_str(TWO_STEP_LIST);

    let a = &directive.procedures.procedures()[0];
    let b = &list.procedures.procedures()[0];
    assert_eq!(a.format, ProcedureFormat::Directive);
    assert_eq!(b.format, ProcedureFormat::OrderedList);

    let steps_a: Vec<_> = a.steps.iter().map(|s| (&s.title, &s.body)).collect();
    let steps_b: Vec<_> = b.steps.iter().map(|s| (&s.title, &s.body)).collect();
    assert_eq!(steps_a, steps_b);
    assert_eq!(a.hash, b.hash);
}

#[test]
fn test_numbered_headings() {
    let input = r#"Deploy
======

Procedure
---------

1. Prepare the host
~~~~~~~~~~~~~~~~~~~

Check the prerequisites.

2. Start the service
~~~~~~~~~~~~~~~~~~~~

Run the start script.

Next Steps
----------

1. Read the guide
"#;
    let outcome = parse_str(input);
    let procedures = outcome.procedures.procedures();
    assert_eq!(procedures.len(), 2);

    let numbered = &procedures[0];
    assert_eq!(numbered.format, ProcedureFormat::NumberedHeadings);
    assert_eq!(numbered.heading, "Procedure");
    let titles: Vec<_> = numbered.steps.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, ["Prepare the host", "Start the service"]);
    assert_eq!(numbered.steps[1].body, "Run the start script.");

    assert_eq!(procedures[1].heading, "Next Steps");
    assert_eq!(procedures[1].format, ProcedureFormat::OrderedList);
}

#[test]
fn test_nested_procedure_in_step() {
    let input = r#".. procedure::

   .. step:: Set up replication

      Start each member.

      .. procedure::

         .. step:: Start the primary

            Run mongod.

         .. step:: Start a secondary

            Run mongod again.
"#;
    let outcome = parse_str(input);
    assert_eq!(outcome.procedures.len(), 1);

    let procedure = &outcome.procedures.procedures()[0];
    let step = &procedure.steps[0];
    assert_eq!(step.body, "Start each member.");
    assert_eq!(step.nested_steps.len(), 2);
    assert!(procedure.has_sub_steps);
    assert_eq!(procedure.max_depth(), 2);
}

#[rstest]
#[case(".. procedure::\n\nThis text is not part of it.\n")]
#[case(".. procedure::\n")]
#[case("Intro\n=====\n\n.. procedure::\n   :style: normal\n")]
fn test_empty_procedure_is_dropped_silently(#[case] input: &str) {
    let outcome = parse_str(input);
    assert!(outcome.procedures.is_empty());
    assert!(outcome.diagnostics.is_empty());
}

#[test]
fn test_stray_step_is_reported() {
    let outcome = parse_str(".. step:: Lonely\n\n   Text.\n");
    assert!(outcome.procedures.is_empty());
    assert!(outcome.diagnostics.contains_kind(DiagnosticKind::StrayBlock));
}

// ============================================================================
// Heading Tests
// ============================================================================

#[test]
fn test_generic_heading_keeps_previous_title() {
    let input = "Install\n=======\n\nOverview\n--------\n\n1. Download\n2. Unpack\n";
    let outcome = parse_str(input);
    assert_eq!(outcome.procedures.procedures()[0].heading, "Install");
}

#[test]
fn test_configured_generic_headings() {
    let input = "Install\n=======\n\nBefore You Begin\n----------------\n\n1. Download\n2. Unpack\n";
    let parser = ProcedureParser::new(ParseOptions::default().with_generic_headings(["before you begin"]));
    let outcome = parser.parse_text(input);
    assert_eq!(outcome.procedures.procedures()[0].heading, "Install");
}

#[test]
fn test_procedure_without_heading() {
    let outcome = parse_str("1. Download\n2. Unpack\n");
    assert_eq!(outcome.procedures.procedures()[0].heading, "");
}

// ============================================================================
// Variation Tests
// ============================================================================

#[test]
fn test_composable_step_variations() {
    let outcome = parse_str(COMPOSABLE_STEP);
    assert_eq!(outcome.procedures.len(), 1);

    let procedure = &outcome.procedures.procedures()[0];
    assert_eq!(procedure.labels(), ["driver=nodejs", "driver=python"]);
    let composable = procedure.composable.as_ref().unwrap();
    assert_eq!(composable.options, ["driver"]);
    assert_eq!(composable.defaults, ["nodejs"]);

    let analysis = outcome.procedures.analysis();
    assert_eq!(analysis.len(), 1);
    assert_eq!(analysis.entries[0].appearances, 1);
    assert_eq!(analysis.entries[0].labels, ["driver=nodejs", "driver=python"]);

    let extraction = outcome.procedures.extraction();
    assert_eq!(extraction.len(), 1);
    assert_eq!(extraction.units[0].labels, ["driver=nodejs", "driver=python"]);
}

#[test]
fn test_composable_procedures_merge_by_content() {
    let input = r#"Connect
=======

.. composable-tutorial::
   :options: driver

   .. selected-content::
      :selections: nodejs

      .. procedure::

         .. step:: Connect

            Use your connection string.

   .. selected-content::
      :selections: python

      .. procedure::

         .. step:: Connect

            Use your connection string.

   .. selected-content::
      :selections: java

      .. procedure::

         .. step:: Connect

            Build a client first.
"#;
    let outcome = parse_str(input);
    let procedures = outcome.procedures.procedures();
    assert_eq!(procedures.len(), 2);
    assert_eq!(procedures[0].labels(), ["driver=nodejs", "driver=python"]);
    assert_eq!(procedures[1].labels(), ["driver=java"]);

    let analysis = outcome.procedures.analysis();
    assert_eq!(analysis.entries[0].appearances, 2);
    assert_eq!(analysis.entries[0].distinct, 2);
}

#[test]
fn test_step_tabs_outside_composable() {
    let input = r#".. procedure::

   .. step:: Install the driver

      .. tabs::

         .. tab:: Sync
            :tabid: sync

            Use the sync client.

         .. tab:: Async
            :tabid: async

            Use the async client.
"#;
    let outcome = parse_str(input);
    let step = &outcome.procedures.procedures()[0].steps[0];
    let labels: Vec<_> = step.variations.iter().map(|v| v.label.as_str()).collect();
    assert_eq!(labels, ["async", "sync"]);
    assert_eq!(step.variant_content["sync"], "Use the sync client.");
}

#[test]
fn test_selection_and_tab_labels_combine() {
    let input = r#".. composable-tutorial::
   :options: driver

   .. procedure::

      .. step:: Connect

         .. selected-content::
            :selections: python

            .. tabs::

               .. tab:: Sync
                  :tabid: sync

                  Use MongoClient.

               .. tab:: Async
                  :tabid: async

                  Use AsyncMongoClient.
"#;
    let outcome = parse_str(input);
    let procedure = &outcome.procedures.procedures()[0];
    assert_eq!(
        procedure.labels(),
        ["driver=python; async", "driver=python; sync"]
    );
}

#[test]
fn test_explicit_axis_selections() {
    let input = r#".. composable-tutorial::
   :options: deployment, driver

   .. procedure::

      .. step:: Connect

         .. selected-content::
            :selections: deployment=atlas, driver=nodejs

            Use the Atlas URI.
"#;
    let outcome = parse_str(input);
    assert_eq!(
        outcome.procedures.procedures()[0].labels(),
        ["deployment=atlas, driver=nodejs"]
    );
}

// ============================================================================
// Tab Set Tests
// ============================================================================

#[test]
fn test_tab_set_split() {
    let outcome = parse_str(PLATFORM_TABS);
    let set = &outcome.procedures;
    assert_eq!(set.len(), 3);
    assert_eq!(set.tab_sets().len(), 1);

    let tab_set = &set.tab_sets()[0];
    assert_eq!(tab_set.heading, "Install the Server");
    assert_eq!(tab_set.tab_ids, ["linux", "macos", "windows"]);
    assert_eq!(tab_set.procedures.len(), 3);

    let extraction = set.extraction();
    assert_eq!(extraction.len(), 3);
    let mut hashes: Vec<_> = extraction.iter().map(|u| u.hash.as_str()).collect();
    hashes.dedup();
    assert_eq!(hashes.len(), 3);

    let analysis = set.analysis();
    assert_eq!(analysis.len(), 1);
    assert_eq!(analysis.entries[0].appearances, 3);
    assert_eq!(analysis.entries[0].labels, ["linux", "macos", "windows"]);
    assert!(analysis.entries[0].tab_set.is_some());
}

#[test]
fn test_tab_procedures_record_format_and_tab() {
    let outcome = parse_str(PLATFORM_TABS);
    let procedures = outcome.procedures.procedures();
    assert_eq!(procedures[0].tab_id.as_deref(), Some("linux"));
    assert_eq!(procedures[2].format, ProcedureFormat::OrderedList);
    assert_eq!(procedures[2].steps.len(), 2);
}

#[test]
fn test_nested_tabs_stay_opaque() {
    let input = r#".. tabs::

   .. tab:: Linux
      :tabid: linux

      .. procedure::

         .. step:: Configure

            .. tabs::

               .. tab:: Shell
                  :tabid: shell

                  Edit the file.
"#;
    let outcome = parse_str(input);
    let step = &outcome.procedures.procedures()[0].steps[0];
    assert!(step.variations.is_empty());
    assert!(step.content.contains(".. tabs::"));
}

#[test]
fn test_tab_group_without_procedures_is_ignored() {
    let input = ".. tabs::\n\n   .. tab:: One\n      :tabid: one\n\n      Just text.\n";
    let outcome = parse_str(input);
    assert!(outcome.procedures.is_empty());
    assert!(outcome.procedures.tab_sets().is_empty());
}

// ============================================================================
// Hashing Tests
// ============================================================================

#[test]
fn test_parsing_is_deterministic() {
    let first = parse_str(COMPOSABLE_STEP);
    let second = parse_str(COMPOSABLE_STEP);

    let a = &first.procedures.procedures()[0];
    let b = &second.procedures.procedures()[0];
    assert_eq!(a.hash, b.hash);
    assert_eq!(a.labels(), b.labels());
    assert_eq!(a.hash.as_str().len(), 64);
}

#[test]
fn test_hash_ignores_variation_discovery_order() {
    let nodejs = "         .. selected-content::\n            :selections: nodejs\n\n            Run ``npm install mongodb``.\n";
    let python = "         .. selected-content::\n            :selections: python\n\n            Run ``pip install pymongo``.\n";
    assert!(COMPOSABLE_STEP.contains(&format!("{}\n{}", nodejs, python)));
    let swapped = COMPOSABLE_STEP.replace(
        &format!("{}\n{}", nodejs, python),
        &format!("{}\n{}", python, nodejs),
    );
    assert_ne!(swapped, COMPOSABLE_STEP);

    let original = parse_str(COMPOSABLE_STEP);
    let reordered = parse_str(&swapped);
    let a = &original.procedures.procedures()[0];
    let b = &reordered.procedures.procedures()[0];
    assert_eq!(a.hash, b.hash);
    assert_eq!(a.labels(), b.labels());
    assert_eq!(b.labels(), ["driver=nodejs", "driver=python"]);
}

#[test]
fn test_hash_changes_with_step_body() {
    let changed = TWO_STEP_DIRECTIVE.replace("Pick a tier.", "Pick the free tier.");
    let a = parse_str(TWO_STEP_DIRECTIVE);
    let b = parse_str(&changed);
    assert_ne!(a.procedures.procedures()[0].hash, b.procedures.procedures()[0].hash);
}

#[test]
fn test_hash_ignores_whitespace_layout() {
    let reflowed = TWO_STEP_DIRECTIVE.replace("Pick a tier.", "Pick   a\n      tier.");
    let a = parse_str(TWO_STEP_DIRECTIVE);
    let b = parse_str(&reflowed);
    assert_eq!(a.procedures.procedures()[0].hash, b.procedures.procedures()[0].hash);
}

#[test]
fn test_hash_changes_with_variant_content() {
    let changed = COMPOSABLE_STEP.replace("pip install pymongo", "pip install motor");
    let a = parse_str(COMPOSABLE_STEP);
    let b = parse_str(&changed);
    assert_ne!(a.procedures.procedures()[0].hash, b.procedures.procedures()[0].hash);
}

#[test]
fn test_duplicate_procedures_share_a_unit() {
    let input = format!("{}\n{}", TWO_STEP_DIRECTIVE, TWO_STEP_LIST);
    let outcome = parse_str(&input);
    assert_eq!(outcome.procedures.len(), 2);

    let analysis = outcome.procedures.analysis();
    assert_eq!(analysis.entries[0].appearances, 2);
    assert_eq!(analysis.entries[0].distinct, 1);
    assert_eq!(outcome.procedures.extraction().len(), 1);
}

// ============================================================================
// Extraction Tests
// ============================================================================

#[test]
fn test_extraction_file_stem() {
    let outcome = parse_str(PLATFORM_TABS);
    let extraction = outcome.procedures.extraction();
    let unit = &extraction.units[0];

    let stem = unit.file_stem("page");
    assert!(stem.starts_with("install-the-server-download-"));
    assert!(stem.ends_with(unit.short_hash));
    assert_eq!(unit.short_hash.len(), 6);
}

#[test]
fn test_extraction_file_stem_fallback() {
    let outcome = parse_str("1. Download\n2. Unpack\n");
    let extraction = outcome.procedures.extraction();
    assert!(extraction.units[0].file_stem("getting_started").starts_with("getting-started-download-"));
}

#[rstest]
#[case("driver=python", 1)]
#[case("driver=java", 0)]
fn test_selection_filter(#[case] label: &str, #[case] expected: usize) {
    let outcome = parse_str(COMPOSABLE_STEP);
    let extraction = outcome.procedures.extraction().filter_selection(label);
    assert_eq!(extraction.len(), expected);
}

#[test]
fn test_render_procedure_for_label() {
    let outcome = parse_str(COMPOSABLE_STEP);
    let procedure = &outcome.procedures.procedures()[0];

    let python = render_procedure(procedure, Some("driver=python"));
    assert!(python.starts_with(".. procedure::\n   :style: normal\n\n   .. step:: Install the driver\n"));
    assert!(python.contains("      Run ``pip install pymongo``."));
    assert!(!python.contains("npm install"));

    let all = render_procedure(procedure, None);
    assert!(all.contains("      .. variation: driver=nodejs"));
    assert!(all.contains("npm install"));
}

#[test]
fn test_render_list_procedure() {
    let outcome = parse_str(TWO_STEP_LIST);
    let text = render_procedure(&outcome.procedures.procedures()[0], None);
    assert_eq!(
        text,
        "1. Open the console\n\n   Sign in first.\n\n2. Create the cluster\n\n   Pick a tier.\n"
    );
}
