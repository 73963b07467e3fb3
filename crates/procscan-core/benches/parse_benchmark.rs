//! Benchmarks for whole-document procedure parsing
//!
//! Run with: cargo bench -p procscan-core

use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use procscan_core::scanner::scan;
use procscan_core::{parse_str, MemoryFiles, ParseOptions, ProcedureParser, SourceRootResolver};

/// A page mixing every procedure syntax.
const SAMPLE: &str = r#"Install the Server
==================

.. tabs::

   .. tab:: Linux
      :tabid: linux

      .. procedure::

         .. step:: Import the key

            Import the public key used by the package manager.

         .. step:: Install the packages

            a. Reload the package index
            #. Install the server package
            #. Start the service

   .. tab:: Windows
      :tabid: windows

      1. Download the installer
      2. Run the installer

         Accept the defaults.

Connect
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

            .. tabs::

               .. tab:: Sync
                  :tabid: sync

                  Run ``pip install pymongo``.

               .. tab:: Async
                  :tabid: async

                  Run ``pip install motor``.

      .. step:: Connect

         Use your connection string.

Deploy
======

Procedure
---------

1. Prepare the host
~~~~~~~~~~~~~~~~~~~

Check the prerequisites.

2. Start the service
~~~~~~~~~~~~~~~~~~~~

.. include:: /includes/start.rst
"#;

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Bytes(SAMPLE.len() as u64));

    group.bench_function("scan", |b| {
        b.iter(|| {
            let result = scan(black_box(SAMPLE));
            black_box(result.tree.len())
        })
    });

    group.bench_function("parse_text", |b| {
        b.iter(|| {
            let outcome = parse_str(black_box(SAMPLE));
            black_box(outcome.procedures.len())
        })
    });

    let files = MemoryFiles::new().with(
        "/docs/source/includes/start.rst",
        "Run the start script.\n\n1. Check the log\n#. Confirm the port\n",
    );
    let resolver = SourceRootResolver::new("/docs/source");
    let parser = ProcedureParser::new(ParseOptions::default());
    group.bench_function("parse_with_includes", |b| {
        b.iter(|| {
            let outcome = parser
                .parse(Path::new("/docs/source/page.txt"), black_box(SAMPLE), &resolver, &files)
                .unwrap();
            black_box(outcome.procedures.len())
        })
    });

    group.finish();
}

fn bench_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("scaling");

    for size in [1, 5, 10, 20].iter() {
        let content: String = SAMPLE.repeat(*size);
        group.throughput(Throughput::Bytes(content.len() as u64));

        group.bench_with_input(BenchmarkId::new("parse_text", size), &content, |b, content| {
            b.iter(|| {
                let outcome = parse_str(black_box(content));
                black_box(outcome.procedures.len())
            })
        });
    }

    group.finish();
}

fn bench_views(c: &mut Criterion) {
    let mut group = c.benchmark_group("views");
    let outcome = parse_str(&SAMPLE.repeat(10));

    group.bench_function("analysis", |b| {
        b.iter(|| black_box(outcome.procedures.analysis().len()))
    });

    group.bench_function("extraction", |b| {
        b.iter(|| black_box(outcome.procedures.extraction().len()))
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_scaling, bench_views);
criterion_main!(benches);
