//! End-to-end tests for active statement tracking
//!
//! These tests drive the tracking service the way a host would:
//! - Starting a session over the open documents of a workspace
//! - Editing, opening and closing documents while the session runs
//! - Reconciling spans recomputed by the debugger with the tracked ones
//! - Reading spans concurrently with background updates

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use hotedit_common::{ActiveStatementFlags, ActiveStatementSpan, DocumentKind, HostWorkspace};
use hotedit_engine::{TrackingChanged, TrackingConfig};
use hotedit_integration_tests::test_utils::{
    source::{leaf, numbered_lines, statement},
    wait_until, TrackingHarness,
};
use tracing::info;

const A_CS: &str = "using System;

class A
{
    static void Main()
    {
        var x = 1;
        var y = 2;
        var z = x + y;

        Console.WriteLine(z);
    }
}
";

fn a_cs_statement(line: u32) -> ActiveStatementSpan {
    ActiveStatementSpan::new(
        0,
        format!("{line}:8-{line}:29").parse().unwrap(),
        ActiveStatementFlags::LEAF_FRAME,
    )
}

#[tokio::test]
async fn test_edit_adjust_and_close_a_single_file() {
    let harness = TrackingHarness::new();
    let id = harness.open_source("/src/A.cs", A_CS).unwrap();
    harness.provider.set_baseline("/src/A.cs", vec![a_cs_statement(10)]);
    harness.start().await;

    assert_eq!(harness.spans("/src/A.cs"), vec![a_cs_statement(10)]);

    harness.insert_at_line(id, 5, "\n").unwrap();
    // edits alone already move the statement
    assert_eq!(harness.spans("/src/A.cs"), vec![a_cs_statement(11)]);

    harness.provider.push_adjustment("/src/A.cs", vec![a_cs_statement(11)]);
    let adjusted = harness.adjust(id).await.unwrap();
    assert_eq!(adjusted, vec![a_cs_statement(11)]);
    assert_eq!(adjusted[0].ordinal.0, 0);
    assert_eq!(adjusted[0].flags, ActiveStatementFlags::LEAF_FRAME);

    harness.workspace.close_document(id).unwrap();
    assert!(harness.spans("/src/A.cs").is_empty());
    assert!(harness.service.tracked_files().is_empty());
    assert!(harness.reporter.faults().is_empty());

    harness.service.end_tracking();
}

/// Races the bulk initializer against a document-open initializer for the same
/// file, serving request `first` and letting it insert before the other is served.
async fn race_initializers(first: usize) {
    const PATH: &str = "/src/A.cs";
    let early = vec![leaf(0, 3), leaf(1, 12)];
    let late = vec![leaf(0, 4), leaf(1, 13)];

    let harness = TrackingHarness::new();
    let text = numbered_lines(20);
    let bulk_document = harness.open_source(PATH, &text).unwrap();
    harness.provider.queue_baseline(PATH, early.clone());
    harness.provider.queue_baseline(PATH, late);
    harness.provider.hold_baselines();

    harness.start_without_waiting();
    wait_until(|| harness.provider.baseline_arrivals() == 1).await;
    // a linked document sharing the file queues its own initializer
    let linked_document = harness.open_source(PATH, &text).unwrap();
    wait_until(|| harness.provider.baseline_arrivals() == 2).await;

    let (winner, loser) = if first == 0 {
        (bulk_document, linked_document)
    } else {
        (linked_document, bulk_document)
    };
    let spans_of = |id| {
        harness.service.get_spans(&harness.workspace.current_solution(), Some(id), Path::new(PATH))
    };

    harness.provider.release_baseline_request(first);
    wait_until(|| !harness.service.tracked_files().is_empty()).await;
    assert_eq!(spans_of(winner), early);

    harness.provider.release_baseline_request(1 - first);
    harness.service.wait_for_background_work().await;

    assert_eq!(harness.provider.baseline_requests(), vec![1, 1]);
    assert_eq!(harness.service.tracked_files(), vec![PathBuf::from(PATH)]);
    assert_eq!(spans_of(winner), early);
    // the entry stays anchored to the winner's text
    assert!(spans_of(loser).is_empty());
    assert!(harness.reporter.faults().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_start_wins_race_against_open() {
    race_initializers(0).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_open_wins_race_against_start() {
    race_initializers(1).await;
}

#[tokio::test]
async fn test_queries_outside_of_a_session_are_empty() {
    let harness = TrackingHarness::new();
    let id = harness.open_source("/src/A.cs", &numbered_lines(10)).unwrap();
    harness.provider.set_baseline("/src/A.cs", vec![leaf(0, 3)]);

    assert!(harness.spans("/src/A.cs").is_empty());
    assert!(harness.adjust(id).await.unwrap().is_empty());

    harness.start().await;
    assert_eq!(harness.spans("/src/A.cs"), vec![leaf(0, 3)]);

    harness.service.end_tracking();
    assert!(harness.spans("/src/A.cs").is_empty());
    harness.provider.push_adjustment("/src/A.cs", vec![leaf(0, 3)]);
    assert!(harness.adjust(id).await.unwrap().is_empty());

    // documents opened after the end are not tracked by anyone
    harness.open_source("/src/Late.cs", &numbered_lines(4)).unwrap();
    harness.service.wait_for_background_work().await;
    assert!(harness.service.tracked_files().is_empty());
}

#[tokio::test]
async fn test_tracking_notifications() {
    let harness = TrackingHarness::new();
    let mut changes = harness.service.subscribe();

    harness.start().await;
    harness.service.end_tracking();
    harness.start().await;

    assert_eq!(changes.recv().await.unwrap(), TrackingChanged::Started);
    assert_eq!(changes.recv().await.unwrap(), TrackingChanged::Ended);
    assert_eq!(changes.recv().await.unwrap(), TrackingChanged::Started);
}

#[tokio::test]
#[should_panic(expected = "active statement count changed")]
async fn test_statement_count_is_fixed_within_a_session() {
    let harness = TrackingHarness::new();
    let id = harness.open_source("/src/A.cs", &numbered_lines(10)).unwrap();
    harness.provider.set_baseline("/src/A.cs", vec![leaf(0, 3)]);
    harness.start().await;

    harness.provider.push_adjustment("/src/A.cs", vec![leaf(0, 3), leaf(1, 5)]);
    let _ = harness.adjust(id).await;
}

#[tokio::test]
#[should_panic(expected = "changed flags")]
async fn test_statement_flags_are_fixed_within_a_session() {
    let harness = TrackingHarness::new();
    let id = harness.open_source("/src/A.cs", &numbered_lines(10)).unwrap();
    harness.provider.set_baseline("/src/A.cs", vec![leaf(0, 3)]);
    harness.start().await;

    harness
        .provider
        .push_adjustment("/src/A.cs", vec![statement(0, 3, ActiveStatementFlags::NON_LEAF_FRAME)]);
    let _ = harness.adjust(id).await;
}

#[tokio::test]
async fn test_provider_failure_degrades_one_file_only() {
    let harness = TrackingHarness::new();
    let a = harness.open_source("/src/A.cs", &numbered_lines(10)).unwrap();
    harness.open_source("/src/B.cs", &numbered_lines(10)).unwrap();
    harness.provider.set_baseline("/src/A.cs", vec![leaf(0, 3)]);
    harness.provider.set_baseline("/src/B.cs", vec![leaf(0, 6), leaf(1, 8)]);
    harness.start().await;

    harness.insert_at_line(a, 0, "\n").unwrap();
    harness.provider.fail_next("debugger is busy");
    let adjusted = harness.adjust(a).await.unwrap();

    // the failed refresh keeps the edit-tracked spans
    assert_eq!(adjusted, vec![leaf(0, 4)]);
    assert_eq!(harness.spans("/src/B.cs"), vec![leaf(0, 6), leaf(1, 8)]);
    let faults = harness.reporter.faults();
    assert_eq!(faults.len(), 1);
    assert!(faults[0].starts_with("adjust spans: "));
    assert!(faults[0].contains("debugger is busy"));

    // the next refresh succeeds again
    harness.provider.push_adjustment("/src/A.cs", vec![leaf(0, 5)]);
    assert_eq!(harness.adjust(a).await.unwrap(), vec![leaf(0, 5)]);
}

#[tokio::test]
async fn test_provider_sees_other_files_while_adjusting() {
    let harness = TrackingHarness::new();
    let a = harness.open_source("/src/A.cs", &numbered_lines(10)).unwrap();
    let b = harness.open_source("/src/B.cs", &numbered_lines(10)).unwrap();
    harness.provider.set_baseline("/src/A.cs", vec![leaf(0, 3)]);
    harness.provider.set_baseline("/src/B.cs", vec![leaf(0, 6)]);
    harness.start().await;

    harness.insert_at_line(b, 0, "\n\n").unwrap();
    harness.provider.push_adjustment("/src/A.cs", vec![leaf(0, 3)]);
    harness.adjust(a).await.unwrap();

    let observations = harness.provider.cross_file_observations();
    assert_eq!(observations.len(), 1);
    assert_eq!(observations[0].0.to_str(), Some("/src/B.cs"));
    assert_eq!(observations[0].1, vec![leaf(0, 8)]);
}

#[tokio::test]
async fn test_design_time_view_tracks_compile_time_file() {
    let harness = TrackingHarness::new();
    let compiled = harness.workspace.add_source_document("/obj/Page.g.cs", &numbered_lines(12));
    let design = harness.workspace.add_document(
        "Page.razor",
        Some("/src/Page.razor".into()),
        DocumentKind::DesignTime,
        Some("<h1>@title</h1>\n"),
    );
    harness.workspace.map_design_time_document(design, compiled);
    harness.provider.set_baseline("/obj/Page.g.cs", vec![leaf(0, 7)]);
    harness.start().await;

    harness.workspace.open_document(design).unwrap();
    harness.service.wait_for_background_work().await;

    assert_eq!(harness.service.tracked_files(), vec![PathBuf::from("/obj/Page.g.cs")]);
    assert!(harness.spans("/src/Page.razor").is_empty());

    harness.insert_at_line(compiled, 2, "\n").unwrap();
    assert_eq!(harness.spans("/obj/Page.g.cs"), vec![leaf(0, 8)]);
}

#[tokio::test]
async fn test_baselines_are_requested_in_batches() {
    let harness =
        TrackingHarness::with_config(TrackingConfig::default().with_baseline_batch_size(2));
    for i in 0..5 {
        let path = format!("/src/File{i}.cs");
        harness.open_source(&path, &numbered_lines(6)).unwrap();
        harness.provider.set_baseline(&path, vec![leaf(0, i)]);
    }

    harness.start().await;

    assert_eq!(harness.provider.baseline_requests(), vec![2, 2, 1]);
    assert_eq!(harness.service.tracked_files().len(), 5);
    assert_eq!(harness.spans("/src/File4.cs"), vec![leaf(0, 4)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_observe_torn_arrays() {
    const ROUNDS: u32 = 20;

    let harness = TrackingHarness::new();
    let id = harness.open_source("/src/A.cs", &numbered_lines(40)).unwrap();
    harness.provider.set_baseline("/src/A.cs", vec![leaf(0, 3), leaf(1, 9), leaf(2, 15)]);
    harness.start().await;

    let stop = Arc::new(AtomicBool::new(false));
    let consistent_reads = Arc::new(AtomicUsize::new(0));
    let readers = (0..4)
        .map(|_| {
            let service = harness.service.clone();
            let workspace = harness.workspace.clone();
            let stop = stop.clone();
            let consistent_reads = consistent_reads.clone();
            tokio::spawn(async move {
                while !stop.load(Ordering::Relaxed) {
                    let solution = workspace.current_solution();
                    let spans = service.get_spans(&solution, None, Path::new("/src/A.cs"));
                    // a stale solution cannot resolve a newer array and yields nothing
                    if spans.is_empty() {
                        tokio::task::yield_now().await;
                        continue;
                    }
                    assert_eq!(spans.len(), 3);
                    assert!(spans.iter().enumerate().all(|(i, s)| s.ordinal.0 == i as u32));
                    assert!(spans.windows(2).all(|w| w[0].line_span.start < w[1].line_span.start));
                    consistent_reads.fetch_add(1, Ordering::Relaxed);
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect::<Vec<_>>();

    for round in 1..=ROUNDS {
        harness.insert_at_line(id, 0, "\n").unwrap();
        // the debugger moves the last statement one extra line down every round
        harness.provider.push_adjustment(
            "/src/A.cs",
            vec![leaf(0, 3 + round), leaf(1, 9 + round), leaf(2, 15 + 2 * round)],
        );
        let adjusted = harness.adjust(id).await.unwrap();
        assert_eq!(adjusted[2], leaf(2, 15 + 2 * round));
        tokio::task::yield_now().await;
    }

    stop.store(true, Ordering::Relaxed);
    for result in futures::future::join_all(readers).await {
        result.unwrap();
    }

    info!(reads = consistent_reads.load(Ordering::Relaxed), "concurrent reads finished");
    assert_eq!(
        harness.spans("/src/A.cs"),
        vec![leaf(0, 3 + ROUNDS), leaf(1, 9 + ROUNDS), leaf(2, 15 + 2 * ROUNDS)]
    );
}
