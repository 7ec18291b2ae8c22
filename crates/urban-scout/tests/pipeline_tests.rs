//! Orchestrator scenarios run against fakes, a temp bucket and an
//! in-memory database.

mod common;

use std::sync::Arc;

use common::*;

use urban_scout::dashboard::DashboardStats;
use urban_scout::detection::GroundedBox;
use urban_scout::pipeline::{NoopProgress, ProgressEvent, ScanError, ScanWarning};
use urban_scout::report::{MODEL_UNAVAILABLE_SUMMARY, NO_DETECTIONS_SUMMARY};
use urban_scout::{Report, ScanContext, ScanState, Severity};

#[test]
fn test_happy_path_stores_scan_and_cleans_scratch() {
    let harness = TestHarness::new();
    let orchestrator = harness
        .builder()
        .detections(vec![
            detection("car", 0.9, (5, 5, 30, 30)),
            detection("pothole", 0.3, (35, 10, 60, 40)),
        ])
        .model(Arc::new(ScriptedModel::replying(TWO_ISSUE_REPORT)))
        .build();
    let progress = RecordingProgress::default();

    let (ok, ctx) = orchestrator.run(ScanContext::new(40.7128, -74.006), &progress);

    assert!(ok);
    assert!(ctx.succeeded());
    assert_eq!(
        ctx.history,
        vec![
            ScanState::Validating,
            ScanState::FetchingImage,
            ScanState::UploadingOriginal,
            ScanState::Detecting,
            ScanState::Annotating,
            ScanState::UploadingAnnotated,
            ScanState::GeneratingReport,
            ScanState::Persisting,
            ScanState::CleaningUp,
            ScanState::Done,
        ]
    );
    assert!(ctx.warnings.is_empty());

    let scans = harness.persistence().list();
    assert_eq!(scans.len(), 1);
    let scan = &scans[0];
    assert_eq!(scan.detection_results.len(), 1);
    assert_eq!(scan.detection_results[0].label, "car");
    assert_eq!(scan.llm_report_structured.summary, "Two issues need attention.");
    assert_eq!(scan.llm_report_structured.count_severity(Severity::High), 1);
    let audit: Report = serde_json::from_str(&scan.llm_report).unwrap();
    assert_eq!(audit, scan.llm_report_structured);

    assert_ne!(scan.image_url, scan.annotated_image_url);
    assert_eq!(harness.stored_objects().len(), 2);
    assert!(harness.scratch_files().is_empty());

    assert_eq!(
        progress.events().last(),
        Some(&ProgressEvent::Completed {
            scan_id: scan.id,
            detections: 1,
            issues: 2,
        })
    );
}

#[test]
fn test_grounded_duplicate_is_merged() {
    let harness = TestHarness::new();
    // (10,10)-(30,30) in the 64x48 fake image.
    let grounded = GroundedBox {
        phrase: "pothole".to_string(),
        score: 0.8,
        cx: 20.0 / 64.0,
        cy: 20.0 / 48.0,
        w: 20.0 / 64.0,
        h: 20.0 / 48.0,
    };
    let weak = GroundedBox {
        score: 0.1,
        ..grounded.clone()
    };
    let orchestrator = harness
        .builder()
        .detections(vec![detection("pothole", 0.6, (10, 10, 30, 30))])
        .grounded(vec![grounded, weak])
        .model(Arc::new(ScriptedModel::replying(TWO_ISSUE_REPORT)))
        .build();

    let (ok, ctx) = orchestrator.run(ScanContext::new(51.5, -0.12), &NoopProgress);

    assert!(ok);
    assert_eq!(ctx.detections.len(), 1);
    assert!((ctx.detections[0].score - 0.8).abs() < 1e-6);
}

#[test]
fn test_corrupt_font_falls_back_to_original_image() {
    let harness = TestHarness::new();
    let font = harness.write_file("broken.ttf", b"not a font");
    let orchestrator = harness
        .builder()
        .detections(vec![detection("car", 0.9, (5, 5, 30, 30))])
        .model(Arc::new(ScriptedModel::replying(TWO_ISSUE_REPORT)))
        .font(font)
        .build();

    let (ok, ctx) = orchestrator.run(ScanContext::new(40.0, -70.0), &NoopProgress);

    assert!(ok);
    assert_eq!(ctx.warnings, vec![ScanWarning::AnnotationFailed]);
    assert!(!ctx.visited(ScanState::UploadingAnnotated));
    assert_eq!(ctx.annotated_image_url, ctx.image_url);

    let scan = ctx.scan.unwrap();
    assert_eq!(scan.annotated_image_url, scan.image_url);
    assert_eq!(harness.stored_objects().len(), 1);
    assert!(harness.scratch_files().is_empty());
}

#[test]
fn test_original_upload_failure_fails_without_record() {
    let harness = TestHarness::new();
    let objects = Arc::new(FlakyStore::new(harness.store.clone(), vec![1]));
    let orchestrator = harness
        .builder()
        .detections(vec![detection("car", 0.9, (5, 5, 30, 30))])
        .objects(objects)
        .build();
    let progress = RecordingProgress::default();

    let (ok, ctx) = orchestrator.run(ScanContext::new(40.0, -70.0), &progress);

    assert!(!ok);
    assert_eq!(ctx.state, ScanState::Failed);
    assert!(matches!(ctx.error, Some(ScanError::OriginalUpload)));
    assert!(ctx.visited(ScanState::CleaningUp));
    assert!(!ctx.visited(ScanState::Detecting));
    assert!(harness.persistence().list().is_empty());
    assert!(harness.scratch_files().is_empty());

    assert!(matches!(
        progress.events().last(),
        Some(ProgressEvent::Failed {
            state: ScanState::UploadingOriginal,
            ..
        })
    ));
}

#[test]
fn test_persist_failure_fails_and_cleans_scratch() {
    let harness = TestHarness::new();
    let orchestrator = harness
        .builder()
        .detections(vec![detection("car", 0.9, (5, 5, 30, 30))])
        .model(Arc::new(ScriptedModel::replying(TWO_ISSUE_REPORT)))
        .scans(Arc::new(FailingScanStore))
        .build();
    let progress = RecordingProgress::default();

    let (ok, ctx) = orchestrator.run(ScanContext::new(40.0, -70.0), &progress);

    assert!(!ok);
    assert_eq!(ctx.state, ScanState::Failed);
    assert!(matches!(ctx.error, Some(ScanError::Persist)));
    assert!(ctx.visited(ScanState::Persisting));
    assert!(ctx.visited(ScanState::CleaningUp));
    assert!(ctx.scan.is_none());
    assert!(harness.scratch_files().is_empty());
    assert!(harness.persistence().list().is_empty());

    assert!(matches!(
        progress.events().last(),
        Some(ProgressEvent::Failed {
            state: ScanState::Persisting,
            ..
        })
    ));
}

#[test]
fn test_annotated_upload_failure_reuses_original_url() {
    let harness = TestHarness::new();
    let objects = Arc::new(FlakyStore::new(harness.store.clone(), vec![2]));
    let orchestrator = harness
        .builder()
        .detections(vec![detection("car", 0.9, (5, 5, 30, 30))])
        .model(Arc::new(ScriptedModel::replying(TWO_ISSUE_REPORT)))
        .objects(objects)
        .build();

    let (ok, ctx) = orchestrator.run(ScanContext::new(40.0, -70.0), &NoopProgress);

    assert!(ok);
    assert_eq!(ctx.warnings, vec![ScanWarning::AnnotatedUploadFailed]);
    let scan = ctx.scan.unwrap();
    assert!(scan.image_url.is_some());
    assert_eq!(scan.annotated_image_url, scan.image_url);
}

#[test]
fn test_no_detections_skips_model() {
    let harness = TestHarness::new();
    let model = Arc::new(ScriptedModel::replying(TWO_ISSUE_REPORT));
    let orchestrator = harness.builder().model(model.clone()).build();

    let (ok, ctx) = orchestrator.run(ScanContext::new(40.0, -70.0), &NoopProgress);

    assert!(ok);
    assert_eq!(model.calls(), 0);
    let scan = ctx.scan.unwrap();
    assert!(scan.detection_results.is_empty());
    assert_eq!(scan.llm_report_structured.summary, NO_DETECTIONS_SUMMARY);
    assert!(scan.llm_report_structured.issues.is_empty());
}

#[test]
fn test_model_failure_still_persists() {
    let harness = TestHarness::new();
    let orchestrator = harness
        .builder()
        .detections(vec![detection("car", 0.9, (5, 5, 30, 30))])
        .model(Arc::new(ScriptedModel::new(vec![Err("rate limited")])))
        .build();

    let (ok, ctx) = orchestrator.run(ScanContext::new(40.0, -70.0), &NoopProgress);

    assert!(ok);
    let scan = ctx.scan.unwrap();
    assert_eq!(scan.llm_report_structured.summary, MODEL_UNAVAILABLE_SUMMARY);
    assert_eq!(scan.detection_results.len(), 1);
}

#[test]
fn test_invalid_coordinates_are_not_retried() {
    let harness = TestHarness::new();
    let imagery = Arc::new(FakeImagery::new());
    let orchestrator = harness.builder().imagery(imagery.clone()).build();

    assert!(!orchestrator.scan_with_retry(95.0, 0.0, 3));
    assert_eq!(imagery.calls(), 0);
    assert!(harness.persistence().list().is_empty());
}

#[test]
fn test_retry_succeeds_on_second_attempt() {
    let harness = TestHarness::new();
    let imagery = Arc::new(FakeImagery::failing(1));
    let orchestrator = harness.builder().imagery(imagery.clone()).build();

    assert!(orchestrator.scan_with_retry(40.0, -70.0, 2));
    assert_eq!(imagery.calls(), 2);
    assert_eq!(harness.persistence().list().len(), 1);
}

#[test]
fn test_retry_gives_up_after_limit() {
    let harness = TestHarness::new();
    let imagery = Arc::new(FakeImagery::failing(10));
    let orchestrator = harness.builder().imagery(imagery.clone()).build();

    assert!(!orchestrator.scan_with_retry(40.0, -70.0, 2));
    assert_eq!(imagery.calls(), 3);
    assert!(harness.scratch_files().is_empty());
}

#[test]
fn test_batch_summary_counts_outcomes() {
    let harness = TestHarness::new();
    let orchestrator = harness
        .builder()
        .detections(vec![detection("car", 0.9, (5, 5, 30, 30))])
        .model(Arc::new(ScriptedModel::replying(TWO_ISSUE_REPORT)))
        .build();

    let summary = orchestrator.scan_multiple(&[(40.7, -74.0), (100.0, 0.0), (37.7, -122.4)]);

    assert_eq!(summary.total, 3);
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 1);

    let scans = harness.persistence().list();
    assert_eq!(scans.len(), 2);
    let stats = DashboardStats::from_scans(&scans);
    assert_eq!(stats.total_issues, 4);
    assert_eq!(stats.high_severity, 2);
}

#[test]
fn test_empty_batch() {
    let harness = TestHarness::new();
    let orchestrator = harness.builder().build();
    let summary = orchestrator.scan_multiple(&[]);
    assert_eq!(summary.total, 0);
    assert_eq!(summary.successful + summary.failed, 0);
}

#[test]
fn test_regenerate_report_overwrites_stored_report() {
    let harness = TestHarness::new();
    let orchestrator = harness
        .builder()
        .detections(vec![detection("street light", 0.7, (5, 5, 30, 30))])
        .model(Arc::new(ScriptedModel::new(vec![
            Ok(TWO_ISSUE_REPORT),
            Ok(r#"{"summary": "Re-checked: one issue.", "issues": [{"type": "lighting", "severity": "Medium", "description": "Dim lamp"}]}"#),
        ])))
        .build();

    let (ok, ctx) = orchestrator.run(ScanContext::new(40.0, -70.0), &NoopProgress);
    assert!(ok);
    let id = ctx.scan.unwrap().id;

    assert!(orchestrator.regenerate_report(id));
    let scan = harness.persistence().get_by_id(id).unwrap();
    assert_eq!(scan.llm_report_structured.summary, "Re-checked: one issue.");
    assert_eq!(scan.llm_report_structured.count_severity(Severity::Medium), 1);
    assert!(scan.llm_report.contains("Dim lamp"));

    assert!(!orchestrator.regenerate_report(id + 100));
}

#[test]
fn test_delete_removes_row_and_images() {
    let harness = TestHarness::new();
    let orchestrator = harness
        .builder()
        .detections(vec![detection("car", 0.9, (5, 5, 30, 30))])
        .model(Arc::new(ScriptedModel::replying(TWO_ISSUE_REPORT)))
        .build();

    let (ok, ctx) = orchestrator.run(ScanContext::new(40.0, -70.0), &NoopProgress);
    assert!(ok);
    let id = ctx.scan.unwrap().id;
    assert_eq!(harness.stored_objects().len(), 2);

    assert!(orchestrator.persistence().delete(id));
    assert!(harness.persistence().get_by_id(id).is_none());
    assert!(harness.stored_objects().is_empty());
    assert!(!orchestrator.persistence().delete(id));
}
