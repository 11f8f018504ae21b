//! Orchestrator Tests
//!
//! ジョブの状態遷移、進捗イベント、取り消しと再試行を検証します。
//!
//! `#[tokio::test]`は単一スレッドのランタイムで動くため、`submit`の直後に
//! `.await`を挟まなければ、投入したジョブは必ず実行中の状態で観測されます。

#![cfg(feature = "async")]

mod common;

use std::time::Duration;
use xlsxpdf::{
    ConversionSettings, ConverterBuilder, ErrorKind, JobEvent, JobHandle, JobStatus,
    Orchestrator, SourceFile, XlsxToPdfError,
};

fn orchestrator() -> Orchestrator {
    Orchestrator::new(ConverterBuilder::new().build().unwrap())
}

fn table_source() -> SourceFile {
    SourceFile::new(common::long_table(120).unwrap()).with_name("table.xlsx")
}

fn empty_source() -> SourceFile {
    SourceFile::new(common::empty_sheet().unwrap()).with_name("empty.xlsx")
}

/// 終了イベントまでのすべてのイベントを集める
async fn collect(mut handle: JobHandle) -> Vec<JobEvent> {
    let mut events = Vec::new();
    let deadline = Duration::from_secs(30);
    while let Ok(Some(event)) = tokio::time::timeout(deadline, handle.next_event()).await {
        events.push(event);
    }
    events
}

fn progress_values(events: &[JobEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            JobEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_job_succeeds_with_monotonic_progress() {
    let orchestrator = orchestrator();
    let handle = orchestrator
        .submit(table_source(), ConversionSettings::default())
        .unwrap();
    let id = handle.id();

    let events = collect(handle).await;
    let progress = progress_values(&events);
    assert_eq!(progress.first(), Some(&0));
    assert_eq!(progress.last(), Some(&100));
    assert!(progress.windows(2).all(|w| w[0] < w[1]), "{:?}", progress);
    assert_eq!(progress.iter().filter(|&&p| p == 100).count(), 1);

    match events.last() {
        Some(JobEvent::Succeeded(output)) => {
            assert!(output.pdf.starts_with(b"%PDF-"));
            assert_eq!(output.file_name, "table.pdf");
        }
        other => panic!("Expected Succeeded, got {:?}", other),
    }

    let job = orchestrator.snapshot().unwrap();
    assert_eq!(job.id, id);
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.progress, 100);
    assert!(job.output_len.is_some());
    assert_eq!(job.source_name.as_deref(), Some("table.xlsx"));
}

#[tokio::test]
async fn test_submit_while_running_is_rejected() {
    let orchestrator = orchestrator();
    let handle = orchestrator
        .submit(table_source(), ConversionSettings::default())
        .unwrap();

    let err = orchestrator
        .submit(table_source(), ConversionSettings::default())
        .unwrap_err();
    assert!(matches!(err, XlsxToPdfError::JobAlreadyRunning));

    let job = orchestrator.snapshot().unwrap();
    assert_eq!(job.id, handle.id());
    assert_eq!(job.status, JobStatus::Running);

    let events = collect(handle).await;
    assert!(matches!(events.last(), Some(JobEvent::Succeeded(_))));
}

#[tokio::test]
async fn test_empty_workbook_fails_with_layout_error() {
    let orchestrator = orchestrator();
    let handle = orchestrator
        .submit(empty_source(), ConversionSettings::default())
        .unwrap();

    let events = collect(handle).await;
    match events.last() {
        Some(JobEvent::Failed(failure)) => assert_eq!(failure.kind, ErrorKind::LayoutError),
        other => panic!("Expected Failed, got {:?}", other),
    }
    assert!(!progress_values(&events).contains(&100));

    let job = orchestrator.snapshot().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_kind, Some(ErrorKind::LayoutError));
    assert!(job.message.is_some());
}

#[tokio::test]
async fn test_invalid_input_fails_with_parse_error() {
    let orchestrator = orchestrator();
    let source = SourceFile::new(b"not a workbook".to_vec()).with_name("notes.txt");
    let failure = orchestrator
        .submit(source, ConversionSettings::default())
        .unwrap()
        .wait()
        .await
        .unwrap_err();
    assert_eq!(failure.kind, ErrorKind::ParseError);
}

#[tokio::test]
async fn test_retry_failed_job_gets_new_id() {
    let orchestrator = orchestrator();
    let first = orchestrator
        .submit(empty_source(), ConversionSettings::default())
        .unwrap();
    let first_id = first.id();
    assert!(first.wait().await.is_err());

    let retried = orchestrator.retry().unwrap();
    assert!(retried.id() > first_id);
    let job = orchestrator.snapshot().unwrap();
    assert_eq!(job.id, retried.id());
    assert_eq!(job.source_name.as_deref(), Some("empty.xlsx"));

    let failure = retried.wait().await.unwrap_err();
    assert_eq!(failure.kind, ErrorKind::LayoutError);
}

#[tokio::test]
async fn test_retry_requires_failed_job() {
    let orchestrator = orchestrator();
    assert!(matches!(
        orchestrator.retry(),
        Err(XlsxToPdfError::InvalidState(_))
    ));

    let handle = orchestrator
        .submit(table_source(), ConversionSettings::default())
        .unwrap();
    assert!(matches!(
        orchestrator.retry(),
        Err(XlsxToPdfError::InvalidState(_))
    ));

    assert!(handle.wait().await.is_ok());
    assert!(matches!(
        orchestrator.retry(),
        Err(XlsxToPdfError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_cancel_running_job() {
    let orchestrator = orchestrator();
    let handle = orchestrator
        .submit(table_source(), ConversionSettings::default())
        .unwrap();

    orchestrator.cancel().unwrap();
    let job = orchestrator.snapshot().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_kind, Some(ErrorKind::Cancelled));

    let events = collect(handle).await;
    match events.last() {
        Some(JobEvent::Failed(failure)) => assert_eq!(failure.kind, ErrorKind::Cancelled),
        other => panic!("Expected Failed, got {:?}", other),
    }

    // 取り消し後に完了した変換の結果は破棄される
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(orchestrator.snapshot().unwrap().status, JobStatus::Failed);

    // 取り消したジョブは再試行できる
    let retried = orchestrator.retry().unwrap();
    assert!(retried.wait().await.is_ok());
}

#[tokio::test]
async fn test_cancel_without_running_job() {
    let orchestrator = orchestrator();
    assert!(matches!(
        orchestrator.cancel(),
        Err(XlsxToPdfError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_new_job_after_success() {
    let orchestrator = orchestrator();
    let first = orchestrator
        .submit(table_source(), ConversionSettings::default())
        .unwrap();
    let first_id = first.id();
    assert!(first.wait().await.is_ok());

    let settings = ConversionSettings {
        show_gridlines: false,
        ..ConversionSettings::default()
    };
    let second = orchestrator.submit(table_source(), settings).unwrap();
    assert!(second.id() > first_id);
    assert!(second.wait().await.is_ok());
    assert_eq!(orchestrator.snapshot().unwrap().settings, settings);
}

#[test]
fn test_submit_outside_runtime() {
    let orchestrator = orchestrator();
    let err = orchestrator
        .submit(table_source(), ConversionSettings::default())
        .unwrap_err();
    assert!(matches!(err, XlsxToPdfError::InvalidState(_)));
    assert!(orchestrator.snapshot().is_none());
}
