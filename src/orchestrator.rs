//! Orchestrator Module
//!
//! 変換ジョブの状態機械。1つのセッションで同時に実行できるジョブは1つだけです。
//!
//! ```text
//! submit ─▶ Running ─┬─▶ Succeeded
//!                    └─▶ Failed ──retry──▶ Running（新しいジョブID）
//! ```
//!
//! 変換はTokioのブロッキングスレッドで実行し、進捗と結果はジョブごとの
//! `mpsc`チャネルで呼び出し側に届けます。1本のチャネルで送るため、
//! 終了イベントの後に進捗が届くことはありません。

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::ConversionSettings;
use crate::builder::{ConversionOutput, Converter, SourceFile};
use crate::error::{ErrorKind, XlsxToPdfError};
use crate::progress::ProgressSink;

/// ジョブID（セッション内で単調増加）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// ジョブの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// ジョブの読み取り専用スナップショット
///
/// 出力のバイト列は`JobEvent::Succeeded`で呼び出し側に渡され、ここには長さだけが残ります。
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionJob {
    pub id: JobId,
    pub source_name: Option<String>,
    pub source_len: usize,
    pub settings: ConversionSettings,
    pub status: JobStatus,
    /// 0〜100
    pub progress: u8,
    pub output_len: Option<usize>,
    pub error_kind: Option<ErrorKind>,
    pub message: Option<String>,
}

/// 失敗したジョブの理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for JobFailure {}

impl From<&XlsxToPdfError> for JobFailure {
    fn from(err: &XlsxToPdfError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// ジョブから呼び出し側へのイベント
#[derive(Debug)]
pub enum JobEvent {
    /// 進捗（単調非減少、実行中は100未満）
    Progress(u8),
    /// 成功。直前に`Progress(100)`が送られます。
    Succeeded(ConversionOutput),
    Failed(JobFailure),
}

/// 投入したジョブのイベント受信側
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    events: mpsc::UnboundedReceiver<JobEvent>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// 次のイベント。終了イベントの後は`None`
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    /// 終了まで待って結果を返す（進捗は読み捨てる）
    pub async fn wait(mut self) -> Result<ConversionOutput, JobFailure> {
        while let Some(event) = self.events.recv().await {
            match event {
                JobEvent::Progress(_) => continue,
                JobEvent::Succeeded(output) => return Ok(output),
                JobEvent::Failed(failure) => return Err(failure),
            }
        }
        Err(JobFailure {
            kind: ErrorKind::Unknown,
            message: "Job ended without a result".to_string(),
        })
    }
}

/// 変換ジョブを管理するセッション
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxpdf::{ConversionSettings, ConverterBuilder, JobEvent, Orchestrator, SourceFile};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let orchestrator = Orchestrator::new(ConverterBuilder::new().build()?);
/// let source = SourceFile::from_path("report.xlsx")?;
/// let mut handle = orchestrator.submit(source, ConversionSettings::default())?;
///
/// while let Some(event) = handle.next_event().await {
///     match event {
///         JobEvent::Progress(p) => println!("{}%", p),
///         JobEvent::Succeeded(output) => std::fs::write(&output.file_name, &output.pdf)?,
///         JobEvent::Failed(failure) => eprintln!("{}", failure),
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Orchestrator {
    converter: Arc<Converter>,
    current: Mutex<Option<Arc<JobShared>>>,
    next_id: AtomicU64,
}

impl Orchestrator {
    pub fn new(converter: Converter) -> Self {
        Self::with_shared(Arc::new(converter))
    }

    /// 複数のセッションで`Converter`を共有する
    pub fn with_shared(converter: Arc<Converter>) -> Self {
        Self {
            converter,
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn converter(&self) -> &Arc<Converter> {
        &self.converter
    }

    /// ジョブを投入する
    ///
    /// 実行中のジョブがある場合は`JobAlreadyRunning`を返し、そのジョブには影響しません。
    /// Tokioランタイムの中から呼び出す必要があります。
    pub fn submit(
        &self,
        source: SourceFile,
        settings: ConversionSettings,
    ) -> Result<JobHandle, XlsxToPdfError> {
        let mut current = lock(&self.current);
        if let Some(job) = current.as_ref() {
            if job.status() == JobStatus::Running {
                return Err(XlsxToPdfError::JobAlreadyRunning);
            }
        }
        self.start(&mut current, source, settings)
    }

    /// 失敗したジョブを同じ入力と設定で再実行する
    pub fn retry(&self) -> Result<JobHandle, XlsxToPdfError> {
        let mut current = lock(&self.current);
        let job = match current.as_ref() {
            Some(job) if job.status() == JobStatus::Failed => Arc::clone(job),
            Some(job) => {
                return Err(XlsxToPdfError::InvalidState(format!(
                    "Only a failed job can be retried ({} is {:?})",
                    job.id,
                    job.status()
                )))
            }
            None => {
                return Err(XlsxToPdfError::InvalidState(
                    "No job to retry".to_string(),
                ))
            }
        };
        info!(previous = %job.id, "Retrying conversion");
        self.start(&mut current, job.source.clone(), job.settings)
    }

    /// 実行中のジョブを取り消す
    ///
    /// ジョブは直ちに`Failed(Cancelled)`になり、実行中の段階の結果は破棄されます。
    pub fn cancel(&self) -> Result<(), XlsxToPdfError> {
        let current = lock(&self.current);
        match current.as_ref() {
            Some(job) if job.status() == JobStatus::Running => {
                job.cancelled.store(true, Ordering::SeqCst);
                job.finish(Err(XlsxToPdfError::Cancelled));
                Ok(())
            }
            _ => Err(XlsxToPdfError::InvalidState(
                "No running job to cancel".to_string(),
            )),
        }
    }

    /// 現在のジョブのスナップショット
    pub fn snapshot(&self) -> Option<ConversionJob> {
        lock(&self.current).as_ref().map(|job| job.snapshot())
    }

    fn start(
        &self,
        current: &mut Option<Arc<JobShared>>,
        source: SourceFile,
        settings: ConversionSettings,
    ) -> Result<JobHandle, XlsxToPdfError> {
        let runtime = Handle::try_current().map_err(|_| {
            XlsxToPdfError::InvalidState("Jobs must be submitted from a Tokio runtime".to_string())
        })?;

        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        let job = Arc::new(JobShared::new(id, source, settings, tx));
        job.begin();
        *current = Some(Arc::clone(&job));

        let converter = Arc::clone(&self.converter);
        runtime.spawn(async move {
            let worker = Arc::clone(&job);
            let result = tokio::task::spawn_blocking(move || {
                converter.run(&worker.source, &worker.settings, worker.as_ref())
            })
            .await
            .unwrap_or_else(|e| {
                Err(XlsxToPdfError::Unknown(format!(
                    "Conversion task failed: {}",
                    e
                )))
            });
            job.finish(result);
        });

        Ok(JobHandle { id, events: rx })
    }
}

/// ジョブの共有状態
#[derive(Debug)]
struct JobShared {
    id: JobId,
    source: SourceFile,
    settings: ConversionSettings,
    state: Mutex<JobState>,
    cancelled: AtomicBool,
}

#[derive(Debug)]
struct JobState {
    job: ConversionJob,
    /// 終了イベントを送った後は`None`
    events: Option<mpsc::UnboundedSender<JobEvent>>,
}

impl JobState {
    fn send(&mut self, event: JobEvent) {
        if let Some(events) = &self.events {
            // 受信側が破棄されていても状態遷移は続ける
            let _ = events.send(event);
        }
    }
}

impl JobShared {
    fn new(
        id: JobId,
        source: SourceFile,
        settings: ConversionSettings,
        events: mpsc::UnboundedSender<JobEvent>,
    ) -> Self {
        let job = ConversionJob {
            id,
            source_name: source.name().map(str::to_string),
            source_len: source.len(),
            settings,
            status: JobStatus::Pending,
            progress: 0,
            output_len: None,
            error_kind: None,
            message: None,
        };
        Self {
            id,
            source,
            settings,
            state: Mutex::new(JobState {
                job,
                events: Some(events),
            }),
            cancelled: AtomicBool::new(false),
        }
    }

    fn status(&self) -> JobStatus {
        lock(&self.state).job.status
    }

    fn snapshot(&self) -> ConversionJob {
        lock(&self.state).job.clone()
    }

    fn begin(&self) {
        let mut state = lock(&self.state);
        state.job.status = JobStatus::Running;
        state.send(JobEvent::Progress(0));
        info!(job = %self.id, source = ?state.job.source_name, "Job started");
    }

    /// 実行結果を反映する。すでに終了している場合（取り消し済み）は破棄する
    fn finish(&self, result: Result<ConversionOutput, XlsxToPdfError>) {
        let mut state = lock(&self.state);
        if state.job.status != JobStatus::Running {
            debug!(job = %self.id, status = ?state.job.status, "Discarding result of finished job");
            return;
        }

        match result {
            Ok(output) => {
                state.job.status = JobStatus::Succeeded;
                state.job.progress = 100;
                state.job.output_len = Some(output.pdf.len());
                info!(
                    job = %self.id,
                    pages = output.page_count,
                    size = output.pdf.len(),
                    "Job succeeded"
                );
                state.send(JobEvent::Progress(100));
                state.send(JobEvent::Succeeded(output));
            }
            Err(err) => {
                let failure = JobFailure::from(&err);
                state.job.status = JobStatus::Failed;
                state.job.error_kind = Some(failure.kind);
                state.job.message = Some(failure.message.clone());
                warn!(job = %self.id, kind = %failure.kind, error = %failure.message, "Job failed");
                state.send(JobEvent::Failed(failure));
            }
        }
        state.events = None;
    }
}

impl ProgressSink for JobShared {
    fn report(&self, percent: u8) {
        let mut state = lock(&self.state);
        if state.job.status != JobStatus::Running {
            return;
        }
        let percent = percent.min(99);
        if percent > state.job.progress {
            state.job.progress = percent;
            state.send(JobEvent::Progress(percent));
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// ロックを取得する。保持していたスレッドがパニックしていても状態は使い続ける
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
