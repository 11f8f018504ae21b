//! Progress Module
//!
//! 変換パイプラインの進捗通知と取り消し確認のためのトレイトを定義します。
//!
//! 各段階は全体の0〜100のうち決められた帯域を受け持ちます。
//!
//! | 段階 | 帯域 |
//! |------|------|
//! | Reader | 0 – 30 |
//! | Layout | 30 – 60 |
//! | Renderer | 60 – 99 |
//!
//! 成功時の100はOrchestratorだけが送出します。

use crate::error::XlsxToPdfError;

pub(crate) const READ_BAND: (u8, u8) = (0, 30);
pub(crate) const LAYOUT_BAND: (u8, u8) = (30, 60);
pub(crate) const RENDER_BAND: (u8, u8) = (60, 99);

/// 変換パイプラインから進捗を受け取るトレイト
///
/// レイアウト段階はシートを並列に処理するため、`report`は複数のスレッドから
/// 同時に呼ばれることがあります。値の単調性は受け取り側で保証してください。
/// すべてのメソッドにデフォルトの空実装があります。
pub trait ProgressSink: Send + Sync {
    /// 全体の進捗（0〜99）を通知する
    fn report(&self, percent: u8) {
        let _ = percent;
    }

    /// 変換を中断すべきかどうか
    ///
    /// 段階の区切りとシートごとの処理の間で確認されます。
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// 進捗を必要としない呼び出し側のための空実装
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// 1段階分の進捗を全体の帯域に写像するヘルパー
#[derive(Clone, Copy)]
pub(crate) struct StageProgress<'a> {
    sink: &'a dyn ProgressSink,
    start: u8,
    end: u8,
}

impl<'a> StageProgress<'a> {
    pub fn new(sink: &'a dyn ProgressSink, band: (u8, u8)) -> Self {
        Self {
            sink,
            start: band.0,
            end: band.1,
        }
    }

    /// `done / total`の完了を通知する
    pub fn step(&self, done: usize, total: usize) {
        let span = (self.end - self.start) as usize;
        let offset = if total == 0 {
            span
        } else {
            span * done.min(total) / total
        };
        self.sink.report(self.start + offset as u8);
    }

    /// 取り消されていれば`Cancelled`を返す
    pub fn checkpoint(&self) -> Result<(), XlsxToPdfError> {
        if self.sink.is_cancelled() {
            return Err(XlsxToPdfError::Cancelled);
        }
        Ok(())
    }
}
