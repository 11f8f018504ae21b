//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 変換失敗の分類
///
/// パイプラインのどの段階で失敗したかを呼び出し側に伝えるための分類です。
/// 詳細は`XlsxToPdfError`本体のメッセージに含まれます。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// 入力の読み込み・解析に失敗した
    ParseError,
    /// ページレイアウトの計算に失敗した
    LayoutError,
    /// PDFの生成に失敗した
    RenderError,
    /// 呼び出し側によって取り消された
    Cancelled,
    /// 上記に分類できない失敗
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ParseError => "ParseError",
            ErrorKind::LayoutError => "LayoutError",
            ErrorKind::RenderError => "RenderError",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// xlsxpdfクレート全体で使用するエラー型
///
/// ワークブックの読み込み、レイアウト計算、PDF生成、ジョブ管理の
/// すべての段階で発生するエラーを統一的に扱います。
/// 段階ごとの分類は[`XlsxToPdfError::kind`]で取得できます。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxpdf::{ErrorKind, XlsxToPdfError};
/// use std::fs::File;
///
/// fn open(path: &str) -> Result<File, XlsxToPdfError> {
///     let file = File::open(path)?;  // Ioエラーが自動的に変換される
///     Ok(file)
/// }
///
/// if let Err(e) = open("missing.xlsx") {
///     assert_eq!(e.kind(), ErrorKind::ParseError);
/// }
/// ```
#[derive(Error, Debug)]
pub enum XlsxToPdfError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ワークブックの解析中に発生したエラー
    ///
    /// 壊れたファイル、空の入力、calamineが報告したエラーなどが該当します。
    #[error("Failed to parse workbook: {reason}")]
    Parse {
        /// 失敗の理由
        reason: String,
    },

    /// 受け付けない入力形式
    ///
    /// xlsb、CSV、判別できないコンテナなどが該当します。
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    /// ZIPアーカイブの解析エラー
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// ZIP bomb、パストラバーサル、入力サイズ制限などに違反した場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// レイアウト計算のエラー
    ///
    /// シートが存在しない、内容のないシート、余白だけで用紙が埋まる設定、
    /// 解釈できない用紙サイズ・向きの文字列などが該当します。
    #[error("Layout error: {0}")]
    Layout(String),

    /// PDF生成のエラー
    #[error("Render error: {0}")]
    Render(String),

    /// 設定の検証に失敗したエラー
    ///
    /// `ConverterBuilder::build()`時に設定を検証し、無効な設定が検出された
    /// 場合に発生します。
    ///
    /// ```rust,no_run
    /// use xlsxpdf::{ConverterBuilder, XlsxToPdfError};
    ///
    /// let result = ConverterBuilder::new()
    ///     .with_font_size(0.0)  // 無効なフォントサイズ
    ///     .build();
    ///
    /// match result {
    ///     Err(XlsxToPdfError::Config(msg)) => {
    ///         println!("設定エラー: {}", msg);
    ///     }
    ///     _ => {}
    /// }
    /// ```
    #[error("Configuration error: {0}")]
    Config(String),

    /// 実行中のジョブがある間に新しいジョブが投入された
    #[error("A conversion job is already running")]
    JobAlreadyRunning,

    /// 現在のジョブ状態では許可されない操作
    #[error("Invalid job state: {0}")]
    InvalidState(String),

    /// ジョブが取り消された
    #[error("Conversion cancelled")]
    Cancelled,

    /// 分類できないエラー（ワーカースレッドのパニックなど）
    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl XlsxToPdfError {
    /// エラーを変換段階の分類に対応付ける
    ///
    /// 入力に起因するエラー（I/O、ZIP、セキュリティ違反、非対応形式）は
    /// すべて`ParseError`として扱われます。
    pub fn kind(&self) -> ErrorKind {
        match self {
            XlsxToPdfError::Io(_)
            | XlsxToPdfError::Parse { .. }
            | XlsxToPdfError::UnsupportedFormat(_)
            | XlsxToPdfError::Zip(_)
            | XlsxToPdfError::SecurityViolation(_) => ErrorKind::ParseError,
            XlsxToPdfError::Layout(_) => ErrorKind::LayoutError,
            XlsxToPdfError::Render(_) => ErrorKind::RenderError,
            XlsxToPdfError::Cancelled => ErrorKind::Cancelled,
            XlsxToPdfError::Config(_)
            | XlsxToPdfError::JobAlreadyRunning
            | XlsxToPdfError::InvalidState(_)
            | XlsxToPdfError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    pub(crate) fn parse(reason: impl Into<String>) -> Self {
        XlsxToPdfError::Parse {
            reason: reason.into(),
        }
    }
}

impl From<calamine::Error> for XlsxToPdfError {
    fn from(e: calamine::Error) -> Self {
        XlsxToPdfError::parse(e.to_string())
    }
}

impl From<zip::result::ZipError> for XlsxToPdfError {
    fn from(e: zip::result::ZipError) -> Self {
        XlsxToPdfError::Zip(e.to_string())
    }
}

impl From<quick_xml::Error> for XlsxToPdfError {
    fn from(e: quick_xml::Error) -> Self {
        XlsxToPdfError::parse(format!("XML parse error: {}", e))
    }
}

impl From<quick_xml::events::attributes::AttrError> for XlsxToPdfError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        XlsxToPdfError::parse(format!("XML attribute error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    // Ioエラーのテスト
    #[test]
    fn test_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error: XlsxToPdfError = io_err.into();

        match error {
            XlsxToPdfError::Io(ref e) => {
                assert_eq!(e.kind(), io::ErrorKind::NotFound);
                assert_eq!(e.to_string(), "File not found");
            }
            _ => panic!("Expected Io error"),
        }
        assert_eq!(error.kind(), ErrorKind::ParseError);
    }

    #[test]
    fn test_io_error_display() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied");
        let error: XlsxToPdfError = io_err.into();

        let error_msg = error.to_string();
        assert!(error_msg.contains("IO error"));
        assert!(error_msg.contains("Permission denied"));
    }

    // Parseエラーのテスト
    #[test]
    fn test_parse_error_from_calamine() {
        let parse_err = calamine::Error::Msg("Invalid file format");
        let error: XlsxToPdfError = parse_err.into();

        match error {
            XlsxToPdfError::Parse { ref reason } => {
                assert!(reason.contains("Invalid file format"));
            }
            _ => panic!("Expected Parse error"),
        }
        assert!(error.to_string().contains("Failed to parse workbook"));
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            XlsxToPdfError::UnsupportedFormat("xlsb".into()).kind(),
            ErrorKind::ParseError
        );
        assert_eq!(
            XlsxToPdfError::SecurityViolation("too big".into()).kind(),
            ErrorKind::ParseError
        );
        assert_eq!(
            XlsxToPdfError::Layout("empty".into()).kind(),
            ErrorKind::LayoutError
        );
        assert_eq!(
            XlsxToPdfError::Render("no pages".into()).kind(),
            ErrorKind::RenderError
        );
        assert_eq!(XlsxToPdfError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(
            XlsxToPdfError::Unknown("panic".into()).kind(),
            ErrorKind::Unknown
        );
    }

    #[test]
    fn test_job_already_running_display() {
        let error = XlsxToPdfError::JobAlreadyRunning;
        assert_eq!(error.to_string(), "A conversion job is already running");
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::LayoutError.to_string(), "LayoutError");
        assert_eq!(ErrorKind::Cancelled.to_string(), "Cancelled");
    }
}
