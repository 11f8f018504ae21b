//! Public API Types
//!
//! 公開APIで使用する列挙型と変換設定を定義するモジュール。

use crate::error::XlsxToPdfError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 用紙の向き
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// 縦向き（デフォルト）
    #[default]
    Portrait,
    /// 横向き（用紙の幅と高さを入れ替える）
    Landscape,
}

impl FromStr for Orientation {
    type Err = XlsxToPdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            other => Err(XlsxToPdfError::Layout(format!(
                "Unknown orientation: '{}' (expected 'portrait' or 'landscape')",
                other
            ))),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Portrait => f.write_str("portrait"),
            Orientation::Landscape => f.write_str("landscape"),
        }
    }
}

/// 用紙サイズ
///
/// 寸法はポイント（1/72インチ）単位で、縦向きの値です。
///
/// | 用紙 | 幅 | 高さ |
/// |------|----|------|
/// | A4 | 595 | 842 |
/// | Letter | 612 | 792 |
/// | Legal | 612 | 1008 |
/// | A3 | 842 | 1191 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSize {
    /// ISO A4（デフォルト）
    #[default]
    A4,
    /// US Letter
    Letter,
    /// US Legal
    Legal,
    /// ISO A3
    A3,
}

impl PaperSize {
    /// 縦向きの寸法（幅, 高さ）をポイント単位で返す
    pub fn dimensions(self) -> (f32, f32) {
        match self {
            PaperSize::A4 => (595.0, 842.0),
            PaperSize::Letter => (612.0, 792.0),
            PaperSize::Legal => (612.0, 1008.0),
            PaperSize::A3 => (842.0, 1191.0),
        }
    }

    /// 向きを考慮した寸法（幅, 高さ）を返す
    pub fn oriented(self, orientation: Orientation) -> (f32, f32) {
        let (w, h) = self.dimensions();
        match orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }
}

impl FromStr for PaperSize {
    type Err = XlsxToPdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a4" => Ok(PaperSize::A4),
            "letter" => Ok(PaperSize::Letter),
            "legal" => Ok(PaperSize::Legal),
            "a3" => Ok(PaperSize::A3),
            other => Err(XlsxToPdfError::Layout(format!(
                "Unknown paper size: '{}' (expected a4, letter, legal or a3)",
                other
            ))),
        }
    }
}

impl fmt::Display for PaperSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaperSize::A4 => "a4",
            PaperSize::Letter => "letter",
            PaperSize::Legal => "legal",
            PaperSize::A3 => "a3",
        };
        f.write_str(name)
    }
}

/// 変換設定
///
/// ジョブごとに不変のスナップショットとして扱われます（`Copy`）。
/// JSONではキャメルケースのフィールド名と小文字の列挙値を使用します。
///
/// ```rust
/// use xlsxpdf::{ConversionSettings, Orientation, PaperSize};
///
/// let json = r#"{"orientation":"landscape","paperSize":"a3","fitToPage":false}"#;
/// let settings = ConversionSettings::from_json(json).unwrap();
/// assert_eq!(settings.orientation, Orientation::Landscape);
/// assert_eq!(settings.paper_size, PaperSize::A3);
/// assert!(!settings.fit_to_page);
/// assert!(settings.include_pagination);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversionSettings {
    /// 用紙サイズでページ分割し、ページ番号のフッターを付ける
    pub include_pagination: bool,
    /// 内容が1ページに収まるよう一様に縮小する
    pub fit_to_page: bool,
    /// 用紙の向き
    pub orientation: Orientation,
    /// 用紙サイズ
    pub paper_size: PaperSize,
    /// 先頭行を見出しとして扱い、各ページの上部に繰り返す
    pub include_header_row: bool,
    /// 枠線を描画する
    pub show_gridlines: bool,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            include_pagination: true,
            fit_to_page: true,
            orientation: Orientation::Portrait,
            paper_size: PaperSize::A4,
            include_header_row: true,
            show_gridlines: true,
        }
    }
}

impl ConversionSettings {
    /// JSON文字列から設定を読み込む
    ///
    /// 省略されたフィールドはデフォルト値になります。
    /// 列挙値が解釈できない場合は`Layout`エラーを返します。
    pub fn from_json(json: &str) -> Result<Self, XlsxToPdfError> {
        serde_json::from_str(json)
            .map_err(|e| XlsxToPdfError::Layout(format!("Invalid conversion settings: {}", e)))
    }

    /// JSON文字列に変換する
    pub fn to_json(&self) -> Result<String, XlsxToPdfError> {
        serde_json::to_string(self)
            .map_err(|e| XlsxToPdfError::Config(format!("Failed to serialize settings: {}", e)))
    }
}

/// 日付の出力形式
///
/// 日付セルをPDFに描画する際の表記を指定します。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum DateFormat {
    /// ISO 8601形式（YYYY-MM-DD、時刻を含む場合はYYYY-MM-DD HH:MM:SS）
    #[default]
    Iso8601,

    /// カスタム形式（chrono互換フォーマット文字列）
    ///
    /// # フォーマット指定子（主要なもの）
    ///
    /// - `%Y`: 4桁の年（例: 2025）
    /// - `%m`: 2桁の月（01-12）
    /// - `%d`: 2桁の日（01-31）
    /// - `%H`: 24時間形式の時（00-23）
    /// - `%M`: 分（00-59）
    ///
    /// ```rust,no_run
    /// use xlsxpdf::{ConverterBuilder, DateFormat};
    /// # fn main() -> Result<(), xlsxpdf::XlsxToPdfError> {
    /// let converter = ConverterBuilder::new()
    ///     .with_date_format(DateFormat::Custom("%d/%m/%Y".to_string()))
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    Custom(String),
}

/// シート選択方式
///
/// 変換対象のシートを選択する方法を指定します。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum SheetSelector {
    /// すべてのシートを変換（デフォルト）
    #[default]
    All,

    /// インデックス指定（0始まり）
    Index(usize),

    /// シート名指定
    Name(String),

    /// 複数のインデックス指定
    Indices(Vec<usize>),

    /// 複数のシート名指定
    Names(Vec<String>),
}

/// 入力コンテナの形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Office Open XML（ZIP + `xl/workbook.xml`）
    Xlsx,
    /// Excel 97-2003（OLE複合ファイル）
    Xls,
    /// OpenDocument Spreadsheet（ZIP + `mimetype`）
    Ods,
}

impl SourceFormat {
    /// 形式に対応する拡張子
    pub fn extension(self) -> &'static str {
        match self {
            SourceFormat::Xlsx => "xlsx",
            SourceFormat::Xls => "xls",
            SourceFormat::Ods => "ods",
        }
    }

    /// 拡張子から形式を推定する（大文字小文字は区別しない）
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "xlsx" | "xlsm" => Some(SourceFormat::Xlsx),
            "xls" => Some(SourceFormat::Xls),
            "ods" => Some(SourceFormat::Ods),
            _ => None,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = ConversionSettings::default();
        assert!(settings.include_pagination);
        assert!(settings.fit_to_page);
        assert_eq!(settings.orientation, Orientation::Portrait);
        assert_eq!(settings.paper_size, PaperSize::A4);
        assert!(settings.include_header_row);
        assert!(settings.show_gridlines);
    }

    #[test]
    fn test_settings_json_field_names() {
        let json = ConversionSettings::default().to_json().unwrap();
        assert!(json.contains("\"includePagination\":true"));
        assert!(json.contains("\"paperSize\":\"a4\""));
        assert!(json.contains("\"orientation\":\"portrait\""));
        assert!(json.contains("\"showGridlines\":true"));
    }

    #[test]
    fn test_settings_from_partial_json() {
        let settings =
            ConversionSettings::from_json(r#"{"includeHeaderRow":false,"paperSize":"legal"}"#)
                .unwrap();
        assert!(!settings.include_header_row);
        assert_eq!(settings.paper_size, PaperSize::Legal);
        assert!(settings.fit_to_page);
    }

    #[test]
    fn test_settings_unknown_paper_size_json() {
        let result = ConversionSettings::from_json(r#"{"paperSize":"b5"}"#);
        match result {
            Err(XlsxToPdfError::Layout(msg)) => assert!(msg.contains("b5")),
            other => panic!("Expected Layout error, got {:?}", other),
        }
    }

    #[test]
    fn test_paper_size_from_str() {
        assert_eq!("A4".parse::<PaperSize>().unwrap(), PaperSize::A4);
        assert_eq!("letter".parse::<PaperSize>().unwrap(), PaperSize::Letter);
        assert_eq!(" Legal ".parse::<PaperSize>().unwrap(), PaperSize::Legal);
        assert_eq!("a3".parse::<PaperSize>().unwrap(), PaperSize::A3);
        assert!(matches!(
            "tabloid".parse::<PaperSize>(),
            Err(XlsxToPdfError::Layout(_))
        ));
    }

    #[test]
    fn test_orientation_from_str() {
        assert_eq!(
            "Landscape".parse::<Orientation>().unwrap(),
            Orientation::Landscape
        );
        assert!(matches!(
            "sideways".parse::<Orientation>(),
            Err(XlsxToPdfError::Layout(_))
        ));
    }

    #[test]
    fn test_paper_dimensions() {
        assert_eq!(PaperSize::A4.dimensions(), (595.0, 842.0));
        assert_eq!(PaperSize::Letter.dimensions(), (612.0, 792.0));
        assert_eq!(PaperSize::Legal.dimensions(), (612.0, 1008.0));
        assert_eq!(PaperSize::A3.dimensions(), (842.0, 1191.0));
        assert_eq!(
            PaperSize::A4.oriented(Orientation::Landscape),
            (842.0, 595.0)
        );
    }

    #[test]
    fn test_source_format_from_extension() {
        assert_eq!(SourceFormat::from_extension("XLSX"), Some(SourceFormat::Xlsx));
        assert_eq!(SourceFormat::from_extension("ods"), Some(SourceFormat::Ods));
        assert_eq!(SourceFormat::from_extension("xlsb"), None);
        assert_eq!(SourceFormat::from_extension("csv"), None);
    }
}
