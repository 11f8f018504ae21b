//! Builder Module
//!
//! Fluent Builder APIを提供し、`Converter`インスタンスを段階的に構築する。

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveTime};
use tracing::info;

use crate::api::{ConversionSettings, DateFormat, Orientation, PaperSize, SheetSelector};
use crate::error::XlsxToPdfError;
use crate::formatter::format_datetime;
use crate::layout::{LayoutEngine, LayoutOptions, Margins};
use crate::parser::WorkbookReader;
use crate::progress::{NoProgress, ProgressSink, StageProgress, LAYOUT_BAND, READ_BAND, RENDER_BAND};
use crate::render::PdfRenderer;
use crate::security::SecurityConfig;

/// 出力ファイル名を決められない場合の名前
const FALLBACK_FILE_NAME: &str = "converted.pdf";

/// 変換処理の設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct ConversionConfig {
    /// ジョブごとの既定のページ設定
    pub settings: ConversionSettings,

    /// シート選択方式
    pub sheet_selector: SheetSelector,

    /// 非表示要素を含めるか
    pub include_hidden: bool,

    /// レイアウトの調整項目（余白、フォントサイズ、日付形式など）
    pub layout: LayoutOptions,

    /// 内容ストリームを圧縮するか
    pub compress_streams: bool,

    /// 文書情報のタイトル（Noneの場合は入力ファイル名）
    pub title: Option<String>,

    /// 入力の上限
    pub security: SecurityConfig,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            settings: ConversionSettings::default(),
            sheet_selector: SheetSelector::All,
            include_hidden: false,
            layout: LayoutOptions::default(),
            compress_streams: true,
            title: None,
            security: SecurityConfig::default(),
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// `Converter`インスタンスを段階的に構築するためのビルダーです。
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust
/// use xlsxpdf::{ConverterBuilder, Orientation, PaperSize, SheetSelector};
///
/// # fn main() -> Result<(), xlsxpdf::XlsxToPdfError> {
/// let converter = ConverterBuilder::new()
///     .with_paper_size(PaperSize::Letter)
///     .with_orientation(Orientation::Landscape)
///     .with_sheet_selector(SheetSelector::Index(0))
///     .build()?;
/// assert_eq!(converter.settings().paper_size, PaperSize::Letter);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConverterBuilder {
    /// 内部設定（構築中）
    config: ConversionConfig,
}

impl Default for ConverterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - ページ設定: A4縦、用紙に合わせて縮小、ページ番号・見出し行・枠線あり
    /// - シート選択: すべてのシート
    /// - 非表示要素: スキップ
    /// - 余白: Excelの「標準」
    /// - フォントサイズ: 10pt
    /// - 日付形式: ISO 8601
    pub fn new() -> Self {
        Self {
            config: ConversionConfig::default(),
        }
    }

    /// ページ設定をまとめて指定する
    ///
    /// ```rust
    /// use xlsxpdf::{ConversionSettings, ConverterBuilder};
    ///
    /// # fn main() -> Result<(), xlsxpdf::XlsxToPdfError> {
    /// let settings = ConversionSettings::from_json(r#"{"paperSize": "a3", "fitToPage": false}"#)?;
    /// let converter = ConverterBuilder::new().with_settings(settings).build()?;
    /// assert!(!converter.settings().fit_to_page);
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_settings(mut self, settings: ConversionSettings) -> Self {
        self.config.settings = settings;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.config.settings.orientation = orientation;
        self
    }

    pub fn with_paper_size(mut self, paper_size: PaperSize) -> Self {
        self.config.settings.paper_size = paper_size;
        self
    }

    /// 内容を1ページに収まるよう縮小するか
    pub fn fit_to_page(mut self, fit: bool) -> Self {
        self.config.settings.fit_to_page = fit;
        self
    }

    /// ページ分割とページ番号を行うか
    ///
    /// 偽の場合、各シートは内容の大きさに合わせた1ページになります。
    pub fn include_pagination(mut self, include: bool) -> Self {
        self.config.settings.include_pagination = include;
        self
    }

    /// 先頭行を見出しとして各ページに繰り返すか
    pub fn include_header_row(mut self, include: bool) -> Self {
        self.config.settings.include_header_row = include;
        self
    }

    pub fn show_gridlines(mut self, show: bool) -> Self {
        self.config.settings.show_gridlines = show;
        self
    }

    /// 変換対象のシートを選択する
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use xlsxpdf::{ConverterBuilder, SheetSelector};
    ///
    /// // 単一シートを名前で指定
    /// let builder = ConverterBuilder::new()
    ///     .with_sheet_selector(SheetSelector::Name("Sheet1".to_string()));
    ///
    /// // 複数シートを指定
    /// let builder = ConverterBuilder::new()
    ///     .with_sheet_selector(SheetSelector::Indices(vec![0, 2]));
    /// ```
    pub fn with_sheet_selector(mut self, selector: SheetSelector) -> Self {
        self.config.sheet_selector = selector;
        self
    }

    /// 非表示のシート・行・列を含めるか
    pub fn include_hidden(mut self, include: bool) -> Self {
        self.config.include_hidden = include;
        self
    }

    pub fn with_margins(mut self, margins: Margins) -> Self {
        self.config.layout.margins = margins;
        self
    }

    /// 基準のフォントサイズ（ポイント）
    pub fn with_font_size(mut self, size: f32) -> Self {
        self.config.layout.font_size = size;
        self
    }

    /// 用紙に合わせる際の最小の縮小率（0より大きく1以下）
    pub fn with_min_fit_scale(mut self, scale: f32) -> Self {
        self.config.layout.min_fit_scale = scale;
        self
    }

    /// 自動調整する列幅の範囲（ポイント）
    pub fn with_column_width_bounds(mut self, min: f32, max: f32) -> Self {
        self.config.layout.min_column_width = min;
        self.config.layout.max_column_width = max;
        self
    }

    /// 日付セルの表記
    pub fn with_date_format(mut self, format: DateFormat) -> Self {
        self.config.layout.date_format = format;
        self
    }

    /// 空のシートをエラーにせず読み飛ばす
    pub fn skip_empty_sheets(mut self, skip: bool) -> Self {
        self.config.layout.skip_empty_sheets = skip;
        self
    }

    pub fn compress_streams(mut self, compress: bool) -> Self {
        self.config.compress_streams = compress;
        self
    }

    /// PDFの文書情報に記録するタイトル
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn with_security(mut self, security: SecurityConfig) -> Self {
        self.config.security = security;
        self
    }

    /// 設定を検証して`Converter`を構築する
    ///
    /// # エラー
    ///
    /// 次の場合に`XlsxToPdfError::Config`を返します。
    ///
    /// * フォントサイズが正でない
    /// * 最小の縮小率が0より大きく1以下でない
    /// * 列幅の範囲が不正
    /// * 余白が負
    /// * カスタム日付形式が不正な書式文字列、またはタイムゾーンを要求する
    pub fn build(self) -> Result<Converter, XlsxToPdfError> {
        let layout = &self.config.layout;

        // 1. 数値の検証
        if !(layout.font_size.is_finite() && layout.font_size > 0.0) {
            return Err(XlsxToPdfError::Config(format!(
                "Font size must be positive: {}",
                layout.font_size
            )));
        }
        if !(layout.min_fit_scale > 0.0 && layout.min_fit_scale <= 1.0) {
            return Err(XlsxToPdfError::Config(format!(
                "Minimum fit scale must be in (0, 1]: {}",
                layout.min_fit_scale
            )));
        }
        if !(layout.min_column_width > 0.0
            && layout.max_column_width.is_finite()
            && layout.min_column_width <= layout.max_column_width)
        {
            return Err(XlsxToPdfError::Config(format!(
                "Invalid column width bounds: {} - {}",
                layout.min_column_width, layout.max_column_width
            )));
        }
        let margins = layout.margins;
        if [margins.top, margins.right, margins.bottom, margins.left]
            .iter()
            .any(|m| !(m.is_finite() && *m >= 0.0))
        {
            return Err(XlsxToPdfError::Config(format!(
                "Margins must be non-negative: {:?}",
                margins
            )));
        }

        // 2. カスタム日付形式の検証
        if let DateFormat::Custom(ref format_str) = layout.date_format {
            // タイムゾーンの項目は日時だけでは書式化できない
            let sample = NaiveDate::MIN.and_time(NaiveTime::MIN);
            if format_str.is_empty()
                || StrftimeItems::new(format_str).any(|item| matches!(item, Item::Error))
                || format_datetime(&sample, format_str).is_none()
            {
                return Err(XlsxToPdfError::Config(format!(
                    "Invalid date format string: '{}'",
                    format_str
                )));
            }
        }

        // 3. Converterインスタンス生成
        Ok(Converter::new(self.config))
    }
}

/// 変換元のファイル
///
/// バイト列は`Arc`で共有されるため、再試行のために保持しても複製されません。
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: Option<String>,
    bytes: Arc<[u8]>,
}

impl SourceFile {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: None,
            bytes: bytes.into(),
        }
    }

    /// 元のファイル名（形式判定の補助と出力ファイル名に使用）
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// ファイルを読み込む
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, XlsxToPdfError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let source = Self::new(bytes);
        Ok(match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => source.with_name(name),
            None => source,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 変換結果の推奨ファイル名（拡張子を`.pdf`に置き換えたもの）
    ///
    /// ```rust
    /// use xlsxpdf::SourceFile;
    ///
    /// let source = SourceFile::new(vec![1, 2, 3]).with_name("sales 2024.xlsx");
    /// assert_eq!(source.output_file_name(), "sales 2024.pdf");
    /// assert_eq!(SourceFile::new(vec![1]).output_file_name(), "converted.pdf");
    /// ```
    pub fn output_file_name(&self) -> String {
        self.name
            .as_deref()
            .and_then(|name| Path::new(name).file_stem())
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .map(|stem| format!("{}.pdf", stem))
            .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
    }
}

/// 変換結果
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOutput {
    /// PDFのバイト列
    pub pdf: Vec<u8>,
    /// 推奨ファイル名
    pub file_name: String,
    pub page_count: usize,
    /// ページを出力したシートの数
    pub sheet_count: usize,
    pub elapsed: Duration,
}

/// 変換処理のファサード
///
/// 読み込み、レイアウト、描画の3段階を順に実行します。
/// 内部状態を変更しないため、`Arc`で包んで複数のジョブから共有できます。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxpdf::ConverterBuilder;
/// use std::fs::File;
///
/// # fn main() -> Result<(), xlsxpdf::XlsxToPdfError> {
/// let converter = ConverterBuilder::new().build()?;
/// let input = File::open("example.xlsx")?;
/// let output = File::create("example.pdf")?;
/// converter.convert(input, output)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Converter {
    config: ConversionConfig,
    reader: WorkbookReader,
    layout: LayoutEngine,
}

impl Converter {
    pub(crate) fn new(config: ConversionConfig) -> Self {
        let reader = WorkbookReader::new()
            .with_sheet_selector(config.sheet_selector.clone())
            .include_hidden(config.include_hidden)
            .with_security(config.security.clone());
        let layout = LayoutEngine::new(config.layout.clone());
        Self {
            config,
            reader,
            layout,
        }
    }

    /// 既定のページ設定
    pub fn settings(&self) -> ConversionSettings {
        self.config.settings
    }

    /// スプレッドシートをPDFに変換
    ///
    /// 入力はすべてメモリに読み込んでから処理します。
    ///
    /// ## メモリバッファからの変換
    ///
    /// ```rust,no_run
    /// use xlsxpdf::ConverterBuilder;
    /// use std::io::Cursor;
    ///
    /// # fn main() -> Result<(), xlsxpdf::XlsxToPdfError> {
    /// let converter = ConverterBuilder::new().build()?;
    /// let excel_data: Vec<u8> = std::fs::read("example.xlsx")?;
    /// let mut pdf = Vec::new();
    /// converter.convert(Cursor::new(excel_data), &mut pdf)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn convert<R: Read, W: Write>(
        &self,
        mut input: R,
        mut output: W,
    ) -> Result<(), XlsxToPdfError> {
        let mut buffer = Vec::new();
        input.read_to_end(&mut buffer)?;
        let pdf = self.convert_bytes(&buffer)?;
        output.write_all(&pdf)?;
        output.flush()?;
        Ok(())
    }

    /// バイト列をPDFのバイト列に変換
    pub fn convert_bytes(&self, input: &[u8]) -> Result<Vec<u8>, XlsxToPdfError> {
        let source = SourceFile::new(input);
        Ok(self.convert_source(&source, &self.config.settings)?.pdf)
    }

    /// ページ設定を指定して変換
    pub fn convert_source(
        &self,
        source: &SourceFile,
        settings: &ConversionSettings,
    ) -> Result<ConversionOutput, XlsxToPdfError> {
        self.run(source, settings, &NoProgress)
    }

    /// 3段階を順に実行し、各段階の進捗を`sink`に通知する
    pub(crate) fn run(
        &self,
        source: &SourceFile,
        settings: &ConversionSettings,
        sink: &dyn ProgressSink,
    ) -> Result<ConversionOutput, XlsxToPdfError> {
        let elapsed = stopwatch();
        info!(
            source = source.name().unwrap_or("<memory>"),
            size = source.len(),
            paper = %settings.paper_size,
            orientation = %settings.orientation,
            "Conversion started"
        );

        let workbook = self.reader.read(
            source.bytes(),
            source.name(),
            StageProgress::new(sink, READ_BAND),
        )?;

        let pages = self.layout.layout_with_progress(
            &workbook,
            settings,
            StageProgress::new(sink, LAYOUT_BAND),
        )?;

        let mut renderer = PdfRenderer::new().compress_streams(self.config.compress_streams);
        if let Some(title) = self.config.title.as_deref().or(source.name()) {
            renderer = renderer.with_title(title);
        }
        let pdf = renderer.render_with_progress(&pages, StageProgress::new(sink, RENDER_BAND))?;

        let mut sheet_indices: Vec<usize> = pages.iter().map(|p| p.sheet_index).collect();
        sheet_indices.dedup();

        let output = ConversionOutput {
            pdf,
            file_name: source.output_file_name(),
            page_count: pages.len(),
            sheet_count: sheet_indices.len(),
            elapsed: elapsed(),
        };
        info!(
            pages = output.page_count,
            sheets = output.sheet_count,
            size = output.pdf.len(),
            elapsed_ms = output.elapsed.as_millis() as u64,
            "Conversion finished"
        );
        Ok(output)
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn stopwatch() -> impl Fn() -> Duration {
    let started = std::time::Instant::now();
    move || started.elapsed()
}

// wasm32-unknown-unknownでは`Instant`が使えない
#[cfg(target_arch = "wasm32")]
fn stopwatch() -> impl Fn() -> Duration {
    || Duration::ZERO
}
