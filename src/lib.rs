//! xlsxpdf - Pure-Rust spreadsheet to PDF converter
//!
//! スプレッドシート（xlsx / xls / ods）を読み込み、ページ分割したPDFに変換するクレートです。
//! 変換は3つの段階で構成されます。
//!
//! 1. [`WorkbookReader`] がバイト列を形式に依存しない [`Workbook`] に読み込む
//! 2. [`LayoutEngine`] がセルをページに割り付けて [`PageDescriptor`] の列を作る
//! 3. [`PdfRenderer`] がページ列をPDFに書き出す
//!
//! 通常は [`ConverterBuilder`] で組み立てた [`Converter`] を使います。
//! 進捗通知・取り消し・再試行が必要な場合は `async` フィーチャーの
//! `Orchestrator` を使ってください。
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::fs::File;
//! use xlsxpdf::ConverterBuilder;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = ConverterBuilder::new().build()?;
//!
//!     let input = File::open("report.xlsx")?;
//!     let output = File::create("report.pdf")?;
//!     converter.convert(input, output)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Custom Configuration
//!
//! ```rust,no_run
//! use xlsxpdf::{ConverterBuilder, Orientation, PaperSize, SheetSelector, SourceFile};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = ConverterBuilder::new()
//!         .with_orientation(Orientation::Landscape)
//!         .with_paper_size(PaperSize::A3)
//!         .show_gridlines(false)
//!         .with_sheet_selector(SheetSelector::Index(0))
//!         .build()?;
//!
//!     let source = SourceFile::from_path("wide.ods")?;
//!     let output = converter.convert_source(&source, &converter.settings())?;
//!     std::fs::write(&output.file_name, &output.pdf)?;
//!
//!     Ok(())
//! }
//! ```

mod api;
mod builder;
mod error;
mod font;
mod formatter;
mod layout;
#[cfg(feature = "async")]
mod orchestrator;
mod parser;
mod progress;
mod render;
mod security;
mod types;
#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
mod wasm;

// 公開API
pub use api::{
    ConversionSettings, DateFormat, Orientation, PaperSize, SheetSelector, SourceFormat,
};
pub use builder::{ConversionOutput, Converter, ConverterBuilder, SourceFile};
pub use error::{ErrorKind, XlsxToPdfError};
pub use font::{text_width, FontFace};
pub use layout::{
    LayoutEngine, LayoutOptions, Margins, PageDescriptor, PlacedCell, Rect, TextAlign,
};
#[cfg(feature = "async")]
pub use orchestrator::{
    ConversionJob, JobEvent, JobFailure, JobHandle, JobId, JobStatus, Orchestrator,
};
pub use parser::WorkbookReader;
pub use progress::{NoProgress, ProgressSink};
pub use render::PdfRenderer;
pub use security::SecurityConfig;
pub use types::{
    Cell, CellCoord, CellRange, CellStyle, CellValue, HorizontalAlignment, MergedRegion, Sheet,
    Workbook,
};
#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
pub use wasm::convert_to_pdf;
