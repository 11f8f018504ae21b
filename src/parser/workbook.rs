//! Workbook Reader
//!
//! calamineを使用してxlsx / xls / odsを共通の`Workbook`に変換します。
//! xlsxではXMLメタデータから列幅・行の高さ・書式を補います。

use calamine::{Data, Ods, Reader, SheetType, SheetVisible, Sheets, Xls, Xlsx};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::io::Cursor;
use tracing::{debug, info};

use crate::api::{SheetSelector, SourceFormat};
use crate::error::XlsxToPdfError;
use crate::parser::metadata::{WorksheetMetadata, XlsxMetadata};
use crate::parser::sniff::detect_format;
use crate::progress::{NoProgress, StageProgress, READ_BAND};
use crate::security::SecurityConfig;
use crate::types::{Cell, CellCoord, CellRange, CellValue, MergedRegion, Sheet, Workbook};

/// ワークブックの読み込み処理
///
/// 入力形式は内容から判定します。
///
/// ```rust,no_run
/// use xlsxpdf::{SheetSelector, WorkbookReader};
/// # fn main() -> Result<(), xlsxpdf::XlsxToPdfError> {
/// let bytes = std::fs::read("report.xlsx")?;
/// let workbook = WorkbookReader::new()
///     .with_sheet_selector(SheetSelector::Index(0))
///     .parse(&bytes)?;
/// println!("{} sheet(s)", workbook.sheets.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct WorkbookReader {
    selector: SheetSelector,
    include_hidden: bool,
    security: SecurityConfig,
}

impl WorkbookReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 読み込むシートを指定
    pub fn with_sheet_selector(mut self, selector: SheetSelector) -> Self {
        self.selector = selector;
        self
    }

    /// 非表示のシート・行・列を含めるか（デフォルト: false）
    pub fn include_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// セキュリティ制限を差し替える
    pub fn with_security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }

    /// 入力バイト列を解析
    pub fn parse(&self, bytes: &[u8]) -> Result<Workbook, XlsxToPdfError> {
        self.parse_named(bytes, None)
    }

    /// ファイル名を補助情報として入力バイト列を解析
    ///
    /// ファイル名の拡張子は内容から形式を判定できない場合にのみ使われます。
    pub fn parse_named(&self, bytes: &[u8], name: Option<&str>) -> Result<Workbook, XlsxToPdfError> {
        self.read(bytes, name, StageProgress::new(&NoProgress, READ_BAND))
    }

    pub(crate) fn read(
        &self,
        bytes: &[u8],
        name: Option<&str>,
        progress: StageProgress<'_>,
    ) -> Result<Workbook, XlsxToPdfError> {
        self.security.check_input_size(bytes.len())?;
        let format = detect_format(bytes, name, &self.security)?;
        info!(format = %format, size = bytes.len(), "reading workbook");

        let metadata = match format {
            SourceFormat::Xlsx => Some(XlsxMetadata::parse(bytes)?),
            _ => None,
        };

        let mut sheets = open_sheets(format, bytes)?;
        let targets = self.select_sheets(&sheets)?;
        progress.step(1, targets.len() + 1);

        if let Sheets::Xlsx(xlsx) = &mut sheets {
            xlsx.load_merged_regions()
                .map_err(|e| XlsxToPdfError::parse(e.to_string()))?;
        }

        let mut workbook = Workbook::new(format);
        workbook.is_1904 = metadata.as_ref().is_some_and(|m| m.is_1904);

        for (done, (index, name)) in targets.iter().enumerate() {
            progress.checkpoint()?;
            let sheet_meta = metadata.as_ref().and_then(|m| m.sheet(name));
            let mut sheet = self.read_sheet(&mut sheets, *index, name, sheet_meta, metadata.as_ref())?;

            if let Sheets::Xlsx(xlsx) = &mut sheets {
                if let Some(Ok(regions)) = xlsx.worksheet_merge_cells(name) {
                    for dims in regions {
                        let range = CellRange::new(
                            CellCoord::new(dims.start.0, dims.start.1),
                            CellCoord::new(dims.end.0, dims.end.1),
                        );
                        sheet.add_merged_region(MergedRegion::new(range));
                    }
                }
            }

            debug!(
                sheet = %name,
                cells = sheet.cell_count(),
                merged = sheet.merged_regions().len(),
                "sheet read"
            );
            workbook.sheets.push(sheet);
            progress.step(done + 2, targets.len() + 1);
        }

        Ok(workbook)
    }

    /// 変換対象のシートを（ブック内の位置, 名前）で返す
    ///
    /// `All`ではワークシート以外と、`include_hidden`が偽の場合は非表示シートを除外します。
    /// 明示的に指定されたシートは非表示でも含めます。
    fn select_sheets<RS>(&self, sheets: &Sheets<RS>) -> Result<Vec<(usize, String)>, XlsxToPdfError>
    where
        RS: std::io::Read + std::io::Seek,
    {
        let all = sheets.sheets_metadata();
        let names: Vec<String> = all.iter().map(|s| s.name.clone()).collect();

        let find_name = |name: &String| -> Result<(usize, String), XlsxToPdfError> {
            names
                .iter()
                .position(|n| n == name)
                .map(|i| (i, name.clone()))
                .ok_or_else(|| XlsxToPdfError::parse(format!("Sheet '{}' not found", name)))
        };
        let find_index = |index: usize| -> Result<(usize, String), XlsxToPdfError> {
            names.get(index).map(|n| (index, n.clone())).ok_or_else(|| {
                XlsxToPdfError::parse(format!(
                    "Sheet index {} is out of range (total: {})",
                    index,
                    names.len()
                ))
            })
        };

        match &self.selector {
            SheetSelector::All => Ok(all
                .iter()
                .enumerate()
                .filter(|(_, s)| s.typ == SheetType::WorkSheet)
                .filter(|(_, s)| self.include_hidden || s.visible == SheetVisible::Visible)
                .map(|(i, s)| (i, s.name.clone()))
                .collect()),
            SheetSelector::Index(index) => Ok(vec![find_index(*index)?]),
            SheetSelector::Name(name) => Ok(vec![find_name(name)?]),
            SheetSelector::Indices(indices) => indices.iter().map(|&i| find_index(i)).collect(),
            SheetSelector::Names(list) => list.iter().map(find_name).collect(),
        }
    }

    fn read_sheet<RS>(
        &self,
        sheets: &mut Sheets<RS>,
        index: usize,
        name: &str,
        sheet_meta: Option<&WorksheetMetadata>,
        metadata: Option<&XlsxMetadata>,
    ) -> Result<Sheet, XlsxToPdfError>
    where
        RS: std::io::Read + std::io::Seek,
    {
        let range = sheets.worksheet_range(name)?;
        let (start_row, start_col) = range.start().unwrap_or((0, 0));
        let skip_hidden = !self.include_hidden;

        let mut sheet = Sheet::new(name, index);

        if let Some(meta) = sheet_meta {
            for (&col, &width) in &meta.column_widths {
                sheet.set_column_width(col, width);
            }
            for (&row, &height) in &meta.row_heights {
                sheet.set_row_height(row, height);
            }
            if skip_hidden {
                meta.hidden_rows.iter().for_each(|&r| sheet.hide_row(r));
                meta.hidden_cols.iter().for_each(|&c| sheet.hide_col(c));
            }
        }

        for (row, col, data) in range.used_cells() {
            let coord = CellCoord::new(start_row + row as u32, start_col + col as u32);
            if skip_hidden && (sheet.is_row_hidden(coord.row) || sheet.is_col_hidden(coord.col)) {
                continue;
            }

            let value = convert_value(data);
            if value.is_empty() {
                continue;
            }

            let mut cell = Cell::new(coord, value);
            let style = sheet_meta
                .and_then(|m| m.cell_styles.get(&coord))
                .and_then(|&xf| metadata.and_then(|m| m.style(xf)));
            if let Some(style) = style {
                cell = cell.with_style(style.clone());
            }
            sheet.insert(cell)?;
        }

        Ok(sheet)
    }
}

fn open_sheets(format: SourceFormat, bytes: &[u8]) -> Result<Sheets<Cursor<&[u8]>>, XlsxToPdfError> {
    let cursor = Cursor::new(bytes);
    let sheets = match format {
        SourceFormat::Xlsx => Sheets::Xlsx(
            Xlsx::new(cursor).map_err(|e| XlsxToPdfError::parse(e.to_string()))?,
        ),
        SourceFormat::Xls => {
            Sheets::Xls(Xls::new(cursor).map_err(|e| XlsxToPdfError::parse(e.to_string()))?)
        }
        SourceFormat::Ods => {
            Sheets::Ods(Ods::new(cursor).map_err(|e| XlsxToPdfError::parse(e.to_string()))?)
        }
    };
    Ok(sheets)
}

/// calamineの値を`CellValue`に変換
fn convert_value(data: &Data) -> CellValue {
    match data {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::String(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) if dt.is_duration() => CellValue::Duration(dt.as_f64()),
        Data::DateTime(dt) => CellValue::DateTime(dt.as_f64()),
        Data::DateTimeIso(s) => iso_to_serial(s)
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::String(s.clone())),
        Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
        Data::Empty => CellValue::Empty,
    }
}

/// ISO 8601の日時文字列（ODS）を1900年エポックのシリアル値に変換
fn iso_to_serial(s: &str) -> Option<f64> {
    let datetime = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })?;
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(NaiveTime::MIN);
    let millis = (datetime - epoch).num_milliseconds();
    Some(millis as f64 / 86_400_000.0)
}
