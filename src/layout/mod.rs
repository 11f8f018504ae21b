//! Layout Module
//!
//! ワークブックを用紙上のページ列に割り付けるモジュール。
//!
//! # 処理の流れ
//!
//! 1. シートごとに表示対象の行・列を決め、列幅と行高を求める
//!    （明示的な値がなければ表示文字列から自動調整）
//! 2. 縮小率を決める（`fit_to_page`の場合）
//! 3. 列方向・行方向に帯へ分割する（結合セルの内側では分割しない）
//! 4. 列の帯ごとに行の帯を並べてページを作り、各セルをちょうど1ページに割り当てる
//!
//! シートは`rayon`で並列に処理し、結果は元のシート順に並べ直します。

mod page;
mod paginate;

pub use page::{Margins, PageDescriptor, PlacedCell, Rect, TextAlign};

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::api::{ConversionSettings, DateFormat};
use crate::error::XlsxToPdfError;
use crate::font::{text_width, FontFace};
use crate::formatter::CellFormatter;
use crate::progress::{NoProgress, StageProgress, LAYOUT_BAND};
use crate::types::{Cell, CellCoord, CellValue, HorizontalAlignment, Sheet, Workbook};
use paginate::{band_index, split_bands, Band};

/// セル内の左右の余白（ポイント）
const CELL_PADDING: f32 = 3.0;

/// 内容のない列の幅
const EMPTY_COLUMN_WIDTH: f32 = 48.0;

/// 行送り（フォントサイズに対する倍率）
const LINE_SPACING: f32 = 1.2;

/// レイアウトの調整項目
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOptions {
    pub margins: Margins,
    /// 基準のフォントサイズ（ポイント）
    pub font_size: f32,
    /// `fit_to_page`で許す最小の縮小率。これを下回る場合は残りをページ分割します。
    pub min_fit_scale: f32,
    /// 自動調整する列幅の下限
    pub min_column_width: f32,
    /// 自動調整する列幅の上限
    pub max_column_width: f32,
    pub date_format: DateFormat,
    /// 空のシートをエラーにせず読み飛ばす
    pub skip_empty_sheets: bool,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            margins: Margins::default(),
            font_size: 10.0,
            min_fit_scale: 0.1,
            min_column_width: 36.0,
            max_column_width: 288.0,
            date_format: DateFormat::default(),
            skip_empty_sheets: false,
        }
    }
}

/// レイアウトエンジン
///
/// # 使用例
///
/// ```rust
/// use xlsxpdf::{
///     Cell, CellCoord, CellValue, ConversionSettings, LayoutEngine, Sheet, SourceFormat, Workbook,
/// };
///
/// let mut sheet = Sheet::new("Sheet1", 0);
/// sheet
///     .insert(Cell::new(CellCoord::new(0, 0), CellValue::String("Name".to_string())))
///     .unwrap();
/// let mut workbook = Workbook::new(SourceFormat::Xlsx);
/// workbook.sheets.push(sheet);
///
/// let pages = LayoutEngine::default()
///     .layout(&workbook, &ConversionSettings::default())
///     .unwrap();
/// assert_eq!(pages.len(), 1);
/// assert_eq!(pages[0].footer.as_deref(), Some("Page 1 / 1"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    options: LayoutOptions,
}

impl LayoutEngine {
    pub fn new(options: LayoutOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    /// ワークブック全体をページに割り付ける
    ///
    /// # エラー
    ///
    /// - シートがない
    /// - 内容のないシートがある（`skip_empty_sheets`が偽の場合）
    /// - 余白が大きすぎて内容領域が残らない
    pub fn layout(
        &self,
        workbook: &Workbook,
        settings: &ConversionSettings,
    ) -> Result<Vec<PageDescriptor>, XlsxToPdfError> {
        self.layout_with_progress(
            workbook,
            settings,
            StageProgress::new(&NoProgress, LAYOUT_BAND),
        )
    }

    pub(crate) fn layout_with_progress(
        &self,
        workbook: &Workbook,
        settings: &ConversionSettings,
        progress: StageProgress<'_>,
    ) -> Result<Vec<PageDescriptor>, XlsxToPdfError> {
        progress.checkpoint()?;
        if workbook.sheets.is_empty() {
            return Err(XlsxToPdfError::Layout(
                "Workbook contains no sheets".to_string(),
            ));
        }

        let sheets: Vec<&Sheet> = workbook
            .sheets
            .iter()
            .filter(|sheet| {
                let keep = !self.options.skip_empty_sheets || has_content(sheet);
                if !keep {
                    debug!(sheet = sheet.name(), "Skipping empty sheet");
                }
                keep
            })
            .collect();
        if sheets.is_empty() {
            return Err(XlsxToPdfError::Layout(
                "All sheets are empty".to_string(),
            ));
        }

        let formatter = CellFormatter::new(self.options.date_format.clone(), workbook.is_1904);
        let done = AtomicUsize::new(0);
        let total = sheets.len();

        let per_sheet = sheets
            .par_iter()
            .map(|sheet| {
                progress.checkpoint()?;
                let pages = self.layout_sheet(sheet, settings, &formatter)?;
                progress.step(done.fetch_add(1, Ordering::Relaxed) + 1, total);
                Ok::<_, XlsxToPdfError>(pages)
            })
            .collect::<Result<Vec<_>, XlsxToPdfError>>()?;

        let mut pages: Vec<PageDescriptor> = per_sheet.into_iter().flatten().collect();
        let page_count = pages.len();
        for (i, page) in pages.iter_mut().enumerate() {
            page.page_number = i + 1;
            page.page_count = page_count;
            if settings.include_pagination {
                page.footer = Some(format!("Page {} / {}", i + 1, page_count));
            }
        }

        progress.step(total, total);
        Ok(pages)
    }

    fn layout_sheet(
        &self,
        sheet: &Sheet,
        settings: &ConversionSettings,
        formatter: &CellFormatter,
    ) -> Result<Vec<PageDescriptor>, XlsxToPdfError> {
        let grid = SheetGrid::measure(sheet, settings, formatter, &self.options)?;
        let margins = self.options.margins;
        let content_w: f32 = grid.col_widths.iter().sum();
        let content_h: f32 = grid.row_heights.iter().sum();
        let header_h = if grid.header { grid.row_heights[0] } else { 0.0 };

        let (width, height, scale, col_bands, row_bands) = if settings.include_pagination {
            let (width, height) = settings.paper_size.oriented(settings.orientation);
            let avail_w = width - margins.left - margins.right;
            let avail_h = height - margins.top - margins.bottom;
            if avail_w <= 0.0 || avail_h <= 0.0 {
                return Err(XlsxToPdfError::Layout(format!(
                    "Margins leave no content area on {} {} paper",
                    settings.paper_size, settings.orientation
                )));
            }

            let scale = if settings.fit_to_page {
                fit_scale(
                    (avail_w, avail_h),
                    (content_w, content_h),
                    self.options.min_fit_scale,
                )
            } else {
                1.0
            };

            // 分割は縮小前の大きさで行う
            let cap_w = avail_w / scale;
            let cap_h = avail_h / scale;
            let col_bands = split_bands(&grid.col_widths, cap_w, cap_w, &grid.col_locked);
            let row_bands = split_bands(
                &grid.row_heights,
                cap_h,
                cap_h - header_h,
                &grid.row_locked,
            );
            (width, height, scale, col_bands, row_bands)
        } else {
            (
                content_w + margins.left + margins.right,
                content_h + margins.top + margins.bottom,
                1.0,
                vec![Band::whole(grid.cols.len())],
                vec![Band::whole(grid.rows.len())],
            )
        };

        for band in col_bands.iter().filter(|b| b.oversized) {
            warn!(
                sheet = sheet.name(),
                first_col = grid.cols[band.start],
                last_col = grid.cols[band.end - 1],
                "Columns do not fit the page width; emitting them on their own page"
            );
        }
        for band in row_bands.iter().filter(|b| b.oversized) {
            warn!(
                sheet = sheet.name(),
                first_row = grid.rows[band.start],
                last_row = grid.rows[band.end - 1],
                "Rows do not fit the page height; emitting them on their own page"
            );
        }

        let frame = PageFrame {
            width,
            height,
            margins,
            scale,
            font_size: self.options.font_size * scale,
            header_h: header_h * scale,
            show_gridlines: settings.show_gridlines,
        };

        let xs: Vec<Vec<f32>> = col_bands.iter().map(|b| frame.col_edges(&grid, *b)).collect();
        let ys: Vec<Vec<f32>> = row_bands.iter().map(|b| frame.row_edges(&grid, *b)).collect();

        let mut pages = Vec::with_capacity(col_bands.len() * row_bands.len());
        for (ci, col_band) in col_bands.iter().enumerate() {
            for (ri, row_band) in row_bands.iter().enumerate() {
                pages.push(frame.page(
                    sheet,
                    &grid,
                    (*col_band, xs[ci].as_slice()),
                    (*row_band, ys[ri].as_slice()),
                ));
            }
        }

        // 各セルは起点の属する帯のページに入る
        let col_of = band_index(&col_bands, grid.cols.len());
        let row_of = band_index(&row_bands, grid.rows.len());
        for entry in &grid.entries {
            let (ci, ri) = (col_of[entry.col], row_of[entry.row]);
            let (x, w) = span(&xs[ci], col_bands[ci], entry.col, entry.col_end);
            let (y, h) = span(&ys[ri], row_bands[ri], entry.row, entry.row_end);
            pages[ci * row_bands.len() + ri]
                .cells
                .push(frame.placed(entry, Rect::new(x, y, w, h)));
        }

        let count = pages.len();
        for (i, page) in pages.iter_mut().enumerate() {
            page.sheet_page_number = i + 1;
            page.page_count_in_sheet = count;
        }

        debug!(
            sheet = sheet.name(),
            pages = count,
            scale,
            column_bands = col_bands.len(),
            row_bands = row_bands.len(),
            "Sheet laid out"
        );
        Ok(pages)
    }
}

/// 内容を収めるための一様な縮小率
///
/// 1.0を超えることはなく、`floor`を下回る場合は`floor`を使います。
pub(crate) fn fit_scale(available: (f32, f32), content: (f32, f32), floor: f32) -> f32 {
    let scale = (available.0 / content.0)
        .min(available.1 / content.1)
        .min(1.0);
    scale.max(floor).min(1.0)
}

fn has_content(sheet: &Sheet) -> bool {
    let (rows, cols) = sheet.dimensions();
    rows > 0 && cols > 0
}

/// 配置前のセル（位置は表示対象の行・列の中での番号）
struct Entry {
    coord: CellCoord,
    row: usize,
    col: usize,
    row_end: usize,
    col_end: usize,
    text: String,
    font: FontFace,
    align: TextAlign,
}

/// 1シート分の寸法
struct SheetGrid {
    /// 表示対象の行番号（昇順）
    rows: Vec<u32>,
    /// 表示対象の列番号（昇順）
    cols: Vec<u32>,
    row_heights: Vec<f32>,
    col_widths: Vec<f32>,
    /// この位置の後で分割できない（結合セルの内側）
    row_locked: Vec<bool>,
    col_locked: Vec<bool>,
    /// 結合セルの起点から終点への対応
    spans: HashMap<(usize, usize), (usize, usize)>,
    /// 結合セルに覆われた位置（起点を除く）
    covered: HashSet<(usize, usize)>,
    /// 行順に並んだセル
    entries: Vec<Entry>,
    /// 先頭行を見出しとして扱うか
    header: bool,
}

impl SheetGrid {
    fn measure(
        sheet: &Sheet,
        settings: &ConversionSettings,
        formatter: &CellFormatter,
        options: &LayoutOptions,
    ) -> Result<Self, XlsxToPdfError> {
        let (row_count, col_count) = sheet.dimensions();
        let rows: Vec<u32> = (0..row_count).filter(|r| !sheet.is_row_hidden(*r)).collect();
        let cols: Vec<u32> = (0..col_count).filter(|c| !sheet.is_col_hidden(*c)).collect();
        if rows.is_empty() || cols.is_empty() {
            return Err(XlsxToPdfError::Layout(format!(
                "Sheet '{}' has no rows or columns to lay out",
                sheet.name()
            )));
        }

        let header = settings.include_header_row && rows[0] == 0;
        let mut row_locked = vec![false; rows.len()];
        let mut col_locked = vec![false; cols.len()];
        let mut spans = HashMap::new();
        let mut covered = HashSet::new();

        for region in sheet.merged_regions() {
            let (Ok(_), Ok(_)) = (
                rows.binary_search(&region.parent.row),
                cols.binary_search(&region.parent.col),
            ) else {
                continue;
            };
            let (r0, r1) = positions(&rows, region.range.start.row, region.range.end.row);
            let (c0, c1) = positions(&cols, region.range.start.col, region.range.end.col);
            if r0 >= r1 || c0 >= c1 {
                continue;
            }
            row_locked[r0..r1 - 1].fill(true);
            col_locked[c0..c1 - 1].fill(true);
            spans.insert((r0, c0), (r1 - 1, c1 - 1));
            for r in r0..r1 {
                for c in c0..c1 {
                    if (r, c) != (r0, c0) {
                        covered.insert((r, c));
                    }
                }
            }
        }

        let mut entries = Vec::with_capacity(sheet.cell_count());
        for cell in sheet.cells() {
            let (Ok(row), Ok(col)) = (
                rows.binary_search(&cell.coord.row),
                cols.binary_search(&cell.coord.col),
            ) else {
                continue;
            };
            if covered.contains(&(row, col)) {
                debug!(
                    sheet = sheet.name(),
                    cell = %cell.coord.to_a1_notation(),
                    "Cell hidden by merged region"
                );
                continue;
            }
            let (row_end, col_end) = spans.get(&(row, col)).copied().unwrap_or((row, col));
            let style = cell.style.as_ref();
            let font = if header && row == 0 {
                FontFace::Bold
            } else {
                style
                    .map(|s| FontFace::from_style(s.bold, s.italic))
                    .unwrap_or_default()
            };
            entries.push(Entry {
                coord: cell.coord,
                row,
                col,
                row_end,
                col_end,
                text: formatter.format(cell),
                font,
                align: alignment(cell),
            });
        }

        let font_size = options.font_size;
        let mut natural = vec![0.0f32; cols.len()];
        let mut lines = vec![1usize; rows.len()];
        for entry in &entries {
            if entry.col == entry.col_end {
                let width = entry
                    .text
                    .lines()
                    .map(|line| text_width(line, entry.font, font_size))
                    .fold(0.0, f32::max);
                natural[entry.col] = natural[entry.col].max(width + 2.0 * CELL_PADDING);
            }
            if entry.row == entry.row_end {
                lines[entry.row] = lines[entry.row].max(entry.text.lines().count());
            }
        }

        let col_widths = cols
            .iter()
            .zip(&natural)
            .map(|(&col, &natural)| match sheet.column_width(col) {
                Some(width) => width,
                None if natural == 0.0 => EMPTY_COLUMN_WIDTH
                    .max(options.min_column_width)
                    .min(options.max_column_width),
                None => natural
                    .max(options.min_column_width)
                    .min(options.max_column_width),
            })
            .collect();

        let default_height = font_size * 1.5;
        let row_heights = rows
            .iter()
            .zip(&lines)
            .map(|(&row, &lines)| match sheet.row_height(row) {
                Some(height) => height,
                None => default_height
                    .max(lines as f32 * font_size * LINE_SPACING + font_size * 0.3),
            })
            .collect();

        Ok(Self {
            rows,
            cols,
            row_heights,
            col_widths,
            row_locked,
            col_locked,
            spans,
            covered,
            entries,
            header,
        })
    }
}

/// `first..=last`に含まれる表示位置の範囲（終端を含まない）
fn positions(visible: &[u32], first: u32, last: u32) -> (usize, usize) {
    (
        visible.partition_point(|&v| v < first),
        visible.partition_point(|&v| v <= last),
    )
}

/// 書式の配置を優先し、標準では数値を右、真偽値とエラーを中央、それ以外を左に寄せる
fn alignment(cell: &Cell) -> TextAlign {
    match cell.style.as_ref().map(|s| s.alignment).unwrap_or_default() {
        HorizontalAlignment::Left => TextAlign::Left,
        HorizontalAlignment::Center => TextAlign::Center,
        HorizontalAlignment::Right => TextAlign::Right,
        HorizontalAlignment::General => match cell.value {
            CellValue::Number(_) | CellValue::DateTime(_) | CellValue::Duration(_) => {
                TextAlign::Right
            }
            CellValue::Bool(_) | CellValue::Error(_) => TextAlign::Center,
            CellValue::String(_) | CellValue::Empty => TextAlign::Left,
        },
    }
}

/// 累積位置（先頭に`origin`を含み、要素数は`sizes.len() + 1`）
fn edges(origin: f32, sizes: &[f32], scale: f32) -> Vec<f32> {
    let mut out = Vec::with_capacity(sizes.len() + 1);
    let mut pos = origin;
    out.push(pos);
    for size in sizes {
        pos += size * scale;
        out.push(pos);
    }
    out
}

/// シート内のすべてのページに共通する寸法
struct PageFrame {
    width: f32,
    height: f32,
    margins: Margins,
    scale: f32,
    font_size: f32,
    /// 縮小後の見出し行の高さ
    header_h: f32,
    show_gridlines: bool,
}

impl PageFrame {
    fn col_edges(&self, grid: &SheetGrid, band: Band) -> Vec<f32> {
        edges(
            self.margins.left,
            &grid.col_widths[band.start..band.end],
            self.scale,
        )
    }

    fn row_edges(&self, grid: &SheetGrid, band: Band) -> Vec<f32> {
        let top = if self.repeats_header(grid, band) {
            self.margins.top + self.header_h
        } else {
            self.margins.top
        };
        edges(top, &grid.row_heights[band.start..band.end], self.scale)
    }

    fn repeats_header(&self, grid: &SheetGrid, row_band: Band) -> bool {
        grid.header && row_band.start > 0
    }

    /// セルを含まないページの骨組み
    fn page(
        &self,
        sheet: &Sheet,
        grid: &SheetGrid,
        (col_band, xs): (Band, &[f32]),
        (row_band, ys): (Band, &[f32]),
    ) -> PageDescriptor {
        let left = xs[0];
        let band_width = xs[xs.len() - 1] - left;
        let repeat = self.repeats_header(grid, row_band);

        let header_area = if repeat {
            Some(Rect::new(left, self.margins.top, band_width, self.header_h))
        } else if grid.header && row_band.start == 0 {
            Some(Rect::new(left, ys[0], band_width, ys[1] - ys[0]))
        } else {
            None
        };

        let repeated_header = if repeat {
            grid.entries
                .iter()
                .take_while(|e| e.row == 0)
                .filter(|e| col_band.contains(e.col))
                .map(|e| {
                    let (x, w) = span(xs, col_band, e.col, e.col_end);
                    self.placed(e, Rect::new(x, self.margins.top, w, self.header_h))
                })
                .collect()
        } else {
            Vec::new()
        };

        let gridlines = if self.show_gridlines {
            let mut boxes = Vec::new();
            if repeat {
                for col in col_band.start..col_band.end {
                    if grid.covered.contains(&(0, col)) {
                        continue;
                    }
                    let col_end = grid.spans.get(&(0, col)).map_or(col, |s| s.1);
                    let (x, w) = span(xs, col_band, col, col_end);
                    boxes.push(Rect::new(x, self.margins.top, w, self.header_h));
                }
            }
            for row in row_band.start..row_band.end {
                for col in col_band.start..col_band.end {
                    if grid.covered.contains(&(row, col)) {
                        continue;
                    }
                    let (row_end, col_end) = grid.spans.get(&(row, col)).copied().unwrap_or((row, col));
                    let (x, w) = span(xs, col_band, col, col_end);
                    let (y, h) = span(ys, row_band, row, row_end);
                    boxes.push(Rect::new(x, y, w, h));
                }
            }
            boxes
        } else {
            Vec::new()
        };

        PageDescriptor {
            sheet_name: sheet.name().to_string(),
            sheet_index: sheet.index(),
            page_number: 0,
            page_count: 0,
            sheet_page_number: 0,
            page_count_in_sheet: 0,
            row_range: (grid.rows[row_band.start], grid.rows[row_band.end - 1]),
            col_range: (grid.cols[col_band.start], grid.cols[col_band.end - 1]),
            width: self.width,
            height: self.height,
            margins: self.margins,
            scale: self.scale,
            cells: Vec::new(),
            repeated_header,
            header_area,
            show_gridlines: self.show_gridlines,
            gridlines,
            footer: None,
        }
    }

    fn placed(&self, entry: &Entry, rect: Rect) -> PlacedCell {
        PlacedCell {
            coord: entry.coord,
            text: entry.text.clone(),
            rect,
            font: entry.font,
            font_size: self.font_size,
            align: entry.align,
        }
    }
}

/// 帯の中で`first..=last`が占める位置と長さ
fn span(edges: &[f32], band: Band, first: usize, last: usize) -> (f32, f32) {
    let start = first - band.start;
    let end = last.min(band.end - 1) + 1 - band.start;
    (edges[start], edges[end] - edges[start])
}
