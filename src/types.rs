//! Types Module
//!
//! ワークブックのメモリ内表現を定義するモジュール。
//! Readerが構築し、Layout Engineが読み取ります。

use crate::api::SourceFormat;
use crate::error::XlsxToPdfError;
use std::collections::{BTreeMap, BTreeSet};

/// セルの値
///
/// 書式適用前の生の値を保持します。
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// 数値
    Number(f64),

    /// 文字列
    String(String),

    /// 真偽値
    Bool(bool),

    /// 日時（Excelのシリアル値）
    DateTime(f64),

    /// 経過時間（日単位のシリアル値）
    Duration(f64),

    /// エラー値（例: `#DIV/0!`）
    Error(String),

    /// 空セル
    Empty,
}

impl CellValue {
    /// 空セルかどうか
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// 数値として右寄せされる値かどうか
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            CellValue::Number(_) | CellValue::DateTime(_) | CellValue::Duration(_)
        )
    }
}

/// セル座標（0始まり）
///
/// 行優先で順序付けされます。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    /// 行番号（0始まり）
    pub row: u32,
    /// 列番号（0始まり）
    pub col: u32,
}

impl CellCoord {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// A1記法に変換（例: (0, 0) → "A1"）
    #[allow(clippy::wrong_self_convention)]
    pub fn to_a1_notation(&self) -> String {
        let col_str = Self::col_index_to_letter(self.col);
        format!("{}{}", col_str, self.row + 1)
    }

    /// A1記法を解析（例: "AB12" → (11, 27)）
    ///
    /// `$`による絶対参照記号は無視します。解析できない場合は`None`を返します。
    pub fn from_a1_notation(s: &str) -> Option<Self> {
        let s = s.trim().replace('$', "");
        let split = s.find(|c: char| c.is_ascii_digit())?;
        let (letters, digits) = s.split_at(split);
        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            let v = (c.to_ascii_uppercase() as u32) - ('A' as u32) + 1;
            col = col.checked_mul(26)?.checked_add(v)?;
        }
        let row: u32 = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(Self::new(row - 1, col - 1))
    }

    fn col_index_to_letter(mut col: u32) -> String {
        let mut result = String::new();
        loop {
            let remainder = col % 26;
            result.insert(0, (b'A' + remainder as u8) as char);
            if col < 26 {
                break;
            }
            col = col / 26 - 1;
        }
        result
    }
}

/// セル範囲（両端を含む）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub start: CellCoord,
    pub end: CellCoord,
}

impl CellRange {
    pub fn new(start: CellCoord, end: CellCoord) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, coord: CellCoord) -> bool {
        coord.row >= self.start.row
            && coord.row <= self.end.row
            && coord.col >= self.start.col
            && coord.col <= self.end.col
    }

    /// 範囲のサイズ（行数, 列数）
    pub fn size(&self) -> (u32, u32) {
        let rows = self.end.row - self.start.row + 1;
        let cols = self.end.col - self.start.col + 1;
        (rows, cols)
    }
}

/// 結合セル範囲
///
/// 値は範囲の左上セル（親セル）にのみ保持されます。
/// ページ分割はこの範囲の内側では行われません。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRegion {
    /// 結合範囲
    pub range: CellRange,

    /// 親セル（左上）の座標
    pub parent: CellCoord,
}

impl MergedRegion {
    pub fn new(range: CellRange) -> Self {
        Self {
            parent: range.start,
            range,
        }
    }

    pub fn contains(&self, coord: CellCoord) -> bool {
        self.range.contains(coord)
    }

    pub fn row_span(&self) -> u32 {
        self.range.end.row - self.range.start.row + 1
    }

    pub fn col_span(&self) -> u32 {
        self.range.end.col - self.range.start.col + 1
    }
}

/// 水平方向の配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HorizontalAlignment {
    /// 値の型に従う（数値は右、それ以外は左）
    #[default]
    General,
    Left,
    Center,
    Right,
}

/// セルの書式
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CellStyle {
    pub bold: bool,
    pub italic: bool,
    pub alignment: HorizontalAlignment,
    /// 表示形式コード（例: `0.00%`、`yyyy-mm-dd`）
    pub number_format: Option<String>,
}

/// セル
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub coord: CellCoord,
    pub value: CellValue,
    pub style: Option<CellStyle>,
}

impl Cell {
    pub fn new(coord: CellCoord, value: CellValue) -> Self {
        Self {
            coord,
            value,
            style: None,
        }
    }

    pub fn with_style(mut self, style: CellStyle) -> Self {
        self.style = Some(style);
        self
    }
}

/// シート
///
/// セルは座標ごとに一意です。列幅と行の高さはポイント単位で、
/// 明示的に指定された行・列のみ保持します。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sheet {
    name: String,
    index: usize,
    cells: BTreeMap<CellCoord, Cell>,
    merged_regions: Vec<MergedRegion>,
    column_widths: BTreeMap<u32, f32>,
    row_heights: BTreeMap<u32, f32>,
    hidden_rows: BTreeSet<u32>,
    hidden_cols: BTreeSet<u32>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// ワークブック内でのシート位置（0始まり）
    pub fn index(&self) -> usize {
        self.index
    }

    /// セルを追加する
    ///
    /// 同じ座標のセルが既に存在する場合は`Parse`エラーを返します。
    pub fn insert(&mut self, cell: Cell) -> Result<(), XlsxToPdfError> {
        if self.cells.contains_key(&cell.coord) {
            return Err(XlsxToPdfError::parse(format!(
                "Duplicate cell {} in sheet '{}'",
                cell.coord.to_a1_notation(),
                self.name
            )));
        }
        self.cells.insert(cell.coord, cell);
        Ok(())
    }

    pub fn cell(&self, coord: CellCoord) -> Option<&Cell> {
        self.cells.get(&coord)
    }

    /// 行優先の順序でセルを返す
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// 内容の範囲（行数, 列数）
    ///
    /// A1から最後のセルまでを数えます。セルがない場合は`(0, 0)`です。
    pub fn dimensions(&self) -> (u32, u32) {
        let rows = self
            .cells
            .keys()
            .next_back()
            .map(|c| c.row + 1)
            .unwrap_or(0);
        let cols = self.cells.keys().map(|c| c.col + 1).max().unwrap_or(0);
        // 結合範囲が内容の外側まで広がっている場合も含める
        let (m_rows, m_cols) = self
            .merged_regions
            .iter()
            .filter(|m| self.cells.contains_key(&m.parent))
            .fold((0, 0), |(r, c), m| {
                (r.max(m.range.end.row + 1), c.max(m.range.end.col + 1))
            });
        (rows.max(m_rows), cols.max(m_cols))
    }

    pub fn add_merged_region(&mut self, region: MergedRegion) {
        self.merged_regions.push(region);
    }

    pub fn merged_regions(&self) -> &[MergedRegion] {
        &self.merged_regions
    }

    /// 親セルの座標から結合範囲を探す
    pub fn merged_region_at(&self, parent: CellCoord) -> Option<&MergedRegion> {
        self.merged_regions.iter().find(|m| m.parent == parent)
    }

    pub fn set_column_width(&mut self, col: u32, points: f32) {
        self.column_widths.insert(col, points);
    }

    pub fn column_width(&self, col: u32) -> Option<f32> {
        self.column_widths.get(&col).copied()
    }

    pub fn set_row_height(&mut self, row: u32, points: f32) {
        self.row_heights.insert(row, points);
    }

    pub fn row_height(&self, row: u32) -> Option<f32> {
        self.row_heights.get(&row).copied()
    }

    pub fn hide_row(&mut self, row: u32) {
        self.hidden_rows.insert(row);
    }

    pub fn hide_col(&mut self, col: u32) {
        self.hidden_cols.insert(col);
    }

    pub fn is_row_hidden(&self, row: u32) -> bool {
        self.hidden_rows.contains(&row)
    }

    pub fn is_col_hidden(&self, col: u32) -> bool {
        self.hidden_cols.contains(&col)
    }
}

/// ワークブック
///
/// シートは元ファイルの順序を保持します。
#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    pub format: SourceFormat,
    pub sheets: Vec<Sheet>,
    /// 1904年エポックを使用するかどうか
    pub is_1904: bool,
}

impl Workbook {
    pub fn new(format: SourceFormat) -> Self {
        Self {
            format,
            sheets: Vec::new(),
            is_1904: false,
        }
    }
}
