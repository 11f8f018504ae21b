//! ページ記述子
//!
//! レイアウト結果の1ページ分の内容と配置。座標はポイント単位で、
//! 原点はページ左上、y軸は下向きです（PDF座標への変換は描画側で行います）。

use crate::font::FontFace;
use crate::types::CellCoord;

/// 矩形（左上原点）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// ページ余白（ポイント）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margins {
    /// 全辺同じ余白
    pub fn uniform(value: f32) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }
}

impl Default for Margins {
    /// Excelの「標準」余白（上下0.75インチ、左右0.7インチ）
    fn default() -> Self {
        Self {
            top: 54.0,
            right: 50.4,
            bottom: 54.0,
            left: 50.4,
        }
    }
}

/// セル内の水平配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// ページ上に配置されたセル
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedCell {
    pub coord: CellCoord,
    /// 表示文字列（改行を含むことがある）
    pub text: String,
    /// セルの領域（結合セルは結合範囲全体）
    pub rect: Rect,
    pub font: FontFace,
    /// 縮小率を適用済みのフォントサイズ
    pub font_size: f32,
    pub align: TextAlign,
}

/// 1ページ分のレイアウト結果
#[derive(Debug, Clone, PartialEq)]
pub struct PageDescriptor {
    pub sheet_name: String,
    pub sheet_index: usize,
    /// 文書全体でのページ番号（1始まり）
    pub page_number: usize,
    /// 文書全体のページ数
    pub page_count: usize,
    /// シート内でのページ番号（1始まり）
    pub sheet_page_number: usize,
    pub page_count_in_sheet: usize,
    /// このページに含まれる最初と最後の行（シート上の0始まりの番号）
    pub row_range: (u32, u32),
    /// このページに含まれる最初と最後の列
    pub col_range: (u32, u32),
    pub width: f32,
    pub height: f32,
    pub margins: Margins,
    /// 内容に適用した一様な縮小率（1.0以下）
    pub scale: f32,
    /// このページに割り当てられたセル。各セルはちょうど1ページに属します。
    pub cells: Vec<PlacedCell>,
    /// ページ上部に繰り返された見出し行のセル（`cells`とは重複しません）
    pub repeated_header: Vec<PlacedCell>,
    /// 見出し行の領域（網掛け用）
    pub header_area: Option<Rect>,
    pub show_gridlines: bool,
    /// 枠線を引くセル領域（結合セルは1つの矩形）
    pub gridlines: Vec<Rect>,
    /// フッター文字列（ページ分割時のみ）
    pub footer: Option<String>,
}

impl PageDescriptor {
    /// このページに描画されるすべてのセル
    pub fn all_cells(&self) -> impl Iterator<Item = &PlacedCell> {
        self.repeated_header.iter().chain(self.cells.iter())
    }
}
