//! ページの内容ストリーム
//!
//! レイアウト座標（左上原点、y下向き）をPDF座標（左下原点、y上向き）に変換して描画します。

use pdf_writer::{Content, Name, Str};

use crate::font::{self, fit_text, text_width, FontFace};
use crate::layout::{PageDescriptor, PlacedCell, Rect, TextAlign};

/// セル内の左右の余白（縮小前、ポイント）
const CELL_PADDING: f32 = 3.0;

const LINE_SPACING: f32 = 1.2;

/// 行の上端からベースラインまでの距離（フォントサイズに対する倍率）
const BASELINE: f32 = 0.86;

const GRID_GRAY: f32 = 0.75;
const HEADER_GRAY: f32 = 0.9;
const FOOTER_SIZE: f32 = 8.0;

/// 1ページを描画した結果
pub(crate) struct PageContent {
    pub bytes: Vec<u8>,
    /// WinAnsiEncodingで表せず置換した文字数
    pub replaced: usize,
}

pub(crate) fn draw_page(page: &PageDescriptor) -> PageContent {
    let mut painter = Painter {
        content: Content::new(),
        height: page.height,
        padding: CELL_PADDING * page.scale,
        replaced: 0,
    };

    if let Some(area) = page.header_area {
        painter.shade(area);
    }
    if page.show_gridlines && !page.gridlines.is_empty() {
        painter.grid(&page.gridlines, page.scale);
    }
    for cell in page.all_cells() {
        painter.cell(cell);
    }
    if let Some(footer) = &page.footer {
        painter.footer(footer, page.width, page.margins.bottom);
    }

    PageContent {
        bytes: painter.content.finish(),
        replaced: painter.replaced,
    }
}

struct Painter {
    content: Content,
    height: f32,
    padding: f32,
    replaced: usize,
}

impl Painter {
    fn flip(&self, y: f32) -> f32 {
        self.height - y
    }

    fn shade(&mut self, area: Rect) {
        let y = self.flip(area.bottom());
        self.content
            .save_state()
            .set_fill_gray(HEADER_GRAY)
            .rect(area.x, y, area.width, area.height)
            .fill_nonzero()
            .restore_state();
    }

    fn grid(&mut self, boxes: &[Rect], scale: f32) {
        self.content
            .save_state()
            .set_stroke_gray(GRID_GRAY)
            .set_line_width((0.5 * scale).max(0.1));
        for rect in boxes {
            let y = self.flip(rect.bottom());
            self.content.rect(rect.x, y, rect.width, rect.height);
        }
        self.content.stroke().restore_state();
    }

    fn cell(&mut self, cell: &PlacedCell) {
        if cell.text.is_empty() {
            return;
        }
        let size = cell.font_size;
        let line_height = size * LINE_SPACING;
        let max_width = cell.rect.width - 2.0 * self.padding;
        let capacity = ((cell.rect.height / line_height).floor() as usize).max(1);
        let lines: Vec<&str> = cell.text.lines().take(capacity).collect();

        let block = lines.len() as f32 * line_height;
        let top = cell.rect.y + ((cell.rect.height - block) / 2.0).max(0.0);

        for (i, line) in lines.iter().enumerate() {
            let fitted = fit_text(line, cell.font, size, max_width);
            if fitted.is_empty() {
                continue;
            }
            let width = text_width(&fitted, cell.font, size);
            let x = match cell.align {
                TextAlign::Left => cell.rect.x + self.padding,
                TextAlign::Right => cell.rect.right() - self.padding - width,
                TextAlign::Center => cell.rect.x + (cell.rect.width - width) / 2.0,
            };
            let baseline = top + i as f32 * line_height + size * BASELINE;
            self.text(&fitted, cell.font, size, x, self.flip(baseline));
        }
    }

    fn footer(&mut self, footer: &str, page_width: f32, bottom_margin: f32) {
        let width = text_width(footer, FontFace::Regular, FOOTER_SIZE);
        let x = (page_width - width) / 2.0;
        let y = (bottom_margin / 2.0 - FOOTER_SIZE / 3.0).max(2.0);
        self.text(footer, FontFace::Regular, FOOTER_SIZE, x, y);
    }

    fn text(&mut self, text: &str, face: FontFace, size: f32, x: f32, y: f32) {
        let (bytes, replaced) = font::encode(text);
        self.replaced += replaced;
        if bytes.is_empty() {
            return;
        }
        self.content
            .begin_text()
            .set_font(Name(face.resource_name()), size)
            .next_line(x, y)
            .show(Str(&bytes))
            .end_text();
    }
}
