//! Render Module
//!
//! ページ記述子の列をPDF文書に書き出すモジュール。
//! 文書構造（カタログ、ページツリー、フォント、文書情報、相互参照表）は
//! `pdf-writer`で組み立て、内容ストリームは`miniz_oxide`で圧縮します。

mod content;

use pdf_writer::{Filter, Name, Pdf, Rect, Ref, TextStr};
use tracing::{debug, warn};

use crate::error::XlsxToPdfError;
use crate::font::FontFace;
use crate::layout::PageDescriptor;
use crate::progress::{NoProgress, StageProgress, RENDER_BAND};

const PRODUCER: &str = "xlsxpdf";

/// PDFレンダラー
///
/// # 使用例
///
/// ```rust
/// use xlsxpdf::{
///     Cell, CellCoord, CellValue, ConversionSettings, LayoutEngine, PdfRenderer, Sheet,
///     SourceFormat, Workbook,
/// };
///
/// let mut sheet = Sheet::new("Sheet1", 0);
/// sheet
///     .insert(Cell::new(CellCoord::new(0, 0), CellValue::Number(1.0)))
///     .unwrap();
/// let mut workbook = Workbook::new(SourceFormat::Xlsx);
/// workbook.sheets.push(sheet);
///
/// let pages = LayoutEngine::default()
///     .layout(&workbook, &ConversionSettings::default())
///     .unwrap();
/// let pdf = PdfRenderer::new().with_title("Report").render(&pages).unwrap();
/// assert!(pdf.starts_with(b"%PDF-"));
/// ```
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    compress: bool,
    title: Option<String>,
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self {
            compress: true,
            title: None,
        }
    }
}

impl PdfRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 内容ストリームをFlateDecodeで圧縮するかどうか（デフォルト: true）
    pub fn compress_streams(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// 文書情報のタイトル
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// ページ列をPDFのバイト列にする
    pub fn render(&self, pages: &[PageDescriptor]) -> Result<Vec<u8>, XlsxToPdfError> {
        self.render_with_progress(pages, StageProgress::new(&NoProgress, RENDER_BAND))
    }

    pub(crate) fn render_with_progress(
        &self,
        pages: &[PageDescriptor],
        progress: StageProgress<'_>,
    ) -> Result<Vec<u8>, XlsxToPdfError> {
        if pages.is_empty() {
            return Err(XlsxToPdfError::Render("No pages to render".to_string()));
        }
        if let Some(page) = pages
            .iter()
            .find(|p| !(p.width.is_finite() && p.height.is_finite() && p.width > 0.0 && p.height > 0.0))
        {
            return Err(XlsxToPdfError::Render(format!(
                "Invalid page size {}x{} on page {}",
                page.width, page.height, page.page_number
            )));
        }

        let mut ids = RefAllocator::default();
        let catalog_id = ids.next();
        let pages_id = ids.next();
        let info_id = ids.next();
        let font_ids: Vec<(FontFace, Ref)> =
            FontFace::ALL.iter().map(|&face| (face, ids.next())).collect();
        let page_ids: Vec<(Ref, Ref)> = pages.iter().map(|_| (ids.next(), ids.next())).collect();

        let mut pdf = Pdf::new();
        pdf.catalog(catalog_id).pages(pages_id);
        pdf.pages(pages_id)
            .kids(page_ids.iter().map(|(page_id, _)| *page_id))
            .count(pages.len() as i32);

        for &(face, id) in &font_ids {
            pdf.type1_font(id)
                .base_font(Name(face.base_font()))
                .encoding_predefined(Name(b"WinAnsiEncoding"));
        }

        let mut replaced = 0;
        for (i, (page, &(page_id, content_id))) in pages.iter().zip(&page_ids).enumerate() {
            progress.checkpoint()?;

            {
                let mut writer = pdf.page(page_id);
                writer
                    .media_box(Rect::new(0.0, 0.0, page.width, page.height))
                    .parent(pages_id)
                    .contents(content_id);
                let mut resources = writer.resources();
                let mut fonts = resources.fonts();
                for &(face, id) in &font_ids {
                    fonts.pair(Name(face.resource_name()), id);
                }
            }

            let drawn = content::draw_page(page);
            replaced += drawn.replaced;
            if self.compress {
                let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&drawn.bytes, 6);
                pdf.stream(content_id, &compressed)
                    .filter(Filter::FlateDecode);
            } else {
                pdf.stream(content_id, &drawn.bytes);
            }

            debug!(
                sheet = %page.sheet_name,
                page = page.page_number,
                cells = page.cells.len(),
                "Page rendered"
            );
            progress.step(i + 1, pages.len());
        }

        {
            let mut info = pdf.document_info(info_id);
            if let Some(title) = &self.title {
                info.title(TextStr(title));
            }
            info.producer(TextStr(PRODUCER));
        }

        if replaced > 0 {
            warn!(
                count = replaced,
                "Characters outside WinAnsiEncoding were replaced with '?'"
            );
        }

        Ok(pdf.finish())
    }
}

/// 間接オブジェクトの番号を1から順に払い出す
#[derive(Default)]
struct RefAllocator {
    last: i32,
}

impl RefAllocator {
    fn next(&mut self) -> Ref {
        self.last += 1;
        Ref::new(self.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ConversionSettings, SourceFormat};
    use crate::error::ErrorKind;
    use crate::layout::LayoutEngine;
    use crate::types::{Cell, CellCoord, CellValue, Sheet, Workbook};

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    fn pages(rows: u32) -> Vec<PageDescriptor> {
        let mut sheet = Sheet::new("Data", 0);
        for row in 0..rows {
            sheet
                .insert(Cell::new(
                    CellCoord::new(row, 0),
                    CellValue::String(format!("Row {}", row)),
                ))
                .unwrap();
        }
        let mut workbook = Workbook::new(SourceFormat::Xlsx);
        workbook.sheets.push(sheet);
        let settings = ConversionSettings {
            fit_to_page: false,
            ..ConversionSettings::default()
        };
        LayoutEngine::default().layout(&workbook, &settings).unwrap()
    }

    #[test]
    fn test_render_no_pages() {
        match PdfRenderer::new().render(&[]) {
            Err(e) => assert_eq!(e.kind(), ErrorKind::RenderError),
            Ok(_) => panic!("Expected render error"),
        }
    }

    #[test]
    fn test_render_invalid_page_size() {
        let mut pages = pages(1);
        pages[0].width = 0.0;
        let err = PdfRenderer::new().render(&pages).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RenderError);
    }

    #[test]
    fn test_render_parses_with_lopdf() {
        let pages = pages(120);
        assert_eq!(pages.len(), 3);
        let bytes = PdfRenderer::new().render(&pages).unwrap();

        assert!(bytes.starts_with(b"%PDF-"));
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
        assert!(contains(&bytes, b"/FlateDecode"));
    }

    #[test]
    fn test_render_uncompressed_content() {
        let bytes = PdfRenderer::new()
            .compress_streams(false)
            .with_title("Quarterly")
            .render(&pages(120))
            .unwrap();

        assert!(!contains(&bytes, b"/FlateDecode"));
        assert!(contains(&bytes, b"(Row 1) Tj"));
        assert!(contains(&bytes, b"(Page 2 / 3) Tj"));
        assert!(contains(&bytes, b"/BaseFont /Helvetica-Bold"));
        assert!(contains(&bytes, b"/WinAnsiEncoding"));
        assert!(contains(&bytes, b"/Title (Quarterly)"));
        assert!(contains(&bytes, b"/Producer (xlsxpdf)"));
        assert!(contains(&bytes, b"/Count 3"));
    }

    #[test]
    fn test_render_cancelled() {
        use crate::progress::ProgressSink;

        struct Cancelled;
        impl ProgressSink for Cancelled {
            fn is_cancelled(&self) -> bool {
                true
            }
        }

        let err = PdfRenderer::new()
            .render_with_progress(&pages(1), StageProgress::new(&Cancelled, RENDER_BAND))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }
}
