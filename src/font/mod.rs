//! Font Module
//!
//! PDF標準14フォントのHelvetica系を前提とした文字幅の計測と、
//! WinAnsiEncodingへの変換を提供します。
//! レイアウト（列幅の自動調整）と描画（省略記号・配置）の両方で使用します。

mod metrics;
mod winansi;

pub(crate) use winansi::encode;

/// 描画に使用する書体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FontFace {
    /// Helvetica
    #[default]
    Regular,
    /// Helvetica-Bold
    Bold,
    /// Helvetica-Oblique
    Italic,
}

impl FontFace {
    /// セル書式から書体を選ぶ（太字を優先）
    pub fn from_style(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (true, _) => FontFace::Bold,
            (false, true) => FontFace::Italic,
            (false, false) => FontFace::Regular,
        }
    }

    /// ページリソース内のフォント名
    pub(crate) fn resource_name(self) -> &'static [u8] {
        match self {
            FontFace::Regular => b"F1",
            FontFace::Bold => b"F2",
            FontFace::Italic => b"F3",
        }
    }

    /// 標準フォントのBaseFont名
    pub(crate) fn base_font(self) -> &'static [u8] {
        match self {
            FontFace::Regular => b"Helvetica",
            FontFace::Bold => b"Helvetica-Bold",
            FontFace::Italic => b"Helvetica-Oblique",
        }
    }

    pub(crate) const ALL: [FontFace; 3] = [FontFace::Regular, FontFace::Bold, FontFace::Italic];
}

const ELLIPSIS: char = '\u{2026}';

/// 幅の比較で許す誤差（ポイント）
const WIDTH_TOLERANCE: f32 = 0.01;

/// 1文字の幅（ポイント）。描画されない文字は0
fn char_width(c: char, face: FontFace, size: f32) -> f32 {
    match winansi::encode_char(c) {
        Some(Ok(byte)) | Some(Err(byte)) => metrics::glyph_width(byte, face) as f32 * size / 1000.0,
        None => 0.0,
    }
}

/// 文字列の描画幅（ポイント）
pub fn text_width(text: &str, face: FontFace, size: f32) -> f32 {
    text.chars().map(|c| char_width(c, face, size)).sum()
}

/// 幅に収まるよう末尾を省略記号で切り詰める
///
/// 収まる場合はそのまま返します。省略記号すら収まらない場合は空文字列です。
pub(crate) fn fit_text(text: &str, face: FontFace, size: f32, max_width: f32) -> String {
    if text_width(text, face, size) <= max_width + WIDTH_TOLERANCE {
        return text.to_string();
    }
    let budget = max_width - char_width(ELLIPSIS, face, size);
    if budget < 0.0 {
        return String::new();
    }

    let mut used = 0.0;
    let mut out = String::new();
    for c in text.chars() {
        let w = char_width(c, face, size);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push(ELLIPSIS);
    out
}
