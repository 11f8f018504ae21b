//! WinAnsiEncoding
//!
//! PDF標準フォントで描画できる文字集合への変換。
//! 表現できない文字は`?`に置き換えます。

use unicode_width::UnicodeWidthChar;

/// 0x80〜0x9Fに割り当てられた文字
const HIGH_BLOCK: [(char, u8); 27] = [
    ('\u{20AC}', 0x80),
    ('\u{201A}', 0x82),
    ('\u{0192}', 0x83),
    ('\u{201E}', 0x84),
    ('\u{2026}', 0x85),
    ('\u{2020}', 0x86),
    ('\u{2021}', 0x87),
    ('\u{02C6}', 0x88),
    ('\u{2030}', 0x89),
    ('\u{0160}', 0x8A),
    ('\u{2039}', 0x8B),
    ('\u{0152}', 0x8C),
    ('\u{017D}', 0x8E),
    ('\u{2018}', 0x91),
    ('\u{2019}', 0x92),
    ('\u{201C}', 0x93),
    ('\u{201D}', 0x94),
    ('\u{2022}', 0x95),
    ('\u{2013}', 0x96),
    ('\u{2014}', 0x97),
    ('\u{02DC}', 0x98),
    ('\u{2122}', 0x99),
    ('\u{0161}', 0x9A),
    ('\u{203A}', 0x9B),
    ('\u{0153}', 0x9C),
    ('\u{017E}', 0x9E),
    ('\u{0178}', 0x9F),
];

pub(crate) const REPLACEMENT: u8 = b'?';

/// 1文字をWinAnsiのバイトに変換
///
/// 描画しない文字（制御文字と幅0の結合文字）は`None`、
/// 表現できない文字は置換文字を`Err`に入れて返します。
pub(crate) fn encode_char(c: char) -> Option<Result<u8, u8>> {
    match c {
        '\t' => return Some(Ok(b' ')),
        ' '..='~' => return Some(Ok(c as u8)),
        '\u{A0}'..='\u{FF}' => return Some(Ok(c as u32 as u8)),
        _ => {}
    }
    if let Some(&(_, byte)) = HIGH_BLOCK.iter().find(|(ch, _)| *ch == c) {
        return Some(Ok(byte));
    }
    if c.is_control() {
        return None;
    }
    match c.width() {
        None | Some(0) => None,
        Some(_) => Some(Err(REPLACEMENT)),
    }
}

/// 文字列をWinAnsiのバイト列に変換
///
/// 戻り値の2番目は置換された文字数です。
pub(crate) fn encode(text: &str) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(text.len());
    let mut replaced = 0;
    for c in text.chars() {
        match encode_char(c) {
            Some(Ok(byte)) => out.push(byte),
            Some(Err(byte)) => {
                out.push(byte);
                replaced += 1;
            }
            None => {}
        }
    }
    (out, replaced)
}
