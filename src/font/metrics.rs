//! Helveticaの文字幅（AFM、1000単位）

use super::FontFace;

/// Helvetica / Helvetica-Oblique（0x20〜0x7E）
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Helvetica-Bold（0x20〜0x7E）
#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// WinAnsiのバイト値に対する幅
pub(crate) fn glyph_width(byte: u8, face: FontFace) -> u16 {
    let table = match face {
        FontFace::Bold => &HELVETICA_BOLD,
        FontFace::Regular | FontFace::Italic => &HELVETICA,
    };
    match byte {
        0x20..=0x7E => table[(byte - 0x20) as usize],
        _ => extended_width(byte, table),
    }
}

/// 0x80以降のグリフは対応するASCII文字の幅で近似する
fn extended_width(byte: u8, table: &[u16; 95]) -> u16 {
    let ascii = |c: u8| table[(c - 0x20) as usize];
    match byte {
        0x85 | 0x89 | 0x97 | 0x99 => 1000,
        0x95 => 350,
        0x91 | 0x92 | 0x82 => ascii(b','),
        0x93 | 0x94 | 0x84 => ascii(b'"'),
        0x96 => ascii(b'-') + 223,
        0xA0 => ascii(b' '),
        0xC0..=0xC5 => ascii(b'A'),
        0xC6 => 1000,
        0xC7 => ascii(b'C'),
        0xC8..=0xCB => ascii(b'E'),
        0xCC..=0xCF => ascii(b'I'),
        0xD1 => ascii(b'N'),
        0xD2..=0xD6 | 0xD8 => ascii(b'O'),
        0xD9..=0xDC => ascii(b'U'),
        0xDD => ascii(b'Y'),
        0xE0..=0xE5 => ascii(b'a'),
        0xE6 => 889,
        0xE7 => ascii(b'c'),
        0xE8..=0xEB => ascii(b'e'),
        0xEC..=0xEF => ascii(b'i').max(278),
        0xF1 => ascii(b'n'),
        0xF2..=0xF6 | 0xF8 => ascii(b'o'),
        0xF9..=0xFC => ascii(b'u'),
        0xFD | 0xFF => ascii(b'y'),
        0xD7 | 0xF7 => ascii(b'+'),
        _ => 556,
    }
}
