//! XLSX Metadata Parser
//!
//! calamineが公開しないレイアウト情報（列幅、行の高さ、非表示の行・列、
//! セルの書式、1904年エポック）をXLSXのXMLから直接読み取ります。

use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{Cursor, Read, Seek};
use tracing::debug;
use zip::ZipArchive;

use crate::error::XlsxToPdfError;
use crate::types::{CellCoord, CellStyle, HorizontalAlignment};

/// Calibri 11ptにおける最大数字幅（ピクセル）
const MAX_DIGIT_WIDTH_PX: f32 = 7.0;

/// ピクセルからポイントへの換算係数（96dpi）
const PX_TO_PT: f32 = 0.75;

/// ワークシート1枚分のレイアウト情報
#[derive(Debug, Clone, Default)]
pub(crate) struct WorksheetMetadata {
    /// 列幅（ポイント）
    pub column_widths: BTreeMap<u32, f32>,
    /// 行の高さ（ポイント）
    pub row_heights: BTreeMap<u32, f32>,
    pub hidden_rows: BTreeSet<u32>,
    pub hidden_cols: BTreeSet<u32>,
    /// セル座標 → cellXfsのインデックス
    pub cell_styles: HashMap<CellCoord, u32>,
}

/// XLSXメタデータ
#[derive(Debug, Clone, Default)]
pub(crate) struct XlsxMetadata {
    pub is_1904: bool,
    sheets: HashMap<String, WorksheetMetadata>,
    styles: Vec<CellStyle>,
}

impl XlsxMetadata {
    /// XLSXファイル（ZIPアーカイブ）からメタデータを解析
    ///
    /// アーカイブのセキュリティ検査は呼び出し側で済んでいる前提です。
    pub fn parse(bytes: &[u8]) -> Result<Self, XlsxToPdfError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;

        let workbook_xml = read_entry(&mut archive, "xl/workbook.xml")?
            .ok_or_else(|| XlsxToPdfError::parse("xl/workbook.xml is missing"))?;
        let (is_1904, sheet_refs) = parse_workbook(&workbook_xml)?;

        let rels = match read_entry(&mut archive, "xl/_rels/workbook.xml.rels")? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };

        let styles = match read_entry(&mut archive, "xl/styles.xml")? {
            Some(xml) => parse_styles(&xml)?,
            None => Vec::new(),
        };

        let mut sheets = HashMap::new();
        for (name, rid) in sheet_refs {
            let Some(target) = rels.get(&rid) else {
                debug!(sheet = %name, rid = %rid, "no relationship for sheet");
                continue;
            };
            let path = resolve_target(target);
            match read_entry(&mut archive, &path)? {
                Some(xml) => {
                    sheets.insert(name, parse_worksheet(&xml)?);
                }
                None => debug!(sheet = %name, path = %path, "worksheet part not found"),
            }
        }

        Ok(Self {
            is_1904,
            sheets,
            styles,
        })
    }

    pub fn sheet(&self, name: &str) -> Option<&WorksheetMetadata> {
        self.sheets.get(name)
    }

    /// cellXfsのインデックスから書式を取得
    pub fn style(&self, xf_index: u32) -> Option<&CellStyle> {
        self.styles.get(xf_index as usize)
    }
}

/// Excelの列幅（文字数単位）をポイントに変換
///
/// `<col width>`の値はパディングを含むため、最大数字幅を掛けて
/// ピクセルに丸めた後にポイントへ換算します。
pub(crate) fn column_width_to_points(width: f32) -> f32 {
    (width * MAX_DIGIT_WIDTH_PX).round() * PX_TO_PT
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<Option<Vec<u8>>, XlsxToPdfError> {
    let mut file = match archive.by_name(path) {
        Ok(file) => file,
        Err(_) => return Ok(None),
    };
    let mut content = Vec::new();
    file.read_to_end(&mut content)?;
    Ok(Some(content))
}

/// 関係ファイルのターゲットをアーカイブ内のパスに変換
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target.trim_start_matches("./")),
    }
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, XlsxToPdfError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == key {
            let raw = std::str::from_utf8(&attr.value)
                .map_err(|e| XlsxToPdfError::parse(format!("Invalid UTF-8 in attribute: {}", e)))?;
            let value = unescape(raw)
                .map_err(|e| XlsxToPdfError::parse(format!("XML escape error: {}", e)))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn attr_parse<T: std::str::FromStr>(
    e: &BytesStart<'_>,
    key: &[u8],
) -> Result<Option<T>, XlsxToPdfError> {
    Ok(attr_value(e, key)?.and_then(|v| v.trim().parse().ok()))
}

fn attr_flag(e: &BytesStart<'_>, key: &[u8]) -> Result<bool, XlsxToPdfError> {
    Ok(matches!(attr_value(e, key)?.as_deref(), Some("1") | Some("true")))
}

/// `xl/workbook.xml`を解析し、1904フラグとシート一覧（名前, r:id）を返す
fn parse_workbook(xml: &[u8]) -> Result<(bool, Vec<(String, String)>), XlsxToPdfError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut is_1904 = false;
    let mut sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"workbookPr" => is_1904 = attr_flag(&e, b"date1904")?,
                b"sheet" => {
                    if let (Some(name), Some(rid)) = (attr_value(&e, b"name")?, attr_value(&e, b"id")?)
                    {
                        sheets.push((name, rid));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok((is_1904, sheets))
}

/// `xl/_rels/workbook.xml.rels`を解析（Id → Target）
fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, String>, XlsxToPdfError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut rels = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attr_value(&e, b"Id")?, attr_value(&e, b"Target")?)
                {
                    rels.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

#[derive(Debug, Default)]
struct RawXf {
    num_fmt_id: u32,
    font_id: usize,
    alignment: HorizontalAlignment,
}

#[derive(Default)]
struct StylesState {
    in_num_fmts: bool,
    in_fonts: bool,
    in_cell_xfs: bool,
    num_formats: HashMap<u32, String>,
    fonts: Vec<(bool, bool)>,
    current_font: Option<(bool, bool)>,
    xfs: Vec<RawXf>,
    current_xf: Option<RawXf>,
}

impl StylesState {
    fn open(&mut self, e: &BytesStart<'_>, is_empty: bool) -> Result<(), XlsxToPdfError> {
        match e.local_name().as_ref() {
            b"numFmts" => self.in_num_fmts = !is_empty,
            b"numFmt" if self.in_num_fmts => {
                if let (Some(id), Some(code)) =
                    (attr_parse::<u32>(e, b"numFmtId")?, attr_value(e, b"formatCode")?)
                {
                    self.num_formats.insert(id, code);
                }
            }
            b"fonts" => self.in_fonts = !is_empty,
            b"font" if self.in_fonts => {
                if is_empty {
                    self.fonts.push((false, false));
                } else {
                    self.current_font = Some((false, false));
                }
            }
            b"b" | b"i" => {
                if let Some(font) = self.current_font.as_mut() {
                    // <b/> は真、<b val="0"/> は偽
                    let on = !matches!(attr_value(e, b"val")?.as_deref(), Some("0") | Some("false"));
                    if e.local_name().as_ref() == b"b" {
                        font.0 = on;
                    } else {
                        font.1 = on;
                    }
                }
            }
            b"cellXfs" => self.in_cell_xfs = !is_empty,
            b"xf" if self.in_cell_xfs => {
                let xf = RawXf {
                    num_fmt_id: attr_parse(e, b"numFmtId")?.unwrap_or(0),
                    font_id: attr_parse(e, b"fontId")?.unwrap_or(0),
                    alignment: HorizontalAlignment::General,
                };
                if is_empty {
                    self.xfs.push(xf);
                } else {
                    self.current_xf = Some(xf);
                }
            }
            b"alignment" => {
                if let Some(xf) = self.current_xf.as_mut() {
                    xf.alignment = match attr_value(e, b"horizontal")?.as_deref() {
                        Some("left") => HorizontalAlignment::Left,
                        Some("center") | Some("centerContinuous") => HorizontalAlignment::Center,
                        Some("right") => HorizontalAlignment::Right,
                        _ => HorizontalAlignment::General,
                    };
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"numFmts" => self.in_num_fmts = false,
            b"fonts" => self.in_fonts = false,
            b"font" => {
                if let Some(font) = self.current_font.take() {
                    self.fonts.push(font);
                }
            }
            b"cellXfs" => self.in_cell_xfs = false,
            b"xf" => {
                if let Some(xf) = self.current_xf.take() {
                    self.xfs.push(xf);
                }
            }
            _ => {}
        }
    }

    fn into_styles(self) -> Vec<CellStyle> {
        self.xfs
            .into_iter()
            .map(|xf| {
                let (bold, italic) = self.fonts.get(xf.font_id).copied().unwrap_or_default();
                let number_format = self
                    .num_formats
                    .get(&xf.num_fmt_id)
                    .cloned()
                    .or_else(|| builtin_format(xf.num_fmt_id).map(str::to_string))
                    .filter(|code| code != "General");
                CellStyle {
                    bold,
                    italic,
                    alignment: xf.alignment,
                    number_format,
                }
            })
            .collect()
    }
}

/// `xl/styles.xml`を解析し、cellXfsの順に書式を返す
fn parse_styles(xml: &[u8]) -> Result<Vec<CellStyle>, XlsxToPdfError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut state = StylesState::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => state.open(&e, false)?,
            Event::Empty(e) => state.open(&e, true)?,
            Event::End(e) => state.close(e.local_name().as_ref()),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(state.into_styles())
}

/// ワークシートXMLを解析
fn parse_worksheet(xml: &[u8]) -> Result<WorksheetMetadata, XlsxToPdfError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut meta = WorksheetMetadata::default();
    // r属性が省略された行・セルのための位置
    let mut current_row: u32 = 0;
    let mut next_col: u32 = 0;
    let mut seen_row = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"col" => {
                    let min: u32 = attr_parse(&e, b"min")?.unwrap_or(1).clamp(1, 16_384);
                    let max: u32 = attr_parse(&e, b"max")?.unwrap_or(min).clamp(min, 16_384);
                    let hidden = attr_flag(&e, b"hidden")?;
                    let width: Option<f32> = attr_parse(&e, b"width")?;
                    for col in (min - 1)..max {
                        if hidden {
                            meta.hidden_cols.insert(col);
                        } else if let Some(w) = width {
                            meta.column_widths.insert(col, column_width_to_points(w));
                        }
                    }
                }
                b"row" => {
                    current_row = match attr_parse::<u32>(&e, b"r")? {
                        Some(r) if r > 0 => r - 1,
                        _ if seen_row => current_row + 1,
                        _ => 0,
                    };
                    seen_row = true;
                    next_col = 0;
                    if attr_flag(&e, b"hidden")? {
                        meta.hidden_rows.insert(current_row);
                    }
                    if let Some(ht) = attr_parse::<f32>(&e, b"ht")? {
                        meta.row_heights.insert(current_row, ht);
                    }
                }
                b"c" => {
                    let coord = attr_value(&e, b"r")?
                        .and_then(|r| CellCoord::from_a1_notation(&r))
                        .unwrap_or_else(|| CellCoord::new(current_row, next_col));
                    next_col = coord.col + 1;
                    if let Some(s) = attr_parse::<u32>(&e, b"s")? {
                        if s > 0 {
                            meta.cell_styles.insert(coord, s);
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(meta)
}

/// ビルトイン書式ID（0-49）のマッピング
///
/// 通貨・会計の書式は数値の桁区切りとして扱える形に限定しています。
fn builtin_format(id: u32) -> Option<&'static str> {
    match id {
        0 => Some("General"),
        1 => Some("0"),
        2 => Some("0.00"),
        3 | 37 | 38 => Some("#,##0"),
        4 | 39 | 40 => Some("#,##0.00"),
        9 => Some("0%"),
        10 => Some("0.00%"),
        11 | 48 => Some("0.00E+00"),
        14 => Some("mm-dd-yy"),
        15 => Some("d-mmm-yy"),
        16 => Some("d-mmm"),
        17 => Some("mmm-yy"),
        18 => Some("h:mm AM/PM"),
        19 => Some("h:mm:ss AM/PM"),
        20 => Some("h:mm"),
        21 => Some("h:mm:ss"),
        22 => Some("m/d/yy h:mm"),
        45 => Some("mm:ss"),
        46 => Some("[h]:mm:ss"),
        47 => Some("mm:ss.0"),
        49 => Some("@"),
        _ => None,
    }
}
