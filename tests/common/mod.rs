//! テスト用のワークブック生成ヘルパー
//!
//! xlsxは`rust_xlsxwriter`で、odsは最小構成のZIPを直接組み立てて生成します。

#![allow(dead_code)]

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// 見出し行とデータ行だけの2x2の表
pub fn simple_table() -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    worksheet.write_string(0, 0, "Header1")?;
    worksheet.write_string(0, 1, "Header2")?;
    worksheet.write_string(1, 0, "Data1")?;
    worksheet.write_string(1, 1, "Data2")?;

    workbook.save_to_buffer()
}

/// 1セルずつ値を持つ3枚のシート
pub fn multi_sheets() -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    for name in ["Sheet1", "Sheet2", "Sheet3"] {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name)?;
        worksheet.write_string(0, 0, format!("{}_Data", name))?;
    }
    workbook.save_to_buffer()
}

/// A1:C1を結合した見出しと3列のデータ
pub fn merged_cells() -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    worksheet.merge_range(0, 0, 0, 2, "Header", &Format::new())?;
    worksheet.write_string(1, 0, "Data1")?;
    worksheet.write_string(1, 1, "Data2")?;
    worksheet.write_string(1, 2, "Data3")?;

    workbook.save_to_buffer()
}

/// 行2と列Bが非表示の表
pub fn hidden_elements() -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (row, prefix) in [(0, "Header"), (1, "Visible"), (2, "Hidden"), (3, "Tail")] {
        for col in 0..3u16 {
            worksheet.write_string(row, col, format!("{}{}", prefix, col + 1))?;
        }
    }
    worksheet.set_row_hidden(2)?;
    worksheet.set_column_hidden(1)?;

    workbook.save_to_buffer()
}

/// 各列の幅が20文字の`cols`列 x `rows`行の表
pub fn wide_table(rows: u32, cols: u16) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Wide")?;

    for col in 0..cols {
        worksheet.set_column_width(col, 20)?;
        worksheet.write_string(0, col, format!("Column {}", col + 1))?;
    }
    for row in 1..rows {
        for col in 0..cols {
            worksheet.write_number(row, col, f64::from(row * 100 + u32::from(col)))?;
        }
    }
    workbook.save_to_buffer()
}

/// 1列の縦長の表（見出し付き）
pub fn long_table(rows: u32) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Long")?;

    worksheet.write_string(0, 0, "Item")?;
    worksheet.write_string(0, 1, "Amount")?;
    for row in 1..rows {
        worksheet.write_string(row, 0, format!("Item {}", row))?;
        worksheet.write_number(row, 1, f64::from(row) * 1.5)?;
    }
    workbook.save_to_buffer()
}

/// セルを1つも持たないシートだけのブック
pub fn empty_sheet() -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("EmptySheet")?;
    workbook.save_to_buffer()
}

/// 空のシートとデータのあるシート
pub fn empty_and_filled_sheets() -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    workbook.add_worksheet().set_name("Blank")?;
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Filled")?;
    worksheet.write_string(0, 0, "Content")?;
    workbook.save_to_buffer()
}

const ODS_MIMETYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";

/// 文字列と数値を持つ1シートのods
pub fn simple_ods() -> Vec<u8> {
    // 要素間に空白を入れない（calamineは行内の空白テキストを受け付けない）
    let content = concat!(
        r#"<?xml version="1.0" encoding="UTF-8"?>"#,
        r#"<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" "#,
        r#"xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" "#,
        r#"xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" office:version="1.2">"#,
        "<office:body><office:spreadsheet>",
        r#"<table:table table:name="Inventory">"#,
        "<table:table-row>",
        r#"<table:table-cell office:value-type="string"><text:p>Name</text:p></table:table-cell>"#,
        r#"<table:table-cell office:value-type="string"><text:p>Count</text:p></table:table-cell>"#,
        "</table:table-row>",
        "<table:table-row>",
        r#"<table:table-cell office:value-type="string"><text:p>Widget</text:p></table:table-cell>"#,
        r#"<table:table-cell office:value-type="float" office:value="42"><text:p>42</text:p></table:table-cell>"#,
        "</table:table-row>",
        "</table:table>",
        "</office:spreadsheet></office:body>",
        "</office:document-content>",
    );

    build_zip(&[
        ("mimetype", ODS_MIMETYPE),
        ("content.xml", content),
        (
            "META-INF/manifest.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?><manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0"/>"#,
        ),
    ])
}

/// 非圧縮エントリだけのZIPを組み立てる
pub fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// `needle`の出現回数
pub fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    count(haystack, needle) > 0
}
