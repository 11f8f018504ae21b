//! Parser Module
//!
//! 入力形式の判別、calamineによるセル値の読み込み、
//! XLSXのXMLメタデータ解析をまとめたWorkbook Readerです。

mod metadata;
mod sniff;
mod workbook;

pub use workbook::WorkbookReader;
