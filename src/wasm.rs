//! WebAssemblyバインディング
//!
//! ブラウザからバイト列を渡して同期的にPDFを得るための薄い入口です。
//! 進捗と取り消しが必要な場合はホスト側でワーカーに載せてください。

use wasm_bindgen::prelude::*;

use crate::api::ConversionSettings;
use crate::builder::{ConverterBuilder, SourceFile};

/// スプレッドシートのバイト列をPDFに変換する
///
/// `settings_json`は`ConversionSettings`のJSON表現（省略時はデフォルト）。
#[wasm_bindgen(js_name = convertToPdf)]
pub fn convert_to_pdf(
    bytes: &[u8],
    file_name: Option<String>,
    settings_json: Option<String>,
) -> Result<Vec<u8>, JsValue> {
    let settings = match settings_json {
        Some(json) => ConversionSettings::from_json(&json).map_err(to_js)?,
        None => ConversionSettings::default(),
    };
    let converter = ConverterBuilder::new()
        .with_settings(settings)
        .build()
        .map_err(to_js)?;

    let mut source = SourceFile::new(bytes.to_vec());
    if let Some(name) = file_name {
        source = source.with_name(name);
    }
    converter
        .convert_source(&source, &settings)
        .map(|output| output.pdf)
        .map_err(to_js)
}

fn to_js(err: crate::error::XlsxToPdfError) -> JsValue {
    JsValue::from_str(&format!("{}: {}", err.kind(), err))
}
