//! 入力形式の判別
//!
//! ファイル内容（マジックバイトとZIPエントリ）から形式を判定します。
//! 拡張子は内容だけでは判定できない場合の補助としてのみ使用します。

use std::io::{Cursor, Read};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::api::SourceFormat;
use crate::error::XlsxToPdfError;
use crate::security::SecurityConfig;

/// OLE複合ファイル（xls）のシグネチャ
const CFB_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// ZIPローカルファイルヘッダーのシグネチャ
const ZIP_MAGIC: [u8; 4] = [b'P', b'K', 0x03, 0x04];

const ODS_MIMETYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";

/// 入力バイト列の形式を判定する
///
/// # 引数
///
/// * `bytes` - 入力ファイル全体
/// * `name_hint` - 元ファイル名（拡張子の補助判定に使用）
/// * `security` - ZIPアーカイブに適用するセキュリティ制限
///
/// # 戻り値
///
/// * `Ok(SourceFormat)` - 判定した形式
/// * `Err(XlsxToPdfError)` - 空の入力、非対応形式、セキュリティ違反
pub(crate) fn detect_format(
    bytes: &[u8],
    name_hint: Option<&str>,
    security: &SecurityConfig,
) -> Result<SourceFormat, XlsxToPdfError> {
    if bytes.is_empty() {
        return Err(XlsxToPdfError::parse("Input is empty"));
    }

    let hinted = name_hint.and_then(extension_of).and_then(|ext| {
        let format = SourceFormat::from_extension(&ext);
        if format.is_none() {
            debug!(extension = %ext, "file extension is not a spreadsheet format");
        }
        format
    });

    let detected = if bytes.starts_with(&CFB_MAGIC) {
        SourceFormat::Xls
    } else if bytes.starts_with(&ZIP_MAGIC) {
        detect_zip_format(bytes, hinted, security)?
    } else {
        return Err(XlsxToPdfError::UnsupportedFormat(match name_hint {
            Some(name) => format!("'{}' is not an xlsx, xls or ods file", name),
            None => "input is not an xlsx, xls or ods file".to_string(),
        }));
    };

    if let Some(hinted) = hinted {
        if hinted != detected {
            warn!(
                extension = %hinted,
                detected = %detected,
                "file extension disagrees with content, using detected format"
            );
        }
    }

    Ok(detected)
}

fn detect_zip_format(
    bytes: &[u8],
    hinted: Option<SourceFormat>,
    security: &SecurityConfig,
) -> Result<SourceFormat, XlsxToPdfError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    security.check_archive(&mut archive)?;

    if archive.by_name("xl/workbook.xml").is_ok() {
        return Ok(SourceFormat::Xlsx);
    }
    if archive.by_name("xl/workbook.bin").is_ok() {
        return Err(XlsxToPdfError::UnsupportedFormat(
            "xlsb (binary workbook) is not supported".to_string(),
        ));
    }

    let mimetype = match archive.by_name("mimetype") {
        Ok(mut entry) => {
            let mut content = String::new();
            entry
                .read_to_string(&mut content)
                .map_err(|e| XlsxToPdfError::parse(format!("Unreadable mimetype entry: {}", e)))?;
            Some(content.trim().to_string())
        }
        Err(_) => None,
    };

    match mimetype.as_deref() {
        Some(ODS_MIMETYPE) => Ok(SourceFormat::Ods),
        Some(other) => Err(XlsxToPdfError::UnsupportedFormat(format!(
            "OpenDocument type '{}' is not a spreadsheet",
            other
        ))),
        // mimetypeのないODSは拡張子で補う
        None if archive.by_name("content.xml").is_ok() && hinted == Some(SourceFormat::Ods) => {
            debug!("ZIP container without mimetype, trusting .ods extension");
            Ok(SourceFormat::Ods)
        }
        None => Err(XlsxToPdfError::UnsupportedFormat(
            "ZIP archive is not a spreadsheet (no xl/workbook.xml or ODS mimetype)".to_string(),
        )),
    }
}

fn extension_of(name: &str) -> Option<String> {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
