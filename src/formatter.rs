//! Formatter Module
//!
//! セル値を描画用の文字列に変換するモジュール。
//! xlsxの表示形式コードのうち、桁数・桁区切り・パーセント・指数・日付時刻を解釈します。

use std::fmt::Write as _;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

use crate::api::DateFormat;
use crate::types::{Cell, CellValue};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// セルの表示文字列を生成するフォーマッター
#[derive(Debug, Clone)]
pub(crate) struct CellFormatter {
    date_format: DateFormat,
    is_1904: bool,
}

impl CellFormatter {
    pub fn new(date_format: DateFormat, is_1904: bool) -> Self {
        Self {
            date_format,
            is_1904,
        }
    }

    /// セルを表示文字列に変換
    pub fn format(&self, cell: &Cell) -> String {
        let code = cell
            .style
            .as_ref()
            .and_then(|s| s.number_format.as_deref());

        match &cell.value {
            CellValue::Number(n) => match code {
                Some(code) if is_date_format(code) => self.format_serial(*n, Some(code)),
                Some(code) => format_number(*n, code),
                None => format_general(*n),
            },
            CellValue::DateTime(serial) => self.format_serial(*serial, code),
            CellValue::Duration(days) => format_duration(*days),
            CellValue::String(s) => s.clone(),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Error(e) => e.clone(),
            CellValue::Empty => String::new(),
        }
    }

    /// シリアル値を日付・時刻として描画
    fn format_serial(&self, serial: f64, code: Option<&str>) -> String {
        let lower = code.map(strip_literals).unwrap_or_default();

        if lower.contains("[h") || lower.contains("[m") || lower.contains("[s") {
            return format_duration(serial);
        }

        let Some(datetime) = serial_to_datetime(serial, self.is_1904) else {
            return format_general(serial);
        };

        let has_date = lower.contains('y') || lower.contains('d');
        let has_time = lower.contains('h') || lower.contains('s');
        if !lower.is_empty() && has_time && !has_date {
            let pattern = if lower.contains('s') { "%H:%M:%S" } else { "%H:%M" };
            return datetime.format(pattern).to_string();
        }

        match &self.date_format {
            DateFormat::Custom(pattern) => format_datetime(&datetime, pattern)
                .unwrap_or_else(|| datetime.format("%Y-%m-%d %H:%M:%S").to_string()),
            DateFormat::Iso8601 if has_time || serial.fract() != 0.0 => {
                datetime.format("%Y-%m-%d %H:%M:%S").to_string()
            }
            DateFormat::Iso8601 => datetime.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Excelのシリアル値を日時に変換
///
/// - 1900年システム: 1899年12月30日起算。60は存在しない1900年2月29日で、
///   それより前の値は1日ずれるため1899年12月31日起算で補正します。
/// - 1904年システム: 1904年1月1日起算
pub(crate) fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let total_secs = (serial * SECONDS_PER_DAY).round() as i64;
    let days = total_secs.div_euclid(86_400);
    let secs = total_secs.rem_euclid(86_400) as u32;

    let epoch = if is_1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)?
    } else if days < 60 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    let date = epoch.checked_add_signed(TimeDelta::try_days(days)?)?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, 0)?;
    Some(date.and_time(time))
}

/// strftime形式で日時を書式化する
///
/// タイムゾーンを要求する項目（`%z`など）は`NaiveDateTime`では書式化できず`None`になります。
pub(crate) fn format_datetime(datetime: &NaiveDateTime, pattern: &str) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", datetime.format(pattern)).ok()?;
    Some(out)
}

/// 表示形式コードが日付・時刻を表すかどうか
pub(crate) fn is_date_format(code: &str) -> bool {
    let lower = strip_literals(code);
    if lower.contains("e+") || lower.contains("e-") {
        return false;
    }
    lower
        .chars()
        .any(|c| matches!(c, 'y' | 'd' | 'h' | 's' | 'm'))
}

/// 引用符で囲まれたリテラル、エスケープ文字、色・条件指定を除いて小文字化
fn strip_literals(code: &str) -> String {
    let section = code.split(';').next().unwrap_or(code);
    let mut out = String::with_capacity(section.len());
    let mut chars = section.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                for q in chars.by_ref() {
                    if q == '"' {
                        break;
                    }
                }
            }
            '\\' | '_' | '*' => {
                chars.next();
            }
            '[' => {
                let inner: String = chars.by_ref().take_while(|&b| b != ']').collect();
                let inner = inner.to_ascii_lowercase();
                // 経過時間の指定だけを残す
                if matches!(inner.chars().next(), Some('h' | 'm' | 's')) {
                    out.push('[');
                    out.push_str(&inner);
                    out.push(']');
                }
            }
            other => out.push(other.to_ascii_lowercase()),
        }
    }
    out
}

/// 「標準」書式での数値表示（有効桁数10桁）
pub(crate) fn format_general(value: f64) -> String {
    if !value.is_finite() {
        return "#NUM!".to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let magnitude = value.abs();
    if magnitude >= 1e11 || magnitude < 1e-9 {
        let sci = format_scientific(value, 5);
        return match sci.split_once('E') {
            Some((mantissa, exp)) => format!("{}E{}", trim_fraction(mantissa.to_string()), exp),
            None => sci,
        };
    }
    if value == value.trunc() {
        return format!("{}", value as i64);
    }
    let int_digits = magnitude.log10().floor() as i32 + 1;
    let decimals = (10 - int_digits.max(1)).clamp(0, 10) as usize;
    trim_fraction(format!("{:.*}", decimals, value))
}

/// 表示形式コードに従った数値表示
fn format_number(value: f64, code: &str) -> String {
    let section = strip_literals(code);
    if section.is_empty() || section == "general" || section == "@" {
        return format_general(value);
    }

    let percent = section.contains('%');
    let scaled = if percent { value * 100.0 } else { value };

    if let Some(e_pos) = section.find("e+").or_else(|| section.find("e-")) {
        let decimals = count_decimals(&section[..e_pos]);
        return format_scientific(scaled, decimals);
    }

    let decimals = count_decimals(&section);
    let integer_part = section.split('.').next().unwrap_or("");
    let thousands = integer_part.contains(',')
        && integer_part
            .trim_end_matches(',')
            .contains(|c| c == '#' || c == '0');

    let mut text = format!("{:.*}", decimals, scaled.abs());
    if thousands {
        text = group_thousands(&text);
    }

    let mut out = String::new();
    if scaled < 0.0 && text.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    if code.contains('$') {
        out.push('$');
    }
    out.push_str(&text);
    if percent {
        out.push('%');
    }
    out
}

/// 小数点以下の桁数（`0`, `#`, `?`のプレースホルダー数）
fn count_decimals(section: &str) -> usize {
    match section.find('.') {
        Some(pos) => section[pos + 1..]
            .chars()
            .take_while(|c| matches!(c, '0' | '#' | '?'))
            .count(),
        None => 0,
    }
}

fn group_thousands(text: &str) -> String {
    let (int_part, frac_part) = match text.find('.') {
        Some(pos) => text.split_at(pos),
        None => (text, ""),
    };
    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(text.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }
    grouped.push_str(frac_part);
    grouped
}

/// 指数表記（例: `1.23E+04`）
fn format_scientific(value: f64, decimals: usize) -> String {
    let raw = format!("{:.*E}", decimals, value);
    match raw.split_once('E') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}E{}{:02}", mantissa, sign, exp.abs())
        }
        None => raw,
    }
}

fn trim_fraction(text: String) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

/// 経過時間（日単位）を`[h]:mm:ss`で表示
fn format_duration(days: f64) -> String {
    let total = (days * SECONDS_PER_DAY).round() as i64;
    let sign = if total < 0 { "-" } else { "" };
    let total = total.abs();
    format!(
        "{}{}:{:02}:{:02}",
        sign,
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CellCoord, CellStyle};

    fn cell(value: CellValue, code: Option<&str>) -> Cell {
        let cell = Cell::new(CellCoord::new(0, 0), value);
        match code {
            Some(code) => cell.with_style(CellStyle {
                number_format: Some(code.to_string()),
                ..Default::default()
            }),
            None => cell,
        }
    }

    fn iso() -> CellFormatter {
        CellFormatter::new(DateFormat::Iso8601, false)
    }

    #[test]
    fn test_general_numbers() {
        assert_eq!(format_general(42.0), "42");
        assert_eq!(format_general(-7.0), "-7");
        assert_eq!(format_general(3.5), "3.5");
        assert_eq!(format_general(1.0 / 3.0), "0.333333333");
        assert_eq!(format_general(123456.789), "123456.789");
        assert_eq!(format_general(1.5e12), "1.5E+12");
        assert_eq!(format_general(0.0), "0");
        assert_eq!(format_general(f64::NAN), "#NUM!");
    }

    #[test]
    fn test_number_format_codes() {
        assert_eq!(format_number(1234.5, "0.00"), "1234.50");
        assert_eq!(format_number(1234567.891, "#,##0.00"), "1,234,567.89");
        assert_eq!(format_number(1234.0, "#,##0"), "1,234");
        assert_eq!(format_number(0.256, "0.0%"), "25.6%");
        assert_eq!(format_number(-12.6, "0"), "-13");
        assert_eq!(format_number(-0.001, "0.00"), "0.00");
        assert_eq!(format_number(12345.0, "0.00E+00"), "1.23E+04");
        assert_eq!(format_number(9.99, "$#,##0.00"), "$9.99");
        assert_eq!(format_number(5.0, "0 \"items\""), "5");
    }

    #[test]
    fn test_is_date_format() {
        assert!(is_date_format("yyyy-mm-dd"));
        assert!(is_date_format("mm-dd-yy"));
        assert!(is_date_format("h:mm AM/PM"));
        assert!(is_date_format("[h]:mm:ss"));
        assert!(is_date_format("[$-409]d-mmm-yy"));
        assert!(!is_date_format("#,##0.00"));
        assert!(!is_date_format("0.00E+00"));
        assert!(!is_date_format("[Red]0.00"));
        assert!(!is_date_format("0 \"days\""));
    }

    #[test]
    fn test_serial_to_datetime_1900() {
        let d = |s| serial_to_datetime(s, false).unwrap().format("%Y-%m-%d").to_string();
        assert_eq!(d(1.0), "1900-01-01");
        assert_eq!(d(59.0), "1900-02-28");
        assert_eq!(d(61.0), "1900-03-01");
        assert_eq!(d(45658.0), "2025-01-01");
        assert!(serial_to_datetime(-1.0, false).is_none());
        assert!(serial_to_datetime(1e12, false).is_none());
        assert!(serial_to_datetime(f64::MAX, false).is_none());
    }

    #[test]
    fn test_huge_serial_with_date_format_falls_back_to_number() {
        let f = iso();
        assert_eq!(
            f.format(&cell(CellValue::Number(1e12), Some("yyyy-mm-dd"))),
            "1E+12"
        );
        assert_eq!(f.format(&cell(CellValue::DateTime(1e12), None)), "1E+12");
    }

    #[test]
    fn test_serial_to_datetime_1904() {
        let dt = serial_to_datetime(0.0, true).unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "1904-01-01");
        let dt = serial_to_datetime(1.5, true).unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "1904-01-02 12:00");
    }

    #[test]
    fn test_format_dates() {
        let f = iso();
        assert_eq!(f.format(&cell(CellValue::DateTime(45658.0), None)), "2025-01-01");
        assert_eq!(
            f.format(&cell(CellValue::DateTime(45658.75), None)),
            "2025-01-01 18:00:00"
        );
        assert_eq!(
            f.format(&cell(CellValue::Number(45658.0), Some("yyyy/mm/dd"))),
            "2025-01-01"
        );
        assert_eq!(
            f.format(&cell(CellValue::DateTime(0.5), Some("h:mm"))),
            "12:00"
        );
        assert_eq!(
            f.format(&cell(CellValue::DateTime(1.25), Some("[h]:mm:ss"))),
            "30:00:00"
        );
    }

    #[test]
    fn test_format_custom_date() {
        let f = CellFormatter::new(DateFormat::Custom("%d/%m/%Y".to_string()), false);
        assert_eq!(f.format(&cell(CellValue::DateTime(45658.0), None)), "01/01/2025");
    }

    #[test]
    fn test_format_datetime_rejects_timezone_items() {
        let dt = serial_to_datetime(45658.0, false).unwrap();
        assert_eq!(format_datetime(&dt, "%Y").as_deref(), Some("2025"));
        assert!(format_datetime(&dt, "%Y %z").is_none());

        let f = CellFormatter::new(DateFormat::Custom("%Y %z".to_string()), false);
        assert_eq!(
            f.format(&cell(CellValue::DateTime(45658.0), None)),
            "2025-01-01 00:00:00"
        );
    }

    #[test]
    fn test_format_other_values() {
        let f = iso();
        assert_eq!(f.format(&cell(CellValue::Bool(true), None)), "TRUE");
        assert_eq!(f.format(&cell(CellValue::Bool(false), None)), "FALSE");
        assert_eq!(
            f.format(&cell(CellValue::Error("#N/A".to_string()), None)),
            "#N/A"
        );
        assert_eq!(
            f.format(&cell(CellValue::String("text".to_string()), Some("0.00"))),
            "text"
        );
        assert_eq!(f.format(&cell(CellValue::Duration(1.5), None)), "36:00:00");
        assert_eq!(f.format(&cell(CellValue::Empty, None)), "");
    }
}
