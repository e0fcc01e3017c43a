//! 家屋番号（ST_NUM / Placemark名）の正規化
//!
//! - 前後空白除去・大文字化
//! - 空白・`.`・`_`・ハイフン類（`-` `–` `—`）を除去
//! - 先頭の数字部分はゼロ埋めを外して再構成（`007A` → `7A`）

use regex::Regex;

lazy_static::lazy_static! {
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
    static ref LEADING_NUMBER_RE: Regex = Regex::new(r"(?s)^([0-9]+)(.*)$").unwrap();
    static ref LEADING_DIGITS_RE: Regex = Regex::new(r"^[0-9]+").unwrap();
}

/// 家屋番号を比較用キーに変換する
///
/// `None` は空文字として扱う。
pub fn normalize(raw: Option<&str>) -> String {
    normalize_house_number(raw.unwrap_or(""))
}

/// 家屋番号を比較用キーに変換する
///
/// `normalize_house_number("007A") == normalize_house_number("7-A") == "7A"`
pub fn normalize_house_number(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let cleaned: String = WHITESPACE_RE
        .replace_all(&upper, "")
        .chars()
        .filter(|c| !matches!(c, '.' | '_' | '-' | '\u{2013}' | '\u{2014}'))
        .collect();

    match LEADING_NUMBER_RE.captures(&cleaned) {
        Some(caps) => {
            let digits = caps[1].trim_start_matches('0');
            let number = if digits.is_empty() { "0" } else { digits };
            format!("{}{}", number, &caps[2])
        }
        None => cleaned,
    }
}

/// 正規化済みキーの先頭数字部分（数値のみフォールバック照合用）
pub fn leading_digits(key: &str) -> Option<&str> {
    LEADING_DIGITS_RE.find(key).map(|m| m.as_str())
}
