//! ABD Existing（CSV）の読み込み

use crate::error::{Error, Result};
use crate::normalizer::normalize_house_number;
use crate::types::{Row, FIELD_ST_NUM};
use std::collections::{BTreeSet, HashMap};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// 読み込んだ名簿
#[derive(Debug, Clone, Default)]
pub struct Roster {
    /// ヘッダー（CSV の列順）
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Roster {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 通り名の一覧（重複除去・ソート済み）
    pub fn streets(&self) -> Vec<String> {
        streets(&self.rows)
    }
}

/// CSVバイト列を名簿として解析する
///
/// - 空行はスキップ
/// - 列数が足りない行は不足分を空文字として扱う
/// - `ST_NUM` 列がなければ `Validation`
pub fn parse_roster(data: &[u8]) -> Result<Roster> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let index = rows.len();
        let fields: HashMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();
        let mut row = Row {
            index,
            norm: String::new(),
            fields,
        };
        row.norm = normalize_house_number(row.st_num());
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(Error::Validation("CSV is empty or unreadable".into()));
    }
    if !headers.iter().any(|h| h == FIELD_ST_NUM) {
        return Err(Error::Validation(format!(
            "CSV must have a {} column (house number)",
            FIELD_ST_NUM
        )));
    }

    tracing::debug!(rows = rows.len(), columns = headers.len(), "roster parsed");
    Ok(Roster { headers, rows })
}

/// 行から通り名の一覧を作る（空は除外）
pub fn streets(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .map(|r| r.street())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
