//! 名簿と KMZ ポイントの自動照合
//!
//! 1. 正規化キー完全一致が1件 → MATCHED / EXACT
//! 2. 完全一致が複数 → REVIEW / DUPLICATE_KMZ（先頭候補を採用）
//! 3. 先頭数字部分のみで1件 → REVIEW_ADD / NUMERIC_ONLY
//! 4. それ以外 → MISSING / NOT_FOUND

use crate::normalizer::leading_digits;
use crate::types::{GeoPoint, MatchReason, MatchResult, MatchStatus, Row};
use serde::Serialize;
use std::collections::HashMap;

/// 正規化キー → ポイント位置（抽出順）
#[derive(Debug, Clone, Default)]
pub struct PointIndex {
    by_key: HashMap<String, Vec<usize>>,
}

impl PointIndex {
    pub fn build(points: &[GeoPoint]) -> Self {
        let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, point) in points.iter().enumerate() {
            by_key.entry(point.norm.clone()).or_default().push(i);
        }
        Self { by_key }
    }

    /// キーに一致する候補（なければ空）
    pub fn candidates(&self, key: &str) -> &[usize] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// 正規化キー1つを分類する
pub fn classify(row: usize, key: &str, index: &PointIndex) -> MatchResult {
    let result = |point, status, reason| MatchResult {
        row,
        key: key.to_string(),
        point,
        status,
        reason,
        added: None,
    };

    match index.candidates(key) {
        [only] => return result(Some(*only), MatchStatus::Matched, MatchReason::Exact),
        [first, ..] => return result(Some(*first), MatchStatus::Review, MatchReason::DuplicateKmz),
        [] => {}
    }

    if let Some(number) = leading_digits(key) {
        if let [only] = index.candidates(number) {
            return result(Some(*only), MatchStatus::ReviewAdd, MatchReason::NumericOnly);
        }
    }

    result(None, MatchStatus::Missing, MatchReason::NotFound)
}

/// 全行を照合する（行と同じ順序・同じ件数）
pub fn auto_match(rows: &[Row], points: &[GeoPoint]) -> Vec<MatchResult> {
    let index = PointIndex::build(points);
    rows.iter()
        .map(|row| classify(row.index, &row.norm, &index))
        .collect()
}

/// ステータス別件数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub total: usize,
    pub matched: usize,
    pub review: usize,
    pub review_add: usize,
    pub missing: usize,
    pub added: usize,
}

impl MatchSummary {
    pub fn from_results(results: &[MatchResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Default::default()
        };
        for r in results {
            match r.status {
                MatchStatus::Matched => summary.matched += 1,
                MatchStatus::Review => summary.review += 1,
                MatchStatus::ReviewAdd => summary.review_add += 1,
                MatchStatus::Missing => summary.missing += 1,
                MatchStatus::Added => summary.added += 1,
            }
        }
        summary
    }
}

impl std::fmt::Display for MatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "CSV rows: {}", self.total)?;
        writeln!(f, "MATCHED: {}", self.matched)?;
        writeln!(f, "REVIEW: {}", self.review)?;
        writeln!(f, "REVIEW_ADD: {}", self.review_add)?;
        write!(f, "MISSING: {}", self.missing)?;
        if self.added > 0 {
            write!(f, "\nADDED: {}", self.added)?;
        }
        Ok(())
    }
}
