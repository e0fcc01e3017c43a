//! 照合結果一覧の絞り込み（表示・検索用）

use crate::types::{MatchResult, Row};
use serde::{Deserialize, Serialize};

/// 表示区分
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    /// 配置が必要な行（MISSING / REVIEW_ADD）
    #[default]
    Missing,
    /// KMZ に対応がある行（MATCHED / REVIEW）
    Matched,
    /// 指定した通りの配置が必要な行
    StreetMissing,
    /// すべて
    All,
}

impl std::str::FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "missing" => Ok(View::Missing),
            "matched" => Ok(View::Matched),
            "street-missing" | "street_missing" => Ok(View::StreetMissing),
            "all" => Ok(View::All),
            _ => Err(format!(
                "Unknown view: {}. Use missing, matched, street-missing, or all",
                s
            )),
        }
    }
}

/// 絞り込み条件
#[derive(Debug, Clone, Default)]
pub struct RowFilter {
    pub view: View,
    /// 通り名（空なら無条件）
    pub street: String,
    /// ST_NUM / ST_NAME の部分一致（大文字小文字無視）
    pub query: String,
}

impl RowFilter {
    /// 条件に合う行番号（名簿順）
    pub fn apply(&self, rows: &[Row], matches: &[MatchResult]) -> Vec<usize> {
        let street = self.street.trim();
        let query = self.query.trim().to_uppercase();

        matches
            .iter()
            .enumerate()
            .filter_map(|(i, m)| rows.get(i).map(|row| (i, row, m)))
            .filter(|(_, row, m)| match self.view {
                View::Missing => m.status.needs_placement(),
                View::Matched => m.status.is_matched(),
                View::StreetMissing => m.status.needs_placement() && row.street() == street,
                View::All => true,
            })
            .filter(|(_, row, _)| street.is_empty() || row.street() == street)
            .filter(|(_, row, _)| {
                query.is_empty()
                    || row.st_num().to_uppercase().contains(&query)
                    || row.get(crate::types::FIELD_ST_NAME).to_uppercase().contains(&query)
            })
            .map(|(i, _, _)| i)
            .collect()
    }
}
