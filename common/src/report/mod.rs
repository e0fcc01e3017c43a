//! 照合結果レポート（CLI の process コマンドで使用）
//!
//! 行ごとの照合結果を平坦な表にする。Excel は `excel` feature 有効時のみ。

#[cfg(feature = "excel")]
pub mod excel_core;

use crate::matcher::MatchSummary;
use crate::session::Session;
use crate::types::FIELD_ST_NAME;
use serde::Serialize;

/// レポート1行
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    /// 名簿の行番号（0始まり）
    pub row: usize,
    pub st_num: String,
    pub st_name: String,
    pub rt: String,
    pub rw: String,
    pub key: String,
    pub status: String,
    pub reason: String,
    /// 照合先ポイント名
    pub point_name: String,
    /// 照合先または手動配置の座標
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// レポート全体（JSON 出力用）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReport {
    pub generated_at: String,
    pub kml_name: String,
    pub summary: MatchSummary,
    pub rows: Vec<ReportRow>,
}

/// セッションの現在状態から表を作る
pub fn build_report_rows(session: &Session) -> Vec<ReportRow> {
    session
        .matches()
        .iter()
        .filter_map(|m| session.rows().get(m.row).map(|row| (m, row)))
        .map(|(m, row)| {
            let point = session.matched_point(m.row);
            let coord = m.added.or_else(|| point.map(|p| p.coordinate()));
            ReportRow {
                row: m.row,
                st_num: row.st_num().to_string(),
                st_name: row.get(FIELD_ST_NAME).to_string(),
                rt: row.get("RT").to_string(),
                rw: row.get("RW").to_string(),
                key: m.key.clone(),
                status: m.status.to_string(),
                reason: m.reason.to_string(),
                point_name: point.map(|p| p.name.clone()).unwrap_or_default(),
                lat: coord.map(|c| c.lat),
                lng: coord.map(|c| c.lng),
            }
        })
        .collect()
}

impl MatchReport {
    pub fn new(session: &Session, generated_at: impl Into<String>) -> Self {
        Self {
            generated_at: generated_at.into(),
            kml_name: session.kml_name().to_string(),
            summary: session.summary(),
            rows: build_report_rows(session),
        }
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
