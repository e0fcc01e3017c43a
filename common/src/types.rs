//! 照合エンジンの型定義
//!
//! - Row: ABD Existing（CSV）の1行
//! - GeoPoint: KMZ から抽出した HP（Placemark）
//! - MatchResult: 行ごとの照合結果（行と1対1、位置で対応）

use crate::kml::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 家屋番号の列名（必須）
pub const FIELD_ST_NUM: &str = "ST_NUM";
/// 通り名の列名
pub const FIELD_ST_NAME: &str = "ST_NAME";

/// ExtendedData に書き出す列（この順で出力）
pub const EXPORT_FIELDS: [&str; 7] = ["ST_NAME", "ST_NUM", "BLOCK", "FRACT", "OV_UG", "RT", "RW"];

/// CSVの1行
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Row {
    /// 名簿内の位置（0始まり）
    pub index: usize,
    /// 正規化済み家屋番号
    pub norm: String,
    /// 列名 → 値
    pub fields: HashMap<String, String>,
}

impl Row {
    /// 列の値を取得（列がなければ空文字）
    pub fn get(&self, field: &str) -> &str {
        self.fields.get(field).map(String::as_str).unwrap_or("")
    }

    pub fn st_num(&self) -> &str {
        self.get(FIELD_ST_NUM)
    }

    /// 通り名（前後空白除去済み）
    pub fn street(&self) -> &str {
        self.get(FIELD_ST_NAME).trim()
    }
}

/// 緯度経度
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// KML の coordinates 表記（`経度,緯度,0`）
    pub fn to_kml(&self) -> String {
        format!("{},{},0", self.lng, self.lat)
    }
}

/// KMZ の HP ポイント
#[derive(Debug, Clone)]
pub struct GeoPoint {
    pub name: String,
    pub norm: String,
    pub lat: f64,
    pub lng: f64,
    /// 元の Placemark ノード（ドキュメントが所有）
    pub node: NodeId,
}

impl GeoPoint {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

/// 照合ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Matched,
    Review,
    ReviewAdd,
    Missing,
    Added,
}

impl MatchStatus {
    /// 手動配置の対象か（MISSING / REVIEW_ADD）
    pub fn needs_placement(&self) -> bool {
        matches!(self, MatchStatus::Missing | MatchStatus::ReviewAdd)
    }

    /// KMZ 側に対応ポイントがあるか（MATCHED / REVIEW）
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchStatus::Matched | MatchStatus::Review)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Matched => "MATCHED",
            MatchStatus::Review => "REVIEW",
            MatchStatus::ReviewAdd => "REVIEW_ADD",
            MatchStatus::Missing => "MISSING",
            MatchStatus::Added => "ADDED",
        }
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 照合理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchReason {
    Exact,
    DuplicateKmz,
    NumericOnly,
    NotFound,
}

impl MatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchReason::Exact => "EXACT",
            MatchReason::DuplicateKmz => "DUPLICATE_KMZ",
            MatchReason::NumericOnly => "NUMERIC_ONLY",
            MatchReason::NotFound => "NOT_FOUND",
        }
    }
}

impl std::fmt::Display for MatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 1行分の照合結果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// 行番号（Row::index）
    pub row: usize,
    /// 正規化済み家屋番号
    pub key: String,
    /// 対応する GeoPoint の位置（MATCHED / REVIEW / REVIEW_ADD のみ）
    pub point: Option<usize>,
    pub status: MatchStatus,
    pub reason: MatchReason,
    /// 手動配置した座標（ADDED のみ）
    pub added: Option<Coordinate>,
}

/// 手動配置したポイント
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AddedPoint {
    pub row: usize,
    pub lat: f64,
    pub lng: f64,
}

impl AddedPoint {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}
