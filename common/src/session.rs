//! 1回分の作業状態（名簿・ポイント・照合結果・選択・一括配置）
//!
//! 読み込み → 照合 → 手動配置 / 一括配置 → 書き出し の操作をまとめる。
//! グローバル状態は持たず、すべてこの構造体の中にある。

use crate::bulk::BulkQueue;
use crate::error::{Error, Result};
use crate::filter::RowFilter;
use crate::kml::{child_folder, document_element, extract_points, find_folder_by_path, KmlDocument};
use crate::kmz::{read_kmz, write_kmz};
use crate::matcher::{auto_match, MatchSummary};
use crate::mutator::{ExportStrategy, KmlMutator, MutationInput, MutationStats, MutatorOptions};
use crate::roster::{parse_roster, Roster};
use crate::types::{AddedPoint, Coordinate, GeoPoint, MatchResult, MatchStatus, Row};
use serde::Serialize;

/// 既定の出力ファイル名
pub const DEFAULT_OUTPUT_FILE_NAME: &str = "ABD_KMZ_UPDATED.kmz";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// 照合対象ポイントのフォルダ（なければ全 Placemark）
    pub folder_path: Vec<String>,
    pub mutator: MutatorOptions,
    pub output_file_name: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        let mutator = MutatorOptions::default();
        Self {
            folder_path: mutator.point_folder_path.clone(),
            mutator,
            output_file_name: DEFAULT_OUTPUT_FILE_NAME.to_string(),
        }
    }
}

/// 読み込み結果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    pub kml_name: String,
    pub rows: usize,
    pub points: usize,
    /// フォルダパスで絞り込めたか（false なら全 Placemark が対象）
    pub scoped: bool,
    pub summary: MatchSummary,
}

/// 一括配置の開始結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOutcome {
    Started { street: String, total: usize },
    /// 対象行なし（状態は変えていない）
    NothingToDo { street: String },
}

/// 配置の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceOutcome {
    /// 配置した（一括中なら次の対象）
    Placed { row: usize, next: Option<usize> },
    /// 一括配置の最後の行を配置して終了した
    BulkFinished { row: usize },
}

/// 書き出した KMZ
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub file_name: String,
    pub kml_name: String,
    pub bytes: Vec<u8>,
    pub stats: MutationStats,
}

#[derive(Debug, Default)]
pub struct Session {
    options: SessionOptions,
    roster: Roster,
    doc: Option<KmlDocument>,
    kml_name: String,
    points: Vec<GeoPoint>,
    matches: Vec<MatchResult>,
    /// 配置順（取り消しスタック）。1行につき1件
    added: Vec<AddedPoint>,
    selected: Option<usize>,
    bulk: BulkQueue,
    mutator: KmlMutator,
}

impl Session {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            mutator: KmlMutator::new(options.mutator.clone()),
            options,
            ..Default::default()
        }
    }

    /// 名簿 CSV と KMZ を読み込んで照合する
    ///
    /// 以前の状態はすべて破棄する。失敗時は空のまま。
    pub fn load(&mut self, roster_bytes: &[u8], kmz_bytes: &[u8]) -> Result<LoadSummary> {
        self.reset();
        let roster = parse_roster(roster_bytes)?;
        let kmz = read_kmz(kmz_bytes)?;
        let doc = KmlDocument::parse(&kmz.kml_text)?;
        Ok(self.load_from_parts(roster, kmz.kml_name, doc))
    }

    /// 解析済みの名簿とドキュメントから状態を作る
    pub fn load_from_parts(
        &mut self,
        roster: Roster,
        kml_name: String,
        doc: KmlDocument,
    ) -> LoadSummary {
        self.reset();

        let scope = find_folder_by_path(&doc, &self.options.folder_path);
        if scope.is_none() {
            tracing::warn!(
                path = %self.options.folder_path.join("/"),
                "point folder not found, using every placemark"
            );
        }
        // 生成フォルダ配下の Placemark は既存ポイントに含めない
        let generated = document_element(&doc)
            .and_then(|d| child_folder(&doc, d, &self.options.mutator.generated_folder));
        let points = extract_points(&doc, scope.unwrap_or(doc.document_node()), generated);
        let matches = auto_match(&roster.rows, &points);

        self.roster = roster;
        self.kml_name = kml_name;
        self.doc = Some(doc);
        self.points = points;
        self.matches = matches;
        self.selected = self.matches.iter().position(|m| m.status.needs_placement());

        let summary = self.summary();
        tracing::info!(
            rows = summary.total,
            points = self.points.len(),
            matched = summary.matched,
            missing = summary.missing,
            "session loaded"
        );
        LoadSummary {
            kml_name: self.kml_name.clone(),
            rows: self.roster.len(),
            points: self.points.len(),
            scoped: scope.is_some(),
            summary,
        }
    }

    fn reset(&mut self) {
        self.roster = Roster::default();
        self.doc = None;
        self.kml_name.clear();
        self.points.clear();
        self.matches.clear();
        self.added.clear();
        self.selected = None;
        self.bulk.stop();
        self.mutator = KmlMutator::new(self.options.mutator.clone());
    }

    pub fn is_loaded(&self) -> bool {
        self.doc.is_some()
    }

    pub fn rows(&self) -> &[Row] {
        &self.roster.rows
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn matches(&self) -> &[MatchResult] {
        &self.matches
    }

    pub fn added(&self) -> &[AddedPoint] {
        &self.added
    }

    pub fn bulk(&self) -> &BulkQueue {
        &self.bulk
    }

    pub fn kml_name(&self) -> &str {
        &self.kml_name
    }

    pub fn summary(&self) -> MatchSummary {
        MatchSummary::from_results(&self.matches)
    }

    pub fn streets(&self) -> Vec<String> {
        self.roster.streets()
    }

    pub fn filtered(&self, filter: &RowFilter) -> Vec<usize> {
        filter.apply(&self.roster.rows, &self.matches)
    }

    /// 照合先ポイント
    pub fn matched_point(&self, row: usize) -> Option<&GeoPoint> {
        self.matches
            .get(row)
            .and_then(|m| m.point)
            .and_then(|p| self.points.get(p))
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// 行を選択する（一括キューには触れない）
    pub fn select(&mut self, row: usize) -> Result<()> {
        self.check_row(row)?;
        self.selected = Some(row);
        Ok(())
    }

    /// 次に配置する行（一括中はその対象、そうでなければ配置が必要な選択行）
    pub fn target_row(&self) -> Option<usize> {
        if self.bulk.is_active() {
            return self.bulk.current_target();
        }
        self.selected
            .filter(|&row| self.matches.get(row).map(|m| m.status.needs_placement()).unwrap_or(false))
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.matches.len() {
            return Err(Error::Validation(format!(
                "row {} is out of range (0..{})",
                row,
                self.matches.len()
            )));
        }
        Ok(())
    }

    /// 現在の対象行に配置する
    pub fn place(&mut self, coord: Coordinate) -> Result<PlaceOutcome> {
        let row = self
            .target_row()
            .ok_or_else(|| Error::Validation("no row selected for placement".into()))?;
        self.place_at(row, coord)
    }

    /// 指定行に座標を配置する
    ///
    /// 既に配置済みなら座標だけ置き換え、取り消し順は変えない。
    pub fn place_at(&mut self, row: usize, coord: Coordinate) -> Result<PlaceOutcome> {
        self.check_row(row)?;
        if !coord.lat.is_finite() || !coord.lng.is_finite() {
            return Err(Error::Validation("coordinates must be finite numbers".into()));
        }

        let result = &mut self.matches[row];
        if !matches!(
            result.status,
            MatchStatus::Missing | MatchStatus::ReviewAdd | MatchStatus::Added
        ) {
            return Err(Error::Validation(format!(
                "row {} is {} and does not need a placement",
                row, result.status
            )));
        }
        result.status = MatchStatus::Added;
        result.added = Some(coord);

        match self.added.iter_mut().find(|ap| ap.row == row) {
            Some(existing) => {
                existing.lat = coord.lat;
                existing.lng = coord.lng;
            }
            None => self.added.push(AddedPoint {
                row,
                lat: coord.lat,
                lng: coord.lng,
            }),
        }
        tracing::debug!(row, lat = coord.lat, lng = coord.lng, "point placed");

        if self.bulk.is_active() && self.bulk.current_target() == Some(row) {
            return Ok(match self.bulk.advance() {
                Some(next) => {
                    self.selected = Some(next);
                    PlaceOutcome::Placed { row, next: Some(next) }
                }
                None => {
                    tracing::info!(street = %self.bulk.street(), "bulk finished");
                    self.bulk.stop();
                    self.selected = Some(row);
                    PlaceOutcome::BulkFinished { row }
                }
            });
        }

        self.selected = Some(row);
        Ok(PlaceOutcome::Placed { row, next: None })
    }

    /// 配置済みの座標をまとめて適用する（ファイルから読んだ分など）
    pub fn apply_placements(&mut self, placements: &[AddedPoint]) -> Result<usize> {
        for p in placements {
            self.place_at(p.row, p.coordinate())?;
        }
        Ok(placements.len())
    }

    /// 最後の配置を取り消す。戻した行番号を返す
    pub fn undo(&mut self) -> Result<usize> {
        let last = self
            .added
            .pop()
            .ok_or_else(|| Error::Validation("nothing to undo".into()))?;

        if let Some(result) = self.matches.get_mut(last.row) {
            result.status = if result.point.is_some() {
                MatchStatus::ReviewAdd
            } else {
                MatchStatus::Missing
            };
            result.added = None;
        }

        if self.bulk.is_active() {
            self.selected = self.bulk.step_back().or(Some(last.row));
        } else {
            self.selected = Some(last.row);
        }
        tracing::debug!(row = last.row, "placement undone");
        Ok(last.row)
    }

    /// 通り単位の一括配置を始める
    pub fn start_bulk(&mut self, street: &str) -> Result<BulkOutcome> {
        let total = self.bulk.start(street, &self.roster.rows, &self.matches)?;
        if total == 0 {
            return Ok(BulkOutcome::NothingToDo {
                street: street.trim().to_string(),
            });
        }
        self.selected = self.bulk.current_target();
        Ok(BulkOutcome::Started {
            street: self.bulk.street().to_string(),
            total,
        })
    }

    /// 配置せずに次の行へ。終端なら一括配置を終える
    pub fn skip(&mut self) -> Option<usize> {
        if !self.bulk.is_active() {
            return None;
        }
        match self.bulk.skip() {
            Some(next) => {
                self.selected = Some(next);
                Some(next)
            }
            None => {
                self.bulk.stop();
                None
            }
        }
    }

    pub fn stop_bulk(&mut self) {
        self.bulk.stop();
    }

    /// ドキュメントを書き換えて KMZ を作る
    pub fn export(&mut self, strategy: ExportStrategy) -> Result<ExportArtifact> {
        let Some(doc) = self.doc.as_mut() else {
            return Err(Error::Validation("load CSV and KMZ before exporting".into()));
        };

        let input = MutationInput {
            rows: &self.roster.rows,
            points: &self.points,
            matches: &self.matches,
            added: &self.added,
        };
        let stats = self.mutator.apply(doc, strategy, input)?;
        let xml = doc.to_xml()?;
        let bytes = write_kmz(&self.kml_name, &xml)?;

        Ok(ExportArtifact {
            file_name: self.options.output_file_name.clone(),
            kml_name: self.kml_name.clone(),
            bytes,
            stats,
        })
    }
}
