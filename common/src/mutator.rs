//! KML への書き戻し
//!
//! 元の Placemark / フォルダ構造を壊さず、追加または限定的な更新だけを行う。
//!
//! ## エクスポート方式
//! - AppendOnly（既定）: `REBUILD_HELPER/MATCHED` と `REBUILD_HELPER/ADDED` に
//!   生成 Placemark を置く。毎回中身を入れ替えるので何度出力しても同じ結果になる。
//! - Enrich: 照合済みポイントの ExtendedData に名簿の列を書き込み、手動配置分は
//!   HP/HOME フォルダに追加する。

use crate::error::{Error, Result};
use crate::kml::{document_element, ensure_folder_path, find_folder_by_path, KmlDocument, NodeId};
use crate::types::{
    AddedPoint, Coordinate, GeoPoint, MatchResult, MatchStatus, Row, EXPORT_FIELDS,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 照合済み行の出所
pub const SOURCE_EXISTING: &str = "ABD_EXISTING";
/// 手動配置した行の出所
pub const SOURCE_ADDED: &str = "ADDED_BY_TOOL";

const MATCHED_FOLDER: &str = "MATCHED";
const ADDED_FOLDER: &str = "ADDED";

/// Document 直下でこれより前にスタイルを置く要素
const FEATURE_ELEMENTS: [&str; 7] = [
    "Folder",
    "Placemark",
    "Document",
    "NetworkLink",
    "GroundOverlay",
    "ScreenOverlay",
    "PhotoOverlay",
];

/// エクスポート方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStrategy {
    /// 生成フォルダのみ追加（元データは変更しない）
    #[default]
    Append,
    /// 既存ポイントへ属性を書き込む
    Enrich,
}

impl std::str::FromStr for ExportStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "append" | "append-only" | "tag" => Ok(ExportStrategy::Append),
            "enrich" | "in-place" | "inplace" => Ok(ExportStrategy::Enrich),
            _ => Err(format!("Unknown strategy: {}. Use append or enrich", s)),
        }
    }
}

impl std::fmt::Display for ExportStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportStrategy::Append => write!(f, "append"),
            ExportStrategy::Enrich => write!(f, "enrich"),
        }
    }
}

/// 書き戻しの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutatorOptions {
    /// 生成フォルダ名（AppendOnly）
    pub generated_folder: String,
    /// タグ用スタイルの id
    pub tag_style_id: String,
    /// 手動配置分の追加先（Enrich）
    pub point_folder_path: Vec<String>,
}

impl Default for MutatorOptions {
    fn default() -> Self {
        Self {
            generated_folder: "REBUILD_HELPER".into(),
            tag_style_id: "rebuild-helper-tag".into(),
            point_folder_path: vec!["HP".into(), "HOME".into()],
        }
    }
}

/// 書き戻しの入力（セッションの現在状態）
#[derive(Debug, Clone, Copy)]
pub struct MutationInput<'a> {
    pub rows: &'a [Row],
    pub points: &'a [GeoPoint],
    pub matches: &'a [MatchResult],
    pub added: &'a [AddedPoint],
}

/// 書き戻し件数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationStats {
    /// MATCHED フォルダに置いたタグ
    pub tagged: usize,
    /// ExtendedData を更新した既存ポイント
    pub enriched: usize,
    /// 手動配置から作った Placemark
    pub added: usize,
}

/// ドキュメントへの書き戻し
///
/// Enrich で追加した Placemark を覚えておき、次回の出力前に取り除く。
#[derive(Debug, Clone, Default)]
pub struct KmlMutator {
    options: MutatorOptions,
    generated: Vec<NodeId>,
}

impl KmlMutator {
    pub fn new(options: MutatorOptions) -> Self {
        Self {
            options,
            generated: Vec::new(),
        }
    }

    pub fn apply(
        &mut self,
        doc: &mut KmlDocument,
        strategy: ExportStrategy,
        input: MutationInput<'_>,
    ) -> Result<MutationStats> {
        let document = document_element(doc).ok_or_else(|| {
            Error::Structural("KML has no <Document> to attach folders to".into())
        })?;

        let stats = match strategy {
            ExportStrategy::Append => self.append_only(doc, document, input),
            ExportStrategy::Enrich => self.enrich(doc, document, input),
        };
        tracing::info!(
            strategy = %strategy,
            tagged = stats.tagged,
            enriched = stats.enriched,
            added = stats.added,
            "kml updated"
        );
        Ok(stats)
    }

    fn append_only(
        &self,
        doc: &mut KmlDocument,
        document: NodeId,
        input: MutationInput<'_>,
    ) -> MutationStats {
        let style_id = self.options.tag_style_id.clone();
        ensure_tag_style(doc, document, &style_id);

        let generated = self.options.generated_folder.as_str();
        let matched_folder = ensure_folder_path(doc, document, &[generated, MATCHED_FOLDER]);
        let added_folder = ensure_folder_path(doc, document, &[generated, ADDED_FOLDER]);
        clear_placemarks(doc, matched_folder);
        clear_placemarks(doc, added_folder);

        let mut stats = MutationStats::default();
        for m in input.matches.iter().filter(|m| m.status == MatchStatus::Matched) {
            let (Some(row), Some(point)) = (
                input.rows.get(m.row),
                m.point.and_then(|p| input.points.get(p)),
            ) else {
                continue;
            };
            let placemark = build_placemark(
                doc,
                row,
                SOURCE_EXISTING,
                point.coordinate(),
                Some(&style_id),
            );
            doc.append_child(matched_folder, placemark);
            stats.tagged += 1;
        }

        for (row, coord) in added_rows(input) {
            let placemark = build_placemark(doc, row, SOURCE_ADDED, coord, None);
            doc.append_child(added_folder, placemark);
            stats.added += 1;
        }
        stats
    }

    fn enrich(
        &mut self,
        doc: &mut KmlDocument,
        document: NodeId,
        input: MutationInput<'_>,
    ) -> MutationStats {
        let mut stats = MutationStats::default();

        for m in input.matches.iter().filter(|m| {
            matches!(
                m.status,
                MatchStatus::Matched | MatchStatus::Review | MatchStatus::ReviewAdd
            )
        }) {
            let (Some(row), Some(point)) = (
                input.rows.get(m.row),
                m.point.and_then(|p| input.points.get(p)),
            ) else {
                continue;
            };
            upsert_row_data(doc, point.node, row, SOURCE_EXISTING);
            stats.enriched += 1;
        }

        for id in self.generated.drain(..) {
            doc.detach(id);
        }

        let path = &self.options.point_folder_path;
        let home = match find_folder_by_path(doc, path) {
            Some(folder) => folder,
            None => ensure_folder_path(doc, document, path),
        };

        for (row, coord) in added_rows(input) {
            let placemark = build_placemark(doc, row, SOURCE_ADDED, coord, None);
            doc.append_child(home, placemark);
            self.generated.push(placemark);
            stats.added += 1;
        }
        stats
    }
}

/// 手動配置済みの行（配置順・行ごとに1件）
fn added_rows<'a>(input: MutationInput<'a>) -> Vec<(&'a Row, Coordinate)> {
    let mut seen = HashSet::new();
    input
        .added
        .iter()
        .filter(|ap| seen.insert(ap.row))
        .filter(|ap| {
            input
                .matches
                .get(ap.row)
                .map(|m| m.status == MatchStatus::Added)
                .unwrap_or(false)
        })
        .filter_map(|ap| input.rows.get(ap.row).map(|row| (row, ap.coordinate())))
        .collect()
}

/// タグ用スタイルがなければ作る（id で判定）
fn ensure_tag_style(doc: &mut KmlDocument, document: NodeId, style_id: &str) {
    if doc.find_by_id(style_id).is_some() {
        return;
    }

    let style = doc.create_element("Style");
    doc.set_attribute(style, "id", style_id);

    let icon_style = doc.create_element("IconStyle");
    let color = doc.create_text_element("color", "ff00ffff");
    let scale = doc.create_text_element("scale", "1.1");
    doc.append_child(icon_style, color);
    doc.append_child(icon_style, scale);
    doc.append_child(style, icon_style);

    let label_style = doc.create_element("LabelStyle");
    let label_scale = doc.create_text_element("scale", "0.8");
    doc.append_child(label_style, label_scale);
    doc.append_child(style, label_style);

    let position = doc
        .children(document)
        .iter()
        .position(|&c| FEATURE_ELEMENTS.iter().any(|f| doc.is_element(c, f)))
        .unwrap_or(doc.children(document).len());
    doc.insert_child(document, position, style);
    tracing::debug!(style_id, "tag style created");
}

/// フォルダ直下の Placemark をすべて外す
fn clear_placemarks(doc: &mut KmlDocument, folder: NodeId) {
    let old: Vec<NodeId> = doc.child_elements(folder, "Placemark").collect();
    for id in old {
        doc.detach(id);
    }
}

/// 名簿1行から Placemark を作る（親なし）
fn build_placemark(
    doc: &mut KmlDocument,
    row: &Row,
    source: &str,
    coord: Coordinate,
    style_id: Option<&str>,
) -> NodeId {
    let placemark = doc.create_element("Placemark");

    let name = doc.create_text_element("name", row.st_num().trim());
    doc.append_child(placemark, name);

    if let Some(style_id) = style_id {
        let style_url = doc.create_text_element("styleUrl", &format!("#{}", style_id));
        doc.append_child(placemark, style_url);
    }

    let extended = doc.create_element("ExtendedData");
    doc.append_child(placemark, extended);
    write_row_fields(doc, extended, row, source);

    let point = doc.create_element("Point");
    let coordinates = doc.create_text_element("coordinates", &coord.to_kml());
    doc.append_child(point, coordinates);
    doc.append_child(placemark, point);

    placemark
}

/// 既存 Placemark の ExtendedData に行の値を書き込む（なければ作る）
pub fn upsert_row_data(doc: &mut KmlDocument, placemark: NodeId, row: &Row, source: &str) {
    let extended = match doc.first_child_element(placemark, "ExtendedData") {
        Some(existing) => existing,
        None => {
            let created = doc.create_element("ExtendedData");
            doc.append_child(placemark, created);
            created
        }
    };
    write_row_fields(doc, extended, row, source);
}

fn write_row_fields(doc: &mut KmlDocument, extended: NodeId, row: &Row, source: &str) {
    for field in EXPORT_FIELDS {
        let value = row.get(field);
        if value.trim().is_empty() {
            continue;
        }
        upsert_data(doc, extended, field, value);
    }
    upsert_data(doc, extended, "SOURCE", source);
}

/// `<Data name=..><value>..</value></Data>` を追加または上書きする
///
/// name は大文字小文字を無視して比較する。
pub fn upsert_data(doc: &mut KmlDocument, extended: NodeId, name: &str, value: &str) {
    let wanted = name.to_uppercase();
    let existing = doc.descendants(extended, "Data").into_iter().find(|&d| {
        doc.attribute(d, "name")
            .map(|n| n.to_uppercase() == wanted)
            .unwrap_or(false)
    });

    match existing {
        Some(data) => {
            let value_node = match doc.first_child_element(data, "value") {
                Some(v) => v,
                None => {
                    let created = doc.create_element("value");
                    doc.append_child(data, created);
                    created
                }
            };
            doc.set_text(value_node, value);
        }
        None => {
            let data = doc.create_element("Data");
            doc.set_attribute(data, "name", name);
            let value_node = doc.create_text_element("value", value);
            doc.append_child(data, value_node);
            doc.append_child(extended, data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kml::{extract_points, find_folder_by_path};
    use crate::types::MatchReason;

    const KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
<Document>
  <name>ABD</name>
  <Folder><name>HP</name><Folder><name>HOME</name>
    <Placemark><name>1</name><ExtendedData><Data name="st_name"><value>old</value></Data></ExtendedData><Point><coordinates>112.1,-7.1,0</coordinates></Point></Placemark>
    <Placemark><name>2</name><Point><coordinates>112.2,-7.2,0</coordinates></Point></Placemark>
  </Folder></Folder>
</Document>
</kml>"#;

    fn row(index: usize, st_num: &str, st_name: &str) -> Row {
        let mut row = Row {
            index,
            ..Default::default()
        };
        row.fields.insert("ST_NUM".into(), st_num.into());
        row.fields.insert("ST_NAME".into(), st_name.into());
        row.fields.insert("RT".into(), "01".into());
        row.fields.insert("BLOCK".into(), "  ".into());
        row
    }

    fn result(row: usize, point: Option<usize>, status: MatchStatus) -> MatchResult {
        MatchResult {
            row,
            key: String::new(),
            point,
            status,
            reason: MatchReason::Exact,
            added: None,
        }
    }

    struct Fixture {
        doc: KmlDocument,
        rows: Vec<Row>,
        points: Vec<GeoPoint>,
        matches: Vec<MatchResult>,
        added: Vec<AddedPoint>,
    }

    impl Fixture {
        fn new() -> Self {
            let doc = KmlDocument::parse(KML).expect("解析失敗");
            let root = doc.root_element().expect("ルートなし");
            let points = extract_points(&doc, root, None);
            let rows = vec![row(0, "1", "Jalan A"), row(1, "2", "Jalan A"), row(2, "3", "Jalan B")];
            let mut matches = vec![
                result(0, Some(0), MatchStatus::Matched),
                result(1, Some(1), MatchStatus::Review),
                result(2, None, MatchStatus::Added),
            ];
            matches[2].added = Some(Coordinate::new(-7.3, 112.3));
            let added = vec![AddedPoint { row: 2, lat: -7.3, lng: 112.3 }];
            Self { doc, rows, points, matches, added }
        }

        fn input(&self) -> MutationInput<'_> {
            MutationInput {
                rows: &self.rows,
                points: &self.points,
                matches: &self.matches,
                added: &self.added,
            }
        }

        fn apply(&mut self, mutator: &mut KmlMutator, strategy: ExportStrategy) -> MutationStats {
            let input = MutationInput {
                rows: &self.rows,
                points: &self.points,
                matches: &self.matches,
                added: &self.added,
            };
            mutator.apply(&mut self.doc, strategy, input).expect("書き戻し失敗")
        }
    }

    #[test]
    fn test_append_only_is_idempotent() {
        let mut fx = Fixture::new();
        let original = fx.doc.to_xml().expect("出力失敗");
        let mut mutator = KmlMutator::default();

        let stats = fx.apply(&mut mutator, ExportStrategy::Append);
        assert_eq!(stats, MutationStats { tagged: 1, enriched: 0, added: 1 });
        let first = fx.doc.to_xml().expect("出力失敗");

        fx.apply(&mut mutator, ExportStrategy::Append);
        let second = fx.doc.to_xml().expect("出力失敗");
        assert_eq!(first, second);

        let matched = find_folder_by_path(&fx.doc, &["REBUILD_HELPER", "MATCHED"]).expect("フォルダなし");
        assert_eq!(fx.doc.child_elements(matched, "Placemark").count(), 1);
        assert_eq!(fx.doc.descendants(fx.doc.document_node(), "Style").len(), 1);

        // 元の HP/HOME は変更しない
        let home_start = original.find("<Folder><name>HP</name>").expect("HPなし");
        let home_end = original.find("</Document>").expect("Document終端なし");
        assert!(second.contains(&original[home_start..home_end]));
        assert!(second.contains("<Data name=\"st_name\"><value>old</value></Data>"));
    }

    #[test]
    fn test_append_only_placemark_content() {
        let mut fx = Fixture::new();
        let mut mutator = KmlMutator::default();
        fx.apply(&mut mutator, ExportStrategy::Append);
        let xml = fx.doc.to_xml().expect("出力失敗");

        assert!(xml.contains(
            "<Placemark><name>1</name><styleUrl>#rebuild-helper-tag</styleUrl><ExtendedData>\
             <Data name=\"ST_NAME\"><value>Jalan A</value></Data>\
             <Data name=\"ST_NUM\"><value>1</value></Data>\
             <Data name=\"RT\"><value>01</value></Data>\
             <Data name=\"SOURCE\"><value>ABD_EXISTING</value></Data>\
             </ExtendedData><Point><coordinates>112.1,-7.1,0</coordinates></Point></Placemark>"
        ));
        assert!(xml.contains("<Data name=\"SOURCE\"><value>ADDED_BY_TOOL</value></Data>"));
        assert!(xml.contains("<coordinates>112.3,-7.3,0</coordinates>"));
        assert!(!xml.contains("BLOCK"));
        assert!(xml.find("<Style id=\"rebuild-helper-tag\">").unwrap() < xml.find("<Folder>").unwrap());
    }

    #[test]
    fn test_append_only_replaces_after_state_change() {
        let mut fx = Fixture::new();
        let mut mutator = KmlMutator::default();
        fx.apply(&mut mutator, ExportStrategy::Append);

        fx.matches[0].status = MatchStatus::Review;
        let stats = fx.apply(&mut mutator, ExportStrategy::Append);
        assert_eq!(stats.tagged, 0);
        let matched = find_folder_by_path(&fx.doc, &["REBUILD_HELPER", "MATCHED"]).expect("フォルダなし");
        assert_eq!(fx.doc.child_elements(matched, "Placemark").count(), 0);
    }

    #[test]
    fn test_enrich_upserts_existing_points() {
        let mut fx = Fixture::new();
        let mut mutator = KmlMutator::default();
        let stats = fx.apply(&mut mutator, ExportStrategy::Enrich);
        assert_eq!(stats, MutationStats { tagged: 0, enriched: 2, added: 1 });

        let xml = fx.doc.to_xml().expect("出力失敗");
        // 既存 Data は名前を保ったまま値だけ上書き
        assert!(xml.contains("<Data name=\"st_name\"><value>Jalan A</value></Data>"));
        assert!(xml.contains(
            "<Placemark><name>2</name><Point><coordinates>112.2,-7.2,0</coordinates></Point>\
             <ExtendedData><Data name=\"ST_NAME\">"
        ));

        let home = find_folder_by_path(&fx.doc, &["HP", "HOME"]).expect("フォルダなし");
        assert_eq!(fx.doc.child_elements(home, "Placemark").count(), 3);
        assert!(!xml.contains("REBUILD_HELPER"));
    }

    #[test]
    fn test_enrich_twice_does_not_duplicate_added() {
        let mut fx = Fixture::new();
        let mut mutator = KmlMutator::default();
        fx.apply(&mut mutator, ExportStrategy::Enrich);
        let first = fx.doc.to_xml().expect("出力失敗");
        fx.apply(&mut mutator, ExportStrategy::Enrich);
        assert_eq!(first, fx.doc.to_xml().expect("出力失敗"));
    }

    #[test]
    fn test_enrich_creates_missing_folder_path() {
        let mut doc = KmlDocument::parse("<kml><Document><name>x</name></Document></kml>")
            .expect("解析失敗");
        let rows = vec![row(0, "9", "Jalan C")];
        let mut matches = vec![result(0, None, MatchStatus::Added)];
        matches[0].added = Some(Coordinate::new(1.0, 2.0));
        let added = vec![AddedPoint { row: 0, lat: 1.0, lng: 2.0 }];
        let input = MutationInput { rows: &rows, points: &[], matches: &matches, added: &added };

        let mut mutator = KmlMutator::default();
        mutator.apply(&mut doc, ExportStrategy::Enrich, input).expect("書き戻し失敗");
        let home = find_folder_by_path(&doc, &["HP", "HOME"]).expect("フォルダなし");
        assert_eq!(doc.child_elements(home, "Placemark").count(), 1);
    }

    #[test]
    fn test_missing_document_is_structural_error() {
        let fx = Fixture::new();
        let mut doc = KmlDocument::parse("<kml><Folder/></kml>").expect("解析失敗");
        let mut mutator = KmlMutator::default();
        let err = mutator.apply(&mut doc, ExportStrategy::Append, fx.input()).unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
    }

    #[test]
    fn test_existing_style_is_reused() {
        let kml = r#"<kml><Document><Style id="rebuild-helper-tag"><IconStyle/></Style></Document></kml>"#;
        let mut doc = KmlDocument::parse(kml).expect("解析失敗");
        let input = MutationInput { rows: &[], points: &[], matches: &[], added: &[] };
        KmlMutator::default()
            .apply(&mut doc, ExportStrategy::Append, input)
            .expect("書き戻し失敗");
        assert_eq!(doc.descendants(doc.document_node(), "Style").len(), 1);
    }

    #[test]
    fn test_upsert_data_creates_missing_value() {
        let mut doc = KmlDocument::parse(r#"<kml><ExtendedData><Data name="RT"/></ExtendedData></kml>"#)
            .expect("解析失敗");
        let root = doc.root_element().expect("ルートなし");
        let extended = doc.first_child_element(root, "ExtendedData").expect("ExtendedDataなし");
        upsert_data(&mut doc, extended, "rt", "05");
        assert_eq!(
            doc.to_xml().expect("出力失敗"),
            r#"<kml><ExtendedData><Data name="RT"><value>05</value></Data></ExtendedData></kml>"#
        );
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("append".parse::<ExportStrategy>(), Ok(ExportStrategy::Append));
        assert_eq!("ENRICH".parse::<ExportStrategy>(), Ok(ExportStrategy::Enrich));
        assert!("merge".parse::<ExportStrategy>().is_err());
    }
}
