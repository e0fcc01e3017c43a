//! Placemark から HP ポイントを抽出

use super::document::{KmlDocument, NodeId};
use crate::normalizer::normalize_house_number;
use crate::types::GeoPoint;

/// `scope` 配下の Placemark をポイントとして抽出する
///
/// 座標がない・解析できない Placemark はスキップする（全体は中断しない）。
/// `exclude` 配下（ツールが生成したフォルダ）は対象外。
pub fn extract_points(doc: &KmlDocument, scope: NodeId, exclude: Option<NodeId>) -> Vec<GeoPoint> {
    let mut points = Vec::new();
    let mut skipped = 0usize;

    for placemark in doc.descendants(scope, "Placemark") {
        if exclude.is_some_and(|ex| doc.is_within(placemark, ex)) {
            continue;
        }
        match point_from_placemark(doc, placemark) {
            Some(point) => points.push(point),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, "placemarks without usable coordinates skipped");
    }
    points
}

fn point_from_placemark(doc: &KmlDocument, placemark: NodeId) -> Option<GeoPoint> {
    let name = doc
        .first_child_element(placemark, "name")
        .map(|n| doc.text(n).trim().to_string())
        .unwrap_or_default();

    let point = doc.first_descendant(placemark, "Point")?;
    let coords = doc.first_descendant(point, "coordinates")?;
    let (lng, lat) = parse_coordinates(&doc.text(coords))?;

    Some(GeoPoint {
        norm: normalize_house_number(&name),
        name,
        lat,
        lng,
        node: placemark,
    })
}

/// `経度,緯度[,高度]` を (経度, 緯度) に変換する
pub fn parse_coordinates(text: &str) -> Option<(f64, f64)> {
    let mut parts = text.trim().split(',').map(str::trim);
    let lng: f64 = parts.next()?.parse().ok()?;
    let lat: f64 = parts.next()?.parse().ok()?;
    if !lng.is_finite() || !lat.is_finite() {
        return None;
    }
    Some((lng, lat))
}
