//! 対話式一括配置モジュール
//!
//! 通り単位のキューを順に表示し、座標入力・スキップ・取り消しを受け付ける。

use crate::error::{RebuildError, Result};
use rebuild_helper_common::{BulkOutcome, Coordinate, MatchStatus, PlaceOutcome, Session};
use dialoguer::{Confirm, Input};

/// 対話アクション
#[derive(Debug, Clone, PartialEq)]
pub enum BulkAction {
    /// 座標を配置
    Place(Coordinate),
    /// この行をスキップ
    Skip,
    /// 直前の配置を取り消す
    Undo,
    /// 終了（配置済みは残る）
    Quit,
    /// 解釈できない入力
    Invalid(String),
}

/// 入力1行をアクションに変換
///
/// 座標は `lat,lng`（空白区切りも可）。
pub fn parse_action(input: &str) -> BulkAction {
    let trimmed = input.trim();
    match trimmed {
        "" | "s" | "S" => return BulkAction::Skip,
        "u" | "U" => return BulkAction::Undo,
        "q" | "Q" => return BulkAction::Quit,
        _ => {}
    }

    let parts: Vec<&str> = trimmed
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect();
    if let [lat, lng] = parts.as_slice() {
        if let (Ok(lat), Ok(lng)) = (lat.parse::<f64>(), lng.parse::<f64>()) {
            if lat.is_finite() && lng.is_finite() {
                return BulkAction::Place(Coordinate::new(lat, lng));
            }
        }
    }
    BulkAction::Invalid(trimmed.to_string())
}

/// 配置対象の行を表示
fn print_target(session: &Session, row: usize) {
    let (pos, total) = session.bulk().progress();
    let Some(r) = session.rows().get(row) else {
        return;
    };
    let status = session
        .matches()
        .get(row)
        .map(|m| m.status)
        .unwrap_or(MatchStatus::Missing);

    println!(
        "[{}/{}] 行{} ST_NUM={} {} (RT {} / RW {}) {}",
        pos,
        total,
        row,
        r.st_num(),
        r.street(),
        r.get("RT"),
        r.get("RW"),
        status
    );
    if status == MatchStatus::ReviewAdd {
        if let Some(point) = session.matched_point(row) {
            println!("  候補: {} ({}, {})", point.name, point.lat, point.lng);
        }
    }
}

/// 一括配置ループ（入力元を差し替え可能）
///
/// このループで配置した件数（取り消し分を差し引く）を返す。
pub fn run_bulk_with<F>(session: &mut Session, street: &str, mut prompt: F) -> Result<usize>
where
    F: FnMut(&str) -> Result<String>,
{
    match session.start_bulk(street)? {
        BulkOutcome::NothingToDo { street } => {
            println!("✓ {} に配置が必要な行はありません", street);
            return Ok(0);
        }
        BulkOutcome::Started { street, total } => {
            println!("📍 {}: 配置が必要な行 {}件", street, total);
        }
    }
    println!("---");
    println!("操作: [lat,lng]配置 [s]スキップ [u]取り消し [q]終了");
    println!("---\n");

    let mut placed = 0usize;

    while let Some(row) = session.target_row().filter(|_| session.bulk().is_active()) {
        print_target(session, row);
        let input = prompt("座標 (lat,lng / s / u / q)")?;

        match parse_action(&input) {
            BulkAction::Place(coord) => match session.place(coord) {
                Ok(PlaceOutcome::BulkFinished { row }) => {
                    placed += 1;
                    println!("  → 行{} 配置 ({}, {})\n", row, coord.lat, coord.lng);
                    println!("✓ すべての行を処理しました");
                    break;
                }
                Ok(PlaceOutcome::Placed { row, .. }) => {
                    placed += 1;
                    println!("  → 行{} 配置 ({}, {})\n", row, coord.lat, coord.lng);
                }
                Err(e) => println!("  ERROR: {}\n", e),
            },
            BulkAction::Skip => {
                println!("  → スキップ\n");
                if session.skip().is_none() {
                    println!("✓ キューの最後に到達しました");
                    break;
                }
            }
            BulkAction::Undo => match session.undo() {
                Ok(row) => {
                    placed = placed.saturating_sub(1);
                    println!("  → 行{} の配置を取り消しました\n", row);
                }
                Err(e) => println!("  ERROR: {}\n", e),
            },
            BulkAction::Quit => {
                println!("一括配置を終了します...");
                session.stop_bulk();
                break;
            }
            BulkAction::Invalid(text) => {
                println!("  ERROR: 入力を解釈できません: {:?}\n", text);
            }
        }
    }

    Ok(placed)
}

/// 端末から入力して一括配置
pub fn run_interactive_bulk(session: &mut Session, street: &str) -> Result<usize> {
    run_bulk_with(session, street, |prompt| {
        Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(|e| RebuildError::CliExecution(e.to_string()))
    })
}

/// 書き出し確認
pub fn confirm_export(placed: usize) -> Result<bool> {
    Confirm::new()
        .with_prompt(format!("{}件配置しました。KMZを書き出しますか?", placed))
        .default(true)
        .interact()
        .map_err(|e| RebuildError::CliExecution(e.to_string()))
}
