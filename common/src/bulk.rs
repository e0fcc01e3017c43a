//! 通り単位の一括配置キュー
//!
//! 開始時点で MISSING / REVIEW_ADD の行を名簿順に固定し、カーソルで順に進める。
//! 途中で他の行のステータスが変わってもキューは作り直さない。

use crate::error::{Error, Result};
use crate::types::{MatchResult, Row};

#[derive(Debug, Clone, Default)]
pub struct BulkQueue {
    active: bool,
    queue: Vec<usize>,
    cursor: usize,
    street: String,
}

impl BulkQueue {
    /// 対象行を集めてキューを開始する
    ///
    /// 通り名が空なら `Validation`。対象がなければ `Ok(0)` を返し、状態は変えない。
    pub fn start(&mut self, street: &str, rows: &[Row], matches: &[MatchResult]) -> Result<usize> {
        let street = street.trim();
        if street.is_empty() {
            return Err(Error::Validation("select an ST_NAME before starting bulk".into()));
        }

        let queue: Vec<usize> = matches
            .iter()
            .enumerate()
            .filter(|(_, m)| m.status.needs_placement())
            .filter(|(i, _)| rows.get(*i).map(|r| r.street() == street).unwrap_or(false))
            .map(|(i, _)| i)
            .collect();

        if queue.is_empty() {
            return Ok(0);
        }

        let len = queue.len();
        self.active = true;
        self.queue = queue;
        self.cursor = 0;
        self.street = street.to_string();
        tracing::info!(street = %self.street, queue = len, "bulk started");
        Ok(len)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn street(&self) -> &str {
        &self.street
    }

    pub fn queue(&self) -> &[usize] {
        &self.queue
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// 配置待ちの行（非アクティブ・終端なら `None`）
    pub fn current_target(&self) -> Option<usize> {
        if !self.active {
            return None;
        }
        self.queue.get(self.cursor).copied()
    }

    /// カーソルを1つ進め、次の対象を返す（`None` なら終端）
    pub fn advance(&mut self) -> Option<usize> {
        if self.active && self.cursor < self.queue.len() {
            self.cursor += 1;
        }
        self.current_target()
    }

    /// 配置せずに次へ（カーソル移動は advance と同じ）
    pub fn skip(&mut self) -> Option<usize> {
        self.advance()
    }

    /// カーソルを1つ戻す（0未満にはしない）
    pub fn step_back(&mut self) -> Option<usize> {
        if self.active {
            self.cursor = self.cursor.saturating_sub(1);
        }
        self.current_target()
    }

    /// 終了（何度呼んでもよい）
    pub fn stop(&mut self) {
        self.active = false;
        self.queue.clear();
        self.cursor = 0;
        self.street.clear();
    }

    pub fn is_exhausted(&self) -> bool {
        self.active && self.cursor >= self.queue.len()
    }

    /// (現在位置, 全件数)。位置は1始まりで全件数を超えない
    pub fn progress(&self) -> (usize, usize) {
        let total = self.queue.len();
        ((self.cursor + 1).min(total), total)
    }
}

impl std::fmt::Display for BulkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.active {
            return f.write_str("off");
        }
        let (pos, total) = self.progress();
        write!(f, "{} ({}/{})", self.street, pos, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MatchReason, MatchStatus};

    fn fixture(cases: &[(&str, MatchStatus)]) -> (Vec<Row>, Vec<MatchResult>) {
        let rows = cases
            .iter()
            .enumerate()
            .map(|(i, (street, _))| {
                let mut row = Row {
                    index: i,
                    ..Default::default()
                };
                row.fields.insert("ST_NAME".into(), street.to_string());
                row
            })
            .collect();
        let matches = cases
            .iter()
            .enumerate()
            .map(|(i, (_, status))| MatchResult {
                row: i,
                key: String::new(),
                point: None,
                status: *status,
                reason: MatchReason::NotFound,
                added: None,
            })
            .collect();
        (rows, matches)
    }

    fn jalan_x_fixture() -> (Vec<Row>, Vec<MatchResult>) {
        use MatchStatus::*;
        fixture(&[
            ("Jalan X", Matched),
            ("Jalan Y", Missing),
            ("Jalan X", Missing),
            ("jalan x", Missing),
            ("Jalan X", Review),
            (" Jalan X ", ReviewAdd),
            ("Jalan X", Added),
            ("Jalan Y", ReviewAdd),
            ("", Missing),
            ("Jalan X", Missing),
        ])
    }

    #[test]
    fn test_start_builds_queue_in_roster_order() {
        let (rows, matches) = jalan_x_fixture();
        let mut bulk = BulkQueue::default();

        assert_eq!(bulk.start("Jalan X", &rows, &matches).expect("開始失敗"), 3);
        assert_eq!(bulk.queue(), &[2, 5, 9]);
        assert!(bulk.is_active());
        assert_eq!(bulk.current_target(), Some(2));
        assert_eq!(bulk.to_string(), "Jalan X (1/3)");
    }

    #[test]
    fn test_start_empty_street_is_validation_error() {
        let (rows, matches) = jalan_x_fixture();
        let mut bulk = BulkQueue::default();
        assert!(matches!(bulk.start("  ", &rows, &matches), Err(Error::Validation(_))));
        assert!(!bulk.is_active());
    }

    #[test]
    fn test_start_without_targets_keeps_state() {
        let (rows, matches) = jalan_x_fixture();
        let mut bulk = BulkQueue::default();
        bulk.start("Jalan Y", &rows, &matches).expect("開始失敗");

        assert_eq!(bulk.start("Jalan Z", &rows, &matches).expect("開始失敗"), 0);
        assert_eq!(bulk.street(), "Jalan Y");
        assert_eq!(bulk.queue(), &[1, 7]);
    }

    #[test]
    fn test_advance_until_exhausted() {
        let (rows, matches) = jalan_x_fixture();
        let mut bulk = BulkQueue::default();
        bulk.start("Jalan X", &rows, &matches).expect("開始失敗");

        assert_eq!(bulk.advance(), Some(5));
        assert_eq!(bulk.skip(), Some(9));
        assert!(!bulk.is_exhausted());
        assert_eq!(bulk.advance(), None);
        assert!(bulk.is_exhausted());
        assert_eq!(bulk.cursor(), 3);
        assert_eq!(bulk.progress(), (3, 3));

        assert_eq!(bulk.advance(), None);
        assert_eq!(bulk.cursor(), 3);
    }

    #[test]
    fn test_step_back_floors_at_zero() {
        let (rows, matches) = jalan_x_fixture();
        let mut bulk = BulkQueue::default();
        bulk.start("Jalan X", &rows, &matches).expect("開始失敗");

        bulk.advance();
        assert_eq!(bulk.step_back(), Some(2));
        assert_eq!(bulk.step_back(), Some(2));
        assert_eq!(bulk.cursor(), 0);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (rows, matches) = jalan_x_fixture();
        let mut bulk = BulkQueue::default();
        bulk.start("Jalan X", &rows, &matches).expect("開始失敗");

        bulk.stop();
        bulk.stop();
        assert!(!bulk.is_active());
        assert!(bulk.queue().is_empty());
        assert_eq!(bulk.street(), "");
        assert_eq!(bulk.current_target(), None);
        assert_eq!(bulk.to_string(), "off");
    }
}
