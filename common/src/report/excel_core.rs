//! 照合結果の Excel 生成
//!
//! シート1: 行ごとの照合結果 / シート2: ステータス別件数

use super::ReportRow;
use crate::matcher::MatchSummary;
use rust_xlsxwriter::*;

const HEADERS: [(&str, f64); 11] = [
    ("ROW", 6.0),
    ("ST_NUM", 10.0),
    ("ST_NAME", 28.0),
    ("RT", 6.0),
    ("RW", 6.0),
    ("KEY", 10.0),
    ("STATUS", 12.0),
    ("REASON", 14.0),
    ("POINT", 10.0),
    ("LAT", 12.0),
    ("LNG", 12.0),
];

/// ステータスごとの背景色
fn status_color(status: &str) -> Color {
    match status {
        "MATCHED" => Color::RGB(0xE2EFDA),
        "REVIEW" | "REVIEW_ADD" => Color::RGB(0xFFF2CC),
        "ADDED" => Color::RGB(0xDDEBF7),
        _ => Color::RGB(0xFCE4D6),
    }
}

/// Excel をバッファに生成
pub fn generate_report_buffer(rows: &[ReportRow], summary: &MatchSummary) -> Result<Vec<u8>, String> {
    let mut workbook = Workbook::new();

    let header_format = Format::new()
        .set_bold()
        .set_font_size(10.0)
        .set_background_color(Color::RGB(0xF5F5F5))
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin)
        .set_border_color(Color::RGB(0xAAAAAA));

    let cell_format = Format::new()
        .set_border(FormatBorder::Hair)
        .set_border_color(Color::RGB(0xCCCCCC));

    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name("Results")
        .map_err(|e| format!("シート名設定エラー: {}", e))?;

    for (col, (label, width)) in HEADERS.iter().enumerate() {
        let col = col as u16;
        worksheet
            .set_column_width(col, *width)
            .map_err(|e| format!("列幅設定エラー: {}", e))?;
        worksheet
            .write_string_with_format(0, col, *label, &header_format)
            .map_err(|e| format!("見出し書き込みエラー: {}", e))?;
    }
    worksheet
        .set_freeze_panes(1, 0)
        .map_err(|e| format!("ウィンドウ枠固定エラー: {}", e))?;

    for (i, r) in rows.iter().enumerate() {
        let line = i as u32 + 1;
        let texts = [
            r.st_num.as_str(),
            r.st_name.as_str(),
            r.rt.as_str(),
            r.rw.as_str(),
            r.key.as_str(),
            r.status.as_str(),
            r.reason.as_str(),
            r.point_name.as_str(),
        ];

        worksheet
            .write_number_with_format(line, 0, r.row as f64, &cell_format)
            .map_err(|e| format!("値書き込みエラー: {}", e))?;
        for (offset, text) in texts.iter().enumerate() {
            let col = offset as u16 + 1;
            let format = if col == 6 {
                cell_format.clone().set_background_color(status_color(text))
            } else {
                cell_format.clone()
            };
            worksheet
                .write_string_with_format(line, col, *text, &format)
                .map_err(|e| format!("値書き込みエラー: {}", e))?;
        }
        for (col, value) in [(9u16, r.lat), (10u16, r.lng)] {
            if let Some(v) = value {
                worksheet
                    .write_number_with_format(line, col, v, &cell_format)
                    .map_err(|e| format!("座標書き込みエラー: {}", e))?;
            }
        }
    }

    let sheet = workbook.add_worksheet();
    sheet
        .set_name("Summary")
        .map_err(|e| format!("シート名設定エラー: {}", e))?;
    sheet
        .set_column_width(0, 14.0)
        .map_err(|e| format!("列幅設定エラー: {}", e))?;

    let counts = [
        ("CSV rows", summary.total),
        ("MATCHED", summary.matched),
        ("REVIEW", summary.review),
        ("REVIEW_ADD", summary.review_add),
        ("MISSING", summary.missing),
        ("ADDED", summary.added),
    ];
    for (i, (label, count)) in counts.iter().enumerate() {
        let line = i as u32;
        sheet
            .write_string_with_format(line, 0, *label, &header_format)
            .map_err(|e| format!("集計書き込みエラー: {}", e))?;
        sheet
            .write_number_with_format(line, 1, *count as f64, &cell_format)
            .map_err(|e| format!("集計書き込みエラー: {}", e))?;
    }

    workbook
        .save_to_buffer()
        .map_err(|e| format!("Excel保存エラー: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_report_buffer() {
        let rows = vec![ReportRow {
            row: 0,
            st_num: "1".into(),
            st_name: "Jalan X".into(),
            rt: "01".into(),
            rw: "02".into(),
            key: "1".into(),
            status: "MATCHED".into(),
            reason: "EXACT".into(),
            point_name: "1".into(),
            lat: Some(-7.1),
            lng: Some(112.1),
        }];
        let summary = MatchSummary {
            total: 1,
            matched: 1,
            ..Default::default()
        };

        let buffer = generate_report_buffer(&rows, &summary).expect("Excel生成失敗");
        // xlsx は ZIP
        assert_eq!(&buffer[..2], b"PK");
    }

    #[test]
    fn test_empty_report() {
        let buffer = generate_report_buffer(&[], &MatchSummary::default()).expect("Excel生成失敗");
        assert!(!buffer.is_empty());
    }
}
