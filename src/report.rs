//! 照合レポートの書き出し
//!
//! 拡張子が .xlsx なら Excel、それ以外は JSON。

use crate::error::{RebuildError, Result};
use rebuild_helper_common::report::excel_core::generate_report_buffer;
use rebuild_helper_common::{MatchReport, Session};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Excel,
    Json,
}

impl ReportFormat {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("xlsx") => ReportFormat::Excel,
            _ => ReportFormat::Json,
        }
    }
}

pub async fn write_report(session: &Session, path: &Path) -> Result<ReportFormat> {
    let generated_at = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%:z").to_string();
    let report = MatchReport::new(session, generated_at);
    let format = ReportFormat::for_path(path);

    let bytes = match format {
        ReportFormat::Excel => {
            tokio::task::spawn_blocking(move || generate_report_buffer(&report.rows, &report.summary))
                .await?
                .map_err(RebuildError::Report)?
        }
        ReportFormat::Json => report.to_json()?.into_bytes(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(format)
}
