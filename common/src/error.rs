//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    /// 利用者が修正できる入力不備（ファイル未指定・列不足・空テーブルなど）
    #[error("Validation error: {0}")]
    Validation(String),

    /// CSV / KML / KMZ の解析失敗
    #[error("Parse error: {0}")]
    Parse(String),

    /// エクスポート対象のドキュメント構造が不正
    #[error("Structural error: {0}")]
    Structural(String),

    /// コンテナ内に必要なファイルがない
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Parse(format!("CSV: {}", e))
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::Parse(format!("KMZ: {}", e))
    }
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
