use thiserror::Error;

#[derive(Error, Debug)]
pub enum RebuildError {
    #[error(transparent)]
    Core(#[from] rebuild_helper_common::Error),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("レポート生成エラー: {0}")]
    Report(String),

    #[error("CLI実行エラー: {0}")]
    CliExecution(String),

    #[error("バックグラウンド処理エラー: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, RebuildError>;
