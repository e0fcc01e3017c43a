//! エラーケーステスト
//!
//! 各種エラー条件でのエラーハンドリングを検証

use rebuild_helper::config::Config;
use rebuild_helper::error::RebuildError;
use rebuild_helper::io;
use rebuild_helper_common::{write_kmz, Error, ExportStrategy, Session, SessionOptions};
use std::path::Path;
use tempfile::tempdir;

/// 存在しない入力ファイル
#[tokio::test]
async fn test_missing_input_file() {
    let result = io::read_input(Path::new("/nonexistent/path/12345.csv")).await;
    assert!(matches!(result, Err(RebuildError::FileNotFound(_))));
}

/// ST_NUM 列のない名簿
#[tokio::test]
async fn test_roster_without_st_num() {
    let dir = tempdir().expect("Failed to create temp dir");
    let csv = dir.path().join("bad.csv");
    std::fs::write(&csv, "NO,ST_NAME\n1,Jalan X\n").expect("CSV書き込み失敗");

    let result = io::load_roster(&csv).await;
    assert!(matches!(
        result,
        Err(RebuildError::Core(Error::Validation(_)))
    ));
}

/// ZIPでないKMZ
#[tokio::test]
async fn test_kmz_not_a_zip() {
    let dir = tempdir().expect("Failed to create temp dir");
    let csv = dir.path().join("abd.csv");
    let kmz = dir.path().join("abd.kmz");
    std::fs::write(&csv, "ST_NUM\n1\n").expect("CSV書き込み失敗");
    std::fs::write(&kmz, "plain text").expect("KMZ書き込み失敗");

    let result = io::load_session(SessionOptions::default(), &csv, &kmz).await;
    assert!(matches!(result, Err(RebuildError::Core(Error::Parse(_)))));
}

/// 壊れたKML
#[test]
fn test_malformed_kml() {
    let kmz = write_kmz("doc.kml", "<kml><Document></kml>").expect("KMZ作成失敗");
    let mut session = Session::new(SessionOptions::default());
    let result = session.load(b"ST_NUM\n1\n", &kmz);
    assert!(matches!(result, Err(Error::Parse(_))));
    assert!(!session.is_loaded());
}

/// Document 要素のないKML
#[test]
fn test_export_without_document_element() {
    let kmz = write_kmz(
        "doc.kml",
        "<kml><Placemark><name>1</name><Point><coordinates>1,2</coordinates></Point></Placemark></kml>",
    )
    .expect("KMZ作成失敗");
    let mut session = Session::new(SessionOptions::default());
    session.load(b"ST_NUM\n1\n", &kmz).expect("読み込み失敗");

    let result = session.export(ExportStrategy::Append);
    assert!(matches!(result, Err(Error::Structural(_))));
}

/// 不正な配置JSON
#[tokio::test]
async fn test_invalid_placements_json() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("placements.json");
    std::fs::write(&path, r#"{"row":1}"#).expect("JSON書き込み失敗");

    let result = io::read_placements(&path).await;
    assert!(matches!(result, Err(RebuildError::JsonParse(_))));
}

/// 設定ファイルの保存と読み込み
#[test]
fn test_config_save_and_load() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.export_strategy = ExportStrategy::Enrich;
    config.save_to(&path).expect("設定保存失敗");

    let loaded = Config::load_from(&path).expect("設定読み込み失敗");
    assert_eq!(loaded, config);

    let missing = Config::load_from(&dir.path().join("none.json")).expect("設定読み込み失敗");
    assert_eq!(missing, Config::default());
}

/// RebuildErrorのDisplay実装確認
#[test]
fn test_error_display() {
    let errors = vec![
        RebuildError::Config("テスト設定エラー".to_string()),
        RebuildError::FileNotFound("abd.csv".to_string()),
        RebuildError::Report("Excel保存エラー".to_string()),
        RebuildError::CliExecution("入力エラー".to_string()),
        RebuildError::Core(Error::Validation("nothing to undo".to_string())),
    ];

    for err in errors {
        let display = format!("{}", err);
        assert!(!display.is_empty(), "エラーメッセージが空");
    }

    let core = RebuildError::from(Error::NotFound("no .kml file inside the KMZ".into()));
    assert_eq!(core.to_string(), "Not found: no .kml file inside the KMZ");
}
