//! ファイル入出力（非同期）
//!
//! 読み込み・解析・圧縮はブロッキング処理なので spawn_blocking に逃がす。

use crate::error::{RebuildError, Result};
use rebuild_helper_common::{
    parse_roster, AddedPoint, ExportArtifact, ExportStrategy, LoadSummary, Roster, Session,
    SessionOptions,
};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// 書き出したファイル
#[derive(Debug, Clone)]
pub struct WrittenArtifact {
    pub path: PathBuf,
    pub size: usize,
    pub sha256: String,
}

/// 入力ファイルを読む（なければ FileNotFound）
pub async fn read_input(path: &Path) -> Result<Vec<u8>> {
    if !tokio::fs::try_exists(path).await? {
        return Err(RebuildError::FileNotFound(path.display().to_string()));
    }
    let bytes = tokio::fs::read(path).await?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "input read");
    Ok(bytes)
}

/// 名簿とKMZを読み込んでセッションを作る
pub async fn load_session(
    options: SessionOptions,
    csv: &Path,
    kmz: &Path,
) -> Result<(Session, LoadSummary)> {
    let csv_bytes = read_input(csv).await?;
    let kmz_bytes = read_input(kmz).await?;

    let loaded = tokio::task::spawn_blocking(move || {
        let mut session = Session::new(options);
        let summary = session.load(&csv_bytes, &kmz_bytes)?;
        Ok::<_, rebuild_helper_common::Error>((session, summary))
    })
    .await??;
    Ok(loaded)
}

/// 名簿だけ読む
pub async fn load_roster(csv: &Path) -> Result<Roster> {
    let bytes = read_input(csv).await?;
    let roster = tokio::task::spawn_blocking(move || parse_roster(&bytes)).await??;
    Ok(roster)
}

/// KMZを生成する（セッションは返却する）
pub async fn export_session(
    mut session: Session,
    strategy: ExportStrategy,
) -> Result<(Session, ExportArtifact)> {
    let exported = tokio::task::spawn_blocking(move || {
        let artifact = session.export(strategy)?;
        Ok::<_, rebuild_helper_common::Error>((session, artifact))
    })
    .await??;
    Ok(exported)
}

/// 出力先を決める（ディレクトリまたは拡張子なしなら設定のファイル名を付ける）
pub fn resolve_output_path(output: Option<&Path>, file_name: &str) -> PathBuf {
    match output {
        Some(path) if path.is_dir() || path.extension().is_none() => path.join(file_name),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(file_name),
    }
}

/// KMZを書き出してハッシュを返す
pub async fn write_artifact(artifact: &ExportArtifact, output: Option<&Path>) -> Result<WrittenArtifact> {
    let path = resolve_output_path(output, &artifact.file_name);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, &artifact.bytes).await?;

    let written = WrittenArtifact {
        size: artifact.bytes.len(),
        sha256: sha256_hex(&artifact.bytes),
        path,
    };
    tracing::info!(path = %written.path.display(), size = written.size, "artifact written");
    Ok(written)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// 手動配置JSONを読む
pub async fn read_placements(path: &Path) -> Result<Vec<AddedPoint>> {
    let bytes = read_input(path).await?;
    let placements: Vec<AddedPoint> = serde_json::from_slice(&bytes)?;
    Ok(placements)
}

pub async fn write_placements(path: &Path, placements: &[AddedPoint]) -> Result<()> {
    let json = serde_json::to_string_pretty(placements)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_resolve_output_path() {
        assert_eq!(
            resolve_output_path(None, "ABD_KMZ_UPDATED.kmz"),
            PathBuf::from("ABD_KMZ_UPDATED.kmz")
        );
        assert_eq!(
            resolve_output_path(Some(Path::new("out/result.kmz")), "ABD_KMZ_UPDATED.kmz"),
            PathBuf::from("out/result.kmz")
        );
        assert_eq!(
            resolve_output_path(Some(Path::new("out")), "ABD_KMZ_UPDATED.kmz"),
            PathBuf::from("out/ABD_KMZ_UPDATED.kmz")
        );
    }
}
