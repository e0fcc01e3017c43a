//! KMZ（ZIP）コンテナの読み書き

use crate::error::{Error, Result};
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// KMZ 内の KML
#[derive(Debug, Clone)]
pub struct KmzContents {
    /// コンテナ内のファイル名（出力時にそのまま使う）
    pub kml_name: String,
    pub kml_text: String,
}

/// KMZ バイト列から最初の `.kml` を取り出す
pub fn read_kmz(data: &[u8]) -> Result<KmzContents> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;

    let kml_name = archive
        .file_names()
        .find(|n| n.to_lowercase().ends_with(".kml"))
        .map(str::to_string)
        .ok_or_else(|| Error::NotFound("no .kml file inside the KMZ".into()))?;

    let mut bytes = Vec::new();
    archive
        .by_name(&kml_name)?
        .read_to_end(&mut bytes)
        .map_err(|e| Error::Parse(format!("KMZ: {}: {}", kml_name, e)))?;

    let text = String::from_utf8(bytes)
        .map_err(|e| Error::Parse(format!("{} is not valid UTF-8: {}", kml_name, e)))?;
    let kml_text = match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    };

    tracing::debug!(kml_name = %kml_name, bytes = kml_text.len(), "kml extracted");
    Ok(KmzContents { kml_name, kml_text })
}

/// KML を1ファイルだけ含む KMZ を作る
///
/// タイムスタンプは固定（同じ内容なら同じバイト列になる）。
pub fn write_kmz(kml_name: &str, kml_text: &str) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    writer.start_file(kml_name, options)?;
    writer.write_all(kml_text.as_bytes())?;
    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let kml = "<kml><Document/></kml>";
        let bytes = write_kmz("ABD.kml", kml).expect("KMZ作成失敗");
        let contents = read_kmz(&bytes).expect("KMZ読み込み失敗");
        assert_eq!(contents.kml_name, "ABD.kml");
        assert_eq!(contents.kml_text, kml);
    }

    #[test]
    fn test_write_is_deterministic() {
        let a = write_kmz("doc.kml", "<kml/>").expect("KMZ作成失敗");
        let b = write_kmz("doc.kml", "<kml/>").expect("KMZ作成失敗");
        assert_eq!(a, b);
    }

    #[test]
    fn test_read_picks_kml_case_insensitive() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        writer.start_file("files/icon.png", options).unwrap();
        writer.write_all(b"png").unwrap();
        writer.start_file("DOC.KML", options).unwrap();
        writer.write_all("\u{feff}<kml/>".as_bytes()).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let contents = read_kmz(&bytes).expect("KMZ読み込み失敗");
        assert_eq!(contents.kml_name, "DOC.KML");
        assert_eq!(contents.kml_text, "<kml/>");
    }

    #[test]
    fn test_read_without_kml() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("readme.txt", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"hello").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert!(matches!(read_kmz(&bytes), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_read_not_a_zip() {
        assert!(matches!(read_kmz(b"not a zip"), Err(Error::Parse(_))));
    }

    /// CRC が合わないエントリは解析エラー
    #[test]
    fn test_read_corrupted_entry() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        writer.start_file("doc.kml", options).unwrap();
        writer.write_all(b"<kml/>").unwrap();
        let mut bytes = writer.finish().unwrap().into_inner();

        let pos = bytes
            .windows(6)
            .position(|w| w == b"<kml/>")
            .expect("エントリ本体なし");
        bytes[pos + 4] = b'x';

        assert!(matches!(read_kmz(&bytes), Err(Error::Parse(_))));
    }
}
