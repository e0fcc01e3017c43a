use crate::error::{RebuildError, Result};
use rebuild_helper_common::{ExportStrategy, MutatorOptions, SessionOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 照合対象フォルダ（名前の並び）
    pub folder_path: Vec<String>,
    pub output_file_name: String,
    pub export_strategy: ExportStrategy,
    /// 追加モードの生成フォルダ名
    pub generated_folder: String,
    pub tag_style_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// 指定パスから読む（なければ既定値）
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default_config())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| RebuildError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("rebuild-helper").join("config.json"))
    }

    fn default_config() -> Self {
        let options = SessionOptions::default();
        Self {
            folder_path: options.folder_path,
            output_file_name: options.output_file_name,
            export_strategy: ExportStrategy::default(),
            generated_folder: options.mutator.generated_folder,
            tag_style_id: options.mutator.tag_style_id,
        }
    }

    /// `HP/HOME` 形式のフォルダパスを設定する
    pub fn set_folder_path(&mut self, path: &str) -> Result<()> {
        let parts: Vec<String> = path
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if parts.is_empty() {
            return Err(RebuildError::Config(format!("フォルダパスが空です: {:?}", path)));
        }
        self.folder_path = parts;
        Ok(())
    }

    pub fn set_output_file_name(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RebuildError::Config("出力ファイル名が空です".into()));
        }
        self.output_file_name = if name.to_lowercase().ends_with(".kmz") {
            name.to_string()
        } else {
            format!("{}.kmz", name)
        };
        Ok(())
    }

    /// エンジン用の設定に変換
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            folder_path: self.folder_path.clone(),
            mutator: MutatorOptions {
                generated_folder: self.generated_folder.clone(),
                tag_style_id: self.tag_style_id.clone(),
                point_folder_path: self.folder_path.clone(),
            },
            output_file_name: self.output_file_name.clone(),
        }
    }
}
