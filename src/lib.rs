//! ABD Rebuild Helper
//!
//! 照合エンジン（rebuild-helper-common）の CLI 側: 設定、ファイル入出力、対話配置、レポート

pub mod cli;
pub mod config;
pub mod error;
pub mod interactive;
pub mod io;
pub mod logging;
pub mod report;
