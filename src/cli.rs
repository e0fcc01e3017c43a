use clap::{Parser, Subcommand};
use rebuild_helper_common::{ExportStrategy, View};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rebuild-helper")]
#[command(about = "ABD 名簿CSVとKMZポイントの照合・再構築支援ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 名簿とKMZを照合して件数を表示
    Process {
        /// 名簿CSV（ABD Existing）
        #[arg(long, required = true)]
        csv: PathBuf,

        /// KMZファイル
        #[arg(long, required = true)]
        kmz: PathBuf,

        /// レポート出力先（.xlsx ならExcel、それ以外はJSON）
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// 照合結果を一覧表示
    List {
        #[arg(long, required = true)]
        csv: PathBuf,

        #[arg(long, required = true)]
        kmz: PathBuf,

        /// 表示区分 (missing/matched/street-missing/all)
        #[arg(long, default_value = "missing")]
        view: View,

        /// 通り名（ST_NAME）で絞り込み
        #[arg(long)]
        street: Option<String>,

        /// ST_NUM / ST_NAME の部分一致検索
        #[arg(short, long)]
        search: Option<String>,
    },

    /// 名簿の通り名一覧
    Streets {
        #[arg(long, required = true)]
        csv: PathBuf,
    },

    /// KMZを書き出す
    Export {
        #[arg(long, required = true)]
        csv: PathBuf,

        #[arg(long, required = true)]
        kmz: PathBuf,

        /// 出力ファイル/ディレクトリ（省略時は設定の出力ファイル名）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 書き出し方式 (append/enrich、省略時は設定値)
        #[arg(long)]
        strategy: Option<ExportStrategy>,

        /// 手動配置JSON（[{"row":N,"lat":..,"lng":..}]）
        #[arg(short, long)]
        placements: Option<PathBuf>,
    },

    /// 通り単位で対話的に配置してKMZを書き出す
    Bulk {
        #[arg(long, required = true)]
        csv: PathBuf,

        #[arg(long, required = true)]
        kmz: PathBuf,

        /// 対象の通り名（ST_NAME）
        #[arg(long, required = true)]
        street: String,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        strategy: Option<ExportStrategy>,

        /// 配置結果をJSONで保存
        #[arg(long)]
        save_placements: Option<PathBuf>,
    },

    /// 設定を表示/編集
    Config {
        /// 設定を表示
        #[arg(long)]
        show: bool,

        /// 出力ファイル名を設定
        #[arg(long)]
        set_output_name: Option<String>,

        /// 既定の書き出し方式を設定 (append/enrich)
        #[arg(long)]
        set_strategy: Option<ExportStrategy>,

        /// 照合対象フォルダを設定（例: HP/HOME）
        #[arg(long)]
        set_folder_path: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_export() {
        let cli = Cli::try_parse_from([
            "rebuild-helper",
            "export",
            "--csv",
            "abd.csv",
            "--kmz",
            "abd.kmz",
            "--strategy",
            "enrich",
        ])
        .expect("引数解析失敗");

        match cli.command {
            Commands::Export { strategy, output, .. } => {
                assert_eq!(strategy, Some(ExportStrategy::Enrich));
                assert!(output.is_none());
            }
            _ => panic!("Export以外に解析された"),
        }
    }

    #[test]
    fn test_parse_list_view() {
        let cli = Cli::try_parse_from([
            "rebuild-helper",
            "-v",
            "list",
            "--csv",
            "a.csv",
            "--kmz",
            "a.kmz",
            "--view",
            "street-missing",
            "--street",
            "Jalan X",
        ])
        .expect("引数解析失敗");

        assert!(cli.verbose);
        match cli.command {
            Commands::List { view, street, .. } => {
                assert_eq!(view, View::StreetMissing);
                assert_eq!(street.as_deref(), Some("Jalan X"));
            }
            _ => panic!("List以外に解析された"),
        }
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let result = Cli::try_parse_from([
            "rebuild-helper",
            "export",
            "--csv",
            "a.csv",
            "--kmz",
            "a.kmz",
            "--strategy",
            "rewrite",
        ]);
        assert!(result.is_err());
    }
}
