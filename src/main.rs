use clap::Parser;
use indicatif::ProgressBar;
use rebuild_helper::{cli, config, error, interactive, io, logging, report};
use rebuild_helper_common::{ExportStrategy, LoadSummary, RowFilter, Session};
use cli::{Cli, Commands};
use config::Config;
use error::Result;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn load(config: &Config, csv: &Path, kmz: &Path) -> Result<(Session, LoadSummary)> {
    let pb = spinner("名簿とKMZを読み込み中...");
    let loaded = io::load_session(config.session_options(), csv, kmz).await;
    pb.finish_and_clear();

    let (session, summary) = loaded?;
    println!(
        "✔ {}行 / {}ポイント ({})",
        summary.rows,
        summary.points,
        if summary.scoped {
            format!("フォルダ {}", config.folder_path.join("/"))
        } else {
            "全Placemark".to_string()
        }
    );
    Ok((session, summary))
}

async fn export(
    session: Session,
    strategy: ExportStrategy,
    output: Option<&Path>,
) -> Result<()> {
    let pb = spinner("KMZを生成中...");
    let exported = io::export_session(session, strategy).await;
    pb.finish_and_clear();

    let (_, artifact) = exported?;
    let written = io::write_artifact(&artifact, output).await?;
    println!(
        "✔ KMZ出力 ({}): {} [{}]",
        strategy,
        written.path.display(),
        artifact.kml_name
    );
    println!(
        "  タグ {} / 属性更新 {} / 追加 {}",
        artifact.stats.tagged, artifact.stats.enriched, artifact.stats.added
    );
    println!("  {} bytes, SHA-256 {}", written.size, written.sha256);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    match cli.command {
        Commands::Process { csv, kmz, report: report_path } => {
            println!("🗺 rebuild-helper - 照合\n");

            let (session, summary) = load(&config, &csv, &kmz).await?;
            println!("{}", summary.summary);

            if let Some(path) = report_path {
                let format = report::write_report(&session, &path).await?;
                println!("\n✔ レポート出力 ({:?}): {}", format, path.display());
            }

            println!("\n✅ 照合完了");
        }

        Commands::List { csv, kmz, view, street, search } => {
            let (session, _) = load(&config, &csv, &kmz).await?;
            let filter = RowFilter {
                view,
                street: street.unwrap_or_default(),
                query: search.unwrap_or_default(),
            };

            let indices = session.filtered(&filter);
            for &i in &indices {
                let (row, m) = (&session.rows()[i], &session.matches()[i]);
                let point = session
                    .matched_point(i)
                    .map(|p| format!(" → {} ({}, {})", p.name, p.lat, p.lng))
                    .unwrap_or_default();
                println!(
                    "{:>5}  {:<8} {:<28} {:<10} {}{}",
                    i,
                    row.st_num(),
                    row.street(),
                    m.status,
                    m.reason,
                    point
                );
            }
            println!("\n{}件", indices.len());
        }

        Commands::Streets { csv } => {
            let roster = io::load_roster(&csv).await?;
            for street in roster.streets() {
                println!("{}", street);
            }
        }

        Commands::Export { csv, kmz, output, strategy, placements } => {
            println!("📦 rebuild-helper - KMZ出力\n");

            let (mut session, _) = load(&config, &csv, &kmz).await?;
            if let Some(path) = placements {
                let list = io::read_placements(&path).await?;
                let applied = session.apply_placements(&list)?;
                println!("✔ 手動配置 {}件を適用", applied);
            }

            let strategy = strategy.unwrap_or(config.export_strategy);
            export(session, strategy, output.as_deref()).await?;

            println!("\n✅ エクスポート完了");
        }

        Commands::Bulk { csv, kmz, street, output, strategy, save_placements } => {
            println!("📍 rebuild-helper - 一括配置\n");

            let (mut session, _) = load(&config, &csv, &kmz).await?;
            let placed = interactive::run_interactive_bulk(&mut session, &street)?;
            println!("\n{}", session.summary());

            if session.added().is_empty() {
                println!("\n配置がないため終了します");
                return Ok(());
            }

            if let Some(path) = save_placements {
                io::write_placements(&path, session.added()).await?;
                println!("✔ 配置を保存: {}", path.display());
            }

            if interactive::confirm_export(placed)? {
                let strategy = strategy.unwrap_or(config.export_strategy);
                export(session, strategy, output.as_deref()).await?;
                println!("\n✅ 完了");
            }
        }

        Commands::Config { show, set_output_name, set_strategy, set_folder_path } => {
            let mut config = config;
            let mut changed = false;

            if let Some(name) = set_output_name {
                config.set_output_file_name(&name)?;
                changed = true;
            }
            if let Some(strategy) = set_strategy {
                config.export_strategy = strategy;
                changed = true;
            }
            if let Some(path) = set_folder_path {
                config.set_folder_path(&path)?;
                changed = true;
            }
            if changed {
                config.save()?;
                println!("✔ 設定を保存しました: {}", Config::config_path()?.display());
            }

            if show || !changed {
                println!("設定:");
                println!("  照合フォルダ: {}", config.folder_path.join("/"));
                println!("  出力ファイル名: {}", config.output_file_name);
                println!("  書き出し方式: {}", config.export_strategy);
                println!("  生成フォルダ: {}", config.generated_folder);
                println!("  タグスタイルID: {}", config.tag_style_id);
            }
        }
    }

    Ok(())
}
