use anyhow::{Context, Result};
use clap::Parser;
use ewizard::actuator::ServoSorter;
use ewizard::advisory::GeminiAdvisor;
use ewizard::cli::{Cli, Commands};
use ewizard::config::Config;
use ewizard::detector::{self, CommandDetector};
use ewizard::error::SorterError;
use ewizard::history::HistoryStore;
use ewizard::pipeline::{Pipeline, ScanOptions, ScanResult, Session};
use ewizard::{override_prompt, scanner};
use ewizard_common::{bin_for_label, Label};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type SortingPipeline = Pipeline<Arc<CommandDetector>, GeminiAdvisor, ServoSorter>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load().context("設定ファイルを読み込めません")?;
    let history = HistoryStore::open(cli.history.clone().unwrap_or_else(|| config.history_path()));

    match cli.command {
        Commands::Scan { image, threshold, no_advice, actuate, override_label, ask, annotated_out, json } => {
            let options = ScanOptions {
                confidence_threshold: config.threshold(threshold)?,
                advisory_enabled: !no_advice,
                actuation_enabled: actuate,
            };

            if !json {
                println!("🪄 ewizard - スキャン\n");
            }

            let image = scanner::load_image(&image)?;
            let pipeline = build_pipeline(&config, history)?;
            let mut session = Session::new();

            // 1. 検出
            if !json {
                println!("[1/2] 物体検出中...");
            }
            let gate = pipeline.detect(&session, &image, options)?;

            let mut choice = override_label;
            if gate.is_pending() {
                if !json {
                    println!(
                        "⚠ 信頼度が閾値未満です ({:.2} < {:.2})",
                        gate.scan().confidence(),
                        options.confidence_threshold
                    );
                }
                if choice.is_none() && ask {
                    choice = override_prompt::prompt_override(gate.actions(), gate.scan().confidence())?;
                }
            } else if gate.scan().detections().is_empty() && !json {
                println!("⚠ 物体が検出されませんでした（unknown として記録）");
            }

            // 2. 確定・ガイダンス・仕分け・記録
            if !json {
                println!("[2/2] 分別先を確定中...{}", if options.advisory_enabled { " (AIガイダンス有効)" } else { "" });
            }
            let result = pipeline.complete(&mut session, gate, choice).await;

            if let Some(path) = annotated_out {
                match &result.annotated_image {
                    Some(annotated) => {
                        annotated
                            .save(&path)
                            .with_context(|| format!("検出枠付き画像を保存できません: {}", path.display()))?;
                        if !json {
                            println!("✔ 検出枠付き画像を保存: {}", path.display());
                        }
                    }
                    None if !json => println!("検出枠付き画像はありません"),
                    None => {}
                }
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
        }

        Commands::Batch { folder, threshold, no_advice, actuate } => {
            println!("🪄 ewizard - 一括スキャン\n");

            let options = ScanOptions {
                confidence_threshold: config.threshold(threshold)?,
                advisory_enabled: !no_advice,
                actuation_enabled: actuate,
            };

            let images = scanner::scan_folder(&folder)?;
            if images.is_empty() {
                return Err(SorterError::NoImagesFound(folder.display().to_string()).into());
            }
            println!("✔ {}枚の画像を検出\n", images.len());

            let pipeline = build_pipeline(&config, history)?;
            let mut session = Session::new();

            let progress = ProgressBar::new(images.len() as u64);
            progress.set_style(
                ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );

            let mut succeeded = 0;
            let mut failed = 0;
            for info in &images {
                progress.set_message(info.file_name.clone());

                let outcome = match scanner::load_image(&info.path) {
                    Ok(image) => pipeline.scan(&mut session, &image, options, None).await,
                    Err(e) => Err(e),
                };

                match outcome {
                    Ok(result) => {
                        succeeded += 1;
                        progress.println(format!(
                            "  {} → {} ({:.2}) {}{}",
                            info.file_name,
                            result.label,
                            result.confidence,
                            result.bin,
                            if result.low_confidence { " ⚠" } else { "" }
                        ));
                    }
                    Err(e) => {
                        failed += 1;
                        progress.println(format!("  ✖ {}: {}", info.file_name, e));
                    }
                }
                progress.inc(1);
            }
            progress.finish_and_clear();

            println!("\n✅ 完了: {}件 (失敗 {}件)", succeeded, failed);
        }

        Commands::History { limit, clear } => {
            if clear {
                history.clear()?;
                println!("✔ 履歴を削除しました: {}", history.path().display());
                return Ok(());
            }

            let entries = history.recent(limit)?;
            if entries.is_empty() {
                println!("履歴はありません: {}", history.path().display());
                return Ok(());
            }

            println!("{:<20} {:<12} {:>6}  {:<30} 手動", "日時", "ラベル", "信頼度", "分別先");
            for entry in entries {
                println!(
                    "{:<20} {:<12} {:>6}  {:<30} {}",
                    entry.timestamp,
                    entry.label,
                    entry.confidence.map(|c| format!("{:.2}", c)).unwrap_or_else(|| "-".into()),
                    entry.bin,
                    match entry.overridden {
                        Some(true) => "✔",
                        Some(false) => "",
                        None => "-",
                    }
                );
            }
        }

        Commands::Stats => {
            let stats = history.stats()?;
            println!("集計: {}", history.path().display());
            println!("  合計: {}", stats.total);
            for label in Label::KNOWN.iter().chain(std::iter::once(&Label::Unknown)) {
                println!("  {}: {}", label.display_name(), stats.count(label.as_str()));
            }
            println!("  手動分類: {}", stats.overridden);
            if let Some(mean) = stats.mean_confidence {
                println!("  平均信頼度: {:.2}", mean);
            }
        }

        Commands::Labels => {
            println!("品目ラベル:");
            for label in Label::KNOWN.iter().chain(std::iter::once(&Label::Unknown)) {
                println!("  {:<12} {:<12} → {}", label.as_str(), label.display_name(), bin_for_label(*label));
            }
        }

        Commands::Config { set_api_key, show } => {
            let mut config = config;

            if let Some(key) = set_api_key {
                config.set_api_key(key)?;
                println!("✔ APIキーを設定しました");
            }

            if show {
                println!("設定:");
                println!("  モデル: {}", config.model);
                println!("  タイムアウト: {}秒", config.advisory_timeout_seconds);
                println!("  信頼度の閾値: {}", config.confidence_threshold);
                println!("  履歴: {}", config.history_path().display());
                println!("  検出コマンド: {}", config.detector.command.join(" "));
                println!("  APIキー: {}", if config.get_api_key().is_ok() { "設定済み" } else { "未設定" });
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "ewizard=debug" } else { "ewizard=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_pipeline(config: &Config, history: HistoryStore) -> Result<SortingPipeline> {
    let detector = detector::shared(&config.detector)?;
    Ok(Pipeline::new(
        detector,
        GeminiAdvisor::from_config(config),
        ServoSorter::from_config(&config.actuator),
        history,
    ))
}

fn print_result(result: &ScanResult) {
    println!();
    println!("✔ 判定: {} (信頼度 {:.2})", result.label, result.confidence);
    println!("  分別先: {}", result.bin);
    if result.overridden {
        println!("  手動で分類しました");
    } else if result.low_confidence {
        println!("  信頼度が低いため仕分けは行いません");
    }
    match result.actuated {
        Some(true) => println!("  仕分け: 完了"),
        Some(false) => println!("  仕分け: 失敗（ログを確認してください）"),
        None => {}
    }
    if !result.logged {
        println!("  ⚠ 履歴に記録できませんでした");
    }

    println!();
    for section in result.guidance_sections() {
        if !section.title.is_empty() {
            println!("■ {}", section.title);
        }
        for line in section.body.lines() {
            println!("  {}", line);
        }
        println!();
    }
}
