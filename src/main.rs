use anyhow::Context;
use clap::Parser;
use gem_ai_rust::analyzer::{cache::CacheFile, Aggregator, CancelFlag, OpenAiClient, RunOptions};
use gem_ai_rust::{cli, config, error, export, scanner};
use cli::{Cli, Commands, ExportFormat, PdfQuality};
use config::Config;
use gem_ai_common::{CombinedResults, SummaryReport};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// 解析ステップの入力
struct AnalyzeArgs {
    folder: PathBuf,
    output: Option<PathBuf>,
    max_images: Option<usize>,
    concurrency: usize,
    use_cache: bool,
    yes: bool,
}

/// 解析ステップの出力
struct Analyzed {
    combined: CombinedResults,
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load().context("設定ファイルの読み込みに失敗しました")?;
    tracing::debug!(?config, "設定を読み込みました");

    match cli.command {
        Commands::Analyze { folder, output, max_images, concurrency, use_cache, yes } => {
            println!("💎 gem-ai - 宝石画像解析\n");

            let args = AnalyzeArgs { folder, output, max_images, concurrency, use_cache, yes };
            if analyze_folder(&config, &args, 3).await?.is_some() {
                println!("\n✅ 解析完了");
            }
        }

        Commands::Brochure { input, format, output, images, title, pdf_quality } => {
            println!("📄 gem-ai - ブローシャー生成\n");

            let combined = export::load_combined(&input)
                .with_context(|| format!("統合結果を読み込めません: {}", input.display()))?;
            println!("✔ {}件の解析結果を読み込み", combined.len());

            let images_dir = images.or_else(|| resolve_images_dir(&input, &combined));
            let output = output.unwrap_or_else(|| parent_or_current(&input));

            export_brochure(&combined, &format, &output, images_dir.as_deref(), &title, pdf_quality)?;

            println!("\n✅ ブローシャー生成完了");
        }

        Commands::Run { folder, output, format, max_images, concurrency, pdf_quality, use_cache, yes } => {
            println!("🚀 gem-ai - 一括処理\n");

            let args = AnalyzeArgs { folder, output, max_images, concurrency, use_cache, yes };
            let Some(analyzed) = analyze_folder(&config, &args, 4).await? else {
                return Ok(());
            };

            println!("\n[4/4] ブローシャーを生成中...");
            if analyzed.combined.is_empty() {
                println!("⚠ 解析に成功した画像がないためブローシャーは生成しません");
            } else {
                export_brochure(
                    &analyzed.combined,
                    &format,
                    &analyzed.output_dir,
                    Some(args.folder.as_path()),
                    gem_ai_common::export::pdf_core::TITLE_EN,
                    pdf_quality,
                )?;
            }

            println!("\n✅ 完了");
        }

        Commands::Config { set_api_key, show } => {
            let mut config = config;

            if let Some(key) = set_api_key {
                config.set_api_key(key)?;
                println!("✔ APIキーを設定しました");
            }

            if show {
                println!("設定:");
                println!("  ファイル: {}", Config::config_path()?.display());
                println!("  モデル: {}", config.model);
                println!("  APIエンドポイント: {}", config.api_base_url);
                println!("  最大トークン数: {}", config.max_tokens);
                println!("  タイムアウト: {}秒", config.timeout_seconds);
                println!(
                    "  再試行: 最大{}回 (待機 {}ms〜{}ms)",
                    config.max_retries, config.backoff_base_ms, config.backoff_max_ms
                );
                println!("  APIキー: {}", if config.has_api_key() { "設定済み" } else { "未設定" });
            }
        }

        Commands::Cache { clear, folder, info } => {
            let target = folder.unwrap_or_else(|| PathBuf::from("."));
            let cache_path = CacheFile::cache_path(&target);

            if info || !clear {
                // デフォルトまたは--info: 情報表示
                if cache_path.exists() {
                    let cache = CacheFile::load(&target);
                    println!("キャッシュ情報:");
                    println!("  パス: {}", cache_path.display());
                    println!("  件数: {}", cache.len());
                    if let Ok(meta) = std::fs::metadata(&cache_path) {
                        println!("  サイズ: {} bytes", meta.len());
                    }
                } else {
                    println!("キャッシュファイルが存在しません: {}", cache_path.display());
                }
            }

            if clear {
                match CacheFile::clear(&target) {
                    Ok(true) => println!("✔ キャッシュを削除しました: {}", cache_path.display()),
                    Ok(false) => println!("キャッシュファイルが存在しません"),
                    Err(e) => println!("キャッシュ削除エラー: {}", e),
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// スキャン → 課金確認 → 解析 → JSON出力
///
/// 確認で中止した場合は None
async fn analyze_folder(
    config: &Config,
    args: &AnalyzeArgs,
    total_steps: usize,
) -> anyhow::Result<Option<Analyzed>> {
    // 1. 画像スキャン
    println!("[1/{}] 画像をスキャン中...", total_steps);
    let source = scanner::scan_folder(&args.folder)?;
    let found = source.list().len();
    let planned = args.max_images.map_or(found, |max| found.min(max));
    println!("✔ {}枚の画像を検出\n", found);

    if planned == 0 {
        return Err(error::GemAiError::NoImagesFound(args.folder.display().to_string()).into());
    }

    let client = OpenAiClient::new(config)?;

    // 課金確認
    println!(
        "⚠ {}枚の画像を OpenAI API ({}) で解析します。API利用料金が発生します。",
        planned, config.model
    );
    if !args.yes {
        let proceed = dialoguer::Confirm::new()
            .with_prompt("続行しますか？")
            .default(false)
            .interact()
            .context("確認入力を読み取れません（--yes で確認をスキップできます）")?;
        if !proceed {
            println!("中止しました");
            return Ok(None);
        }
    }

    // 2. AI解析
    println!(
        "\n[2/{}] AI解析中...{}",
        total_steps,
        if args.use_cache { " (キャッシュ有効)" } else { "" }
    );

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n⚠ 中断要求を受けました。処理済みの結果を保存します...");
                cancel.cancel();
            }
        });
    }

    let options = RunOptions {
        max_images: args.max_images,
        concurrency: args.concurrency.max(1),
        retry: config.retry_policy(),
        analysis_date: chrono::Local::now().format("%Y-%m-%d").to_string(),
    };

    let mut aggregator = Aggregator::new(client, options)
        .with_progress(progress_bar(planned))
        .with_cancel(cancel);
    if args.use_cache {
        aggregator = aggregator.with_cache(CacheFile::load(&args.folder));
    }

    let outcome = aggregator.run(&source).await;

    if let Some(cache) = &outcome.cache {
        if let Err(e) = cache.save(&args.folder) {
            tracing::warn!(error = %e, "キャッシュを保存できません");
        }
    }
    println!("✔ 解析完了 (成功 {} / 失敗 {})\n", outcome.summary.succeeded, outcome.summary.failed);

    // 3. 結果保存
    println!("[3/{}] 結果を保存中...", total_steps);
    let output_dir = args
        .output
        .clone()
        .unwrap_or_else(|| args.folder.join("output"));
    let report = export::ReportWriter::new(&output_dir).write_all(&outcome.combined, &outcome.summary);
    println!("✔ {}ファイルを保存: {}", report.written.len(), output_dir.display());
    for failure in &report.failures {
        println!("  ✖ {} [{}] {}", failure.image_filename, failure.kind, failure.message);
    }

    print_summary(&report.summary);

    Ok(Some(Analyzed {
        combined: outcome.combined,
        output_dir,
    }))
}

fn progress_bar(len: usize) -> ProgressBar {
    let progress = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}") {
        progress.set_style(style.progress_chars("=>-"));
    }
    progress
}

fn print_summary(summary: &SummaryReport) {
    println!("\n📊 サマリー");
    println!("  処理: {}枚 (成功 {} / 失敗 {})", summary.processed, summary.succeeded, summary.failed);
    if summary.succeeded > 0 {
        println!("  平均信頼度: {:.1}%", summary.average_confidence);
        for (name, count) in &summary.gemstone_types_identified {
            println!("  - {}: {}", name, count);
        }
    }
    for failure in &summary.failures {
        println!("  ✖ {} [{}] {}", failure.image_filename, failure.kind, failure.message);
    }
    if summary.interrupted {
        println!("  ⚠ 中断されたため一部の画像は未処理です");
    }
}

fn export_brochure(
    combined: &CombinedResults,
    format: &ExportFormat,
    output: &Path,
    images_dir: Option<&Path>,
    title: &str,
    pdf_quality: PdfQuality,
) -> anyhow::Result<()> {
    if images_dir.is_none() {
        println!("⚠ 画像フォルダが見つかりません。画像なしで生成します");
    }
    export::export_results(combined, format, output, images_dir, title, pdf_quality)?;
    Ok(())
}

fn parent_or_current(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// 統合結果JSONの場所から画像フォルダを推定（output/ の親 → 同じフォルダの順）
fn resolve_images_dir(input: &Path, combined: &CombinedResults) -> Option<PathBuf> {
    let first = combined.results.first()?;
    let json_dir = parent_or_current(input);

    [json_dir.parent().map(Path::to_path_buf), Some(json_dir.clone())]
        .into_iter()
        .flatten()
        .find(|dir| dir.join(&first.image_filename).is_file())
}
