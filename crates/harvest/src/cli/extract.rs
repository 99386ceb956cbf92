//! The extract command: run the full pipeline over a plan file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;

use harvest_core::{Config, ExtractionPlan, ExtractionResult, Extractor, ReqwestFetcher};

/// Arguments for the extract command.
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Extraction plan (JSON): properties with candidate URLs per source
    pub plan: PathBuf,

    /// Override the configured output directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Process every property, including ones already marked completed
    #[arg(long)]
    pub no_resume: bool,

    /// Require candidate hosts to match the CDN allowlist
    #[arg(long)]
    pub strict_urls: bool,

    /// Override the max number of simultaneously extracted properties
    #[arg(long)]
    pub concurrency: Option<usize>,
}

/// Run an extraction.
pub async fn run(args: ExtractArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(output_dir) = args.output_dir {
        config.storage.output_dir = output_dir;
    }
    if args.no_resume {
        config.extraction.resume = false;
    }
    if args.strict_urls {
        config.security.strict_url_mode = true;
    }
    if let Some(concurrency) = args.concurrency {
        config.extraction.max_concurrent_properties = concurrency.max(1);
    }

    let plan = ExtractionPlan::load(&args.plan)
        .with_context(|| format!("Failed to load extraction plan {:?}", args.plan))?;
    anyhow::ensure!(
        !plan.properties.is_empty(),
        "extraction plan {:?} contains no properties",
        args.plan
    );
    tracing::info!(
        "Loaded plan: {} properties, {} sources",
        plan.properties.len(),
        plan.discoveries.len()
    );

    let fetcher = Arc::new(ReqwestFetcher::new(&config.limits)?);
    let extractor = Extractor::new(config, fetcher, plan.discoveries);

    // First Ctrl-C requests a graceful stop: in-flight images finish and
    // the state file stays consistent for the next resumed run.
    let cancel = extractor.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received - letting in-flight work finish");
            cancel.cancel();
        }
    });

    let progress = create_progress(plan.properties.len());
    let result = extractor.extract_all(&plan.properties).await?;
    progress.finish_and_clear();

    print_summary(&result);
    Ok(())
}

/// Spinner shown while property tasks run.
fn create_progress(total: usize) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.set_message(format!("extracting {total} properties..."));
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    pb
}

/// Print a formatted summary table after the run.
fn print_summary(result: &ExtractionResult) {
    let duration_s = result.duration().num_milliseconds() as f64 / 1000.0;

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("             Run Summary");
    eprintln!("  ====================================");
    eprintln!("    Sources ok:     {:>8}", result.processed);
    if result.failed > 0 {
        eprintln!("    Sources failed: {:>8}", result.failed);
    }
    eprintln!("    Images found:   {:>8}", result.images_found);
    eprintln!("    Downloaded:     {:>8}", result.images_downloaded);
    eprintln!("    Duplicates:     {:>8}", result.duplicates);
    eprintln!("  ------------------------------------");
    eprintln!(
        "    Success rate:   {:>7.1}%",
        result.success_rate() * 100.0
    );
    eprintln!("    Duration:       {:>7.1}s", duration_s);
    eprintln!("  ====================================");

    for (source, stats) in &result.per_source {
        eprintln!(
            "    {:<12} {} ok, {} failed, {} found, {} stored, {} dup",
            source,
            stats.processed,
            stats.failed,
            stats.images_found,
            stats.images_downloaded,
            stats.duplicates
        );
    }
}
