use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use serde_json::json;

use tldist::fingerprint::worker::calculate_distributed;
use tldist::fingerprint::{Cutout, ExtractorConfig, SyntheticPatchSource};
use tldist::pipeline::{PipelineConfig, PipelineContext};
use tldist::similarity::worker::similarity_distributed;
use tldist::similarity::{SimilarMatch, Similarity, SimilarityConfig, SimilarityEngine};
use tldist::vector::knn::DEFAULT_NEIGHBORS;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

/// Fingerprint the cutouts of a source image and query the similarity map.
#[derive(Parser, Debug)]
#[command(version)]
struct Opts {
    /// Pipeline configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of chunks the cutouts are split into
    #[arg(short, long)]
    parallelism: Option<usize>,
    /// Worker threads
    #[arg(long)]
    workers: Option<usize>,
    /// Abort a stage that takes longer than this
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Source image reference; pixels are synthesised from it
    #[arg(long, default_value = "synthetic.fits")]
    source: String,
    #[arg(long, default_value_t = 1024)]
    rows: usize,
    #[arg(long, default_value_t = 1024)]
    cols: usize,
    /// Distance in pixels between neighbouring cutout centres
    #[arg(long, default_value_t = 112)]
    stepsize: usize,
    /// Saved extractor configuration
    #[arg(long, default_value = r#"{"kind":"histogram","bins":16}"#)]
    extractor: String,
    /// Similarity strategy: tsne, jaccard or distance
    #[arg(short, long, default_value = "tsne")]
    strategy: String,
    /// Seed for the t-SNE layout
    #[arg(long)]
    seed: Option<u64>,
    /// t-SNE iterations
    #[arg(long)]
    iterations: Option<usize>,
    /// Query point, comma separated. Defaults to the first record.
    #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
    query: Vec<f32>,
    /// Number of similar cutouts to show
    #[arg(short, long, default_value_t = DEFAULT_NEIGHBORS)]
    neighbors: usize,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

fn pipeline_config(opts: &Opts) -> Result<PipelineConfig> {
    let mut config = match &opts.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(p) = opts.parallelism {
        config.parallelism = p;
    }
    if let Some(w) = opts.workers {
        config.workers = w;
    }
    if opts.timeout_secs.is_some() {
        config.timeout_secs = opts.timeout_secs;
    }
    config.validate()?;
    Ok(config)
}

const PROGRESS_TICKS: u64 = 1000;

fn pb_style() -> Result<ProgressStyle> {
    Ok(ProgressStyle::default_bar()
        .template("{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {percent}% {msg}")?
        .progress_chars("#>-"))
}

/// Bar for one pipeline stage; the message lists each unit's own fraction.
fn stage_bar(stage: &'static str, style: &ProgressStyle) -> ProgressBar {
    ProgressBar::new(PROGRESS_TICKS).with_style(style.clone()).with_prefix(stage)
}

fn show_progress(pb: &ProgressBar) -> impl FnMut(f32, &[f32]) + '_ {
    move |overall: f32, units: &[f32]| {
        pb.set_position((overall * PROGRESS_TICKS as f32) as u64);
        let units: Vec<String> = units.iter().map(|f| format!("{:.2}", f)).collect();
        pb.set_message(units.join(" "));
    }
}

fn print_result(matches: &[SimilarMatch<'_>], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = matches
                .iter()
                .map(|m| {
                    json!({
                        "distance": m.distance,
                        "id": m.record.id,
                        "source": m.record.cutout.source,
                        "bounds": m.record.cutout.bounds,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Table => {
            for m in matches {
                let b = &m.record.cutout.bounds;
                println!(
                    "{:.3}\t{}\trows {}..{}\tcols {}..{}",
                    m.distance, m.record.cutout.source, b.row_min, b.row_max, b.col_min, b.col_max
                );
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let opts = Opts::parse();

    let ctx = PipelineContext::new(pipeline_config(&opts)?)?;
    let extractor = ExtractorConfig::load_parameters(&opts.extractor)?;

    let mut similarity = SimilarityConfig::new(opts.strategy.clone());
    similarity.tsne.seed = opts.seed;
    if let Some(iterations) = opts.iterations {
        similarity.tsne.iterations = iterations;
    }
    // fail on a bad strategy before spending time on fingerprints
    SimilarityEngine::from_config(&similarity)?;

    let cutouts = Cutout::tile(&opts.source, opts.rows, opts.cols, opts.stepsize);
    info!("Tiled {} into {} cutouts", opts.source, cutouts.len());

    let style = pb_style()?;
    let source = Arc::new(SyntheticPatchSource::new(opts.seed.unwrap_or_default()));
    let pb = stage_bar("fingerprints", &style);
    let records = calculate_distributed(&ctx, cutouts, &extractor, source, show_progress(&pb))?;
    pb.finish();

    let pb = stage_bar("similarity", &style);
    let engine = similarity_distributed(&ctx, records, &similarity, show_progress(&pb))?;
    pb.finish();

    let index = engine.index().context("similarity index missing")?;
    if index.is_empty() {
        println!("No cutouts fit in a {}x{} image", opts.rows, opts.cols);
        return Ok(());
    }

    let query = if !opts.query.is_empty() {
        opts.query.clone()
    } else {
        match &engine {
            SimilarityEngine::EmbeddingProjection(_) => index.coordinates()[0].to_vec(),
            _ => index.records()[0].feature_vector.clone(),
        }
    };

    let matches = engine.find_similar(&query, opts.neighbors)?;
    print_result(&matches, opts.format)
}
