//! The `pixelate run` command: discover, pixelate, write PNGs and a report.

use clap::{Args, ValueEnum};
use pixelate_core::output::{save_raster, OutputFormat as CoreOutputFormat};
use pixelate_core::{
    BatchReport, BatchStats, Config, ErrorMode, ImageOutcome, ImageRecord, OutputNamer,
    Pixelator, RasterCodec, ReportWriter, Topology,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Arguments for the `run` command.
///
/// Every option left unset falls back to the config file.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Image file or directory to pixelate
    #[arg(required = true)]
    pub input: PathBuf,

    /// Side length of each square block, in pixels
    #[arg(short, long)]
    pub chunk_size: Option<u32>,

    /// Directory pixelated images are written to
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Appended to each input file stem
    #[arg(long)]
    pub suffix: Option<String>,

    /// How stages map onto worker pools
    #[arg(short, long, value_enum)]
    pub topology: Option<TopologyArg>,

    /// Report failed images and keep going instead of aborting the batch
    #[arg(long)]
    pub recoverable: bool,

    /// Read/decode workers
    #[arg(long)]
    pub ingest_workers: Option<usize>,

    /// Tiling workers (split topology)
    #[arg(long)]
    pub planner_workers: Option<usize>,

    /// Averaging workers
    #[arg(long)]
    pub chunk_workers: Option<usize>,

    /// Reassembly workers
    #[arg(long)]
    pub assembly_workers: Option<usize>,

    /// Max decoded images buffered ahead of the planners (split topology)
    #[arg(long)]
    pub image_queue_capacity: Option<usize>,

    /// Max chunk jobs buffered ahead of the chunk workers
    #[arg(long)]
    pub chunk_queue_capacity: Option<usize>,

    /// Max averaged chunks buffered per image ahead of its assembler
    #[arg(long)]
    pub result_queue_capacity: Option<usize>,

    /// Write a batch report to this file
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Batch report format
    #[arg(long, value_enum)]
    pub report_format: Option<ReportFormat>,
}

/// CLI names for the pipeline topologies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TopologyArg {
    /// Ingest workers also average (two pools)
    Fused,
    /// Ingest, average, assemble (three pools)
    Standard,
    /// Load, plan, average, assemble (four pools)
    Split,
}

impl From<TopologyArg> for Topology {
    fn from(arg: TopologyArg) -> Self {
        match arg {
            TopologyArg::Fused => Topology::Fused,
            TopologyArg::Standard => Topology::Standard,
            TopologyArg::Split => Topology::Split,
        }
    }
}

/// Supported report formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Single JSON document
    Json,
    /// One JSON object per line (newline-delimited)
    Jsonl,
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFormat::Json => write!(f, "json"),
            ReportFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

impl RunArgs {
    /// Layer the command-line overrides onto `config`.
    pub fn apply(&self, config: &mut Config) {
        let pipeline = &mut config.pipeline;
        if let Some(chunk_size) = self.chunk_size {
            pipeline.chunk_size = chunk_size;
        }
        if let Some(topology) = self.topology {
            pipeline.topology = topology.into();
        }
        if self.recoverable {
            pipeline.error_mode = ErrorMode::Recoverable;
        }

        let pools = [
            (self.ingest_workers, &mut pipeline.ingest_workers),
            (self.planner_workers, &mut pipeline.planner_workers),
            (self.chunk_workers, &mut pipeline.chunk_workers),
            (self.assembly_workers, &mut pipeline.assembly_workers),
            (self.image_queue_capacity, &mut pipeline.image_queue_capacity),
            (self.chunk_queue_capacity, &mut pipeline.chunk_queue_capacity),
            (self.result_queue_capacity, &mut pipeline.result_queue_capacity),
        ];
        for (value, slot) in pools {
            if let Some(value) = value {
                *slot = value;
            }
        }

        if let Some(dir) = &self.output_dir {
            config.output.dir = dir.clone();
        }
        if let Some(suffix) = &self.suffix {
            config.output.suffix = suffix.clone();
        }
        if let Some(format) = self.report_format {
            config.output.report_format = format.to_string();
        }
    }
}

/// Execute the run command.
pub async fn execute(args: RunArgs, mut config: Config) -> anyhow::Result<()> {
    args.apply(&mut config);
    let pixelator = Pixelator::new(config)?;

    let files = pixelator.discover(&args.input);
    if files.is_empty() {
        tracing::warn!("No supported image files found at {:?}", args.input);
        return Ok(());
    }
    tracing::info!("Found {} image(s) to pixelate", files.len());

    let progress = create_progress_bar(files.len() as u64);
    let bar = progress.clone();
    let start_time = Instant::now();
    let result = pixelator
        .process_batch_async(files, move |completed, _total| {
            bar.set_position(completed as u64);
            let elapsed = start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                bar.set_message(format!("{:.1} img/sec", completed as f64 / elapsed));
            }
        })
        .await;
    progress.finish_and_clear();
    let report = result?.into_ordered();

    let config = pixelator.config();
    let output_dir = config.output_dir();
    let mut namer = OutputNamer::new(&output_dir, config.output.suffix.as_str());
    let records = write_outputs(&report, pixelator.pipeline().codec(), &mut namer)?;

    if let Some(report_path) = &args.report {
        let format = CoreOutputFormat::parse(&config.output.report_format)
            .unwrap_or(CoreOutputFormat::Json);
        write_report(report_path, format, config.output.pretty, &records, &report.stats)?;
        tracing::info!("Report written to {:?}", report_path);
    }

    print_summary(&report.stats, &output_dir);
    Ok(())
}

/// Save every pixelated raster and build one report record per outcome.
fn write_outputs(
    report: &BatchReport,
    codec: &dyn RasterCodec,
    namer: &mut OutputNamer,
) -> anyhow::Result<Vec<ImageRecord>> {
    report
        .outcomes
        .iter()
        .map(|outcome| -> anyhow::Result<ImageRecord> {
            let output = match outcome {
                ImageOutcome::Pixelated(image) => {
                    let path = namer.name(image.index, &image.path);
                    save_raster(codec, &image.raster, &path)?;
                    tracing::debug!("Wrote {:?}", path);
                    Some(path)
                }
                ImageOutcome::Failed { path, error, .. } => {
                    tracing::error!("Failed: {:?} - {}", path, error);
                    None
                }
            };
            Ok(ImageRecord::from_outcome(outcome, output))
        })
        .collect()
}

fn write_report(
    path: &Path,
    format: CoreOutputFormat,
    pretty: bool,
    records: &[ImageRecord],
    stats: &BatchStats,
) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let mut writer = ReportWriter::new(BufWriter::new(file), format, pretty);
    writer.write_report(records, stats)?;
    Ok(())
}

fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("##-"));
    }
    pb.set_message("starting...");
    pb
}

/// Print a formatted summary table after the batch.
fn print_summary(stats: &BatchStats, output_dir: &Path) {
    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Pixelated:    {:>8}", stats.succeeded);
    if stats.failed > 0 {
        eprintln!("    Failed:       {:>8}", stats.failed);
    }
    eprintln!("    Chunks:       {:>8}", stats.chunks);
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", stats.images);
    eprintln!("    Duration:     {:>7.1}s", stats.elapsed_ms as f64 / 1000.0);
    eprintln!("    Rate:         {:>7.1} img/sec", stats.images_per_second);
    eprintln!("  ====================================");
    eprintln!("    Output: {}", output_dir.display());
}
