mod png_volume;
mod synthetic;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, ensure};
use clap::Parser;
use common::log_setup::setup_logging;
use common::FloatExt;
use mutual_info::unpack::spawn_feed;
use mutual_info::{software_mi, MiConfig, MutualInfoKernel, Volume};
use tracing::{debug, info};

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Computes the mutual information of two volumes with the streaming pipeline and checks it against the software reference."
)]
struct Args {
    /// Pipeline configuration file (yaml, json or toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the reference slices IM1.png, IM2.png, ...
    /// A synthetic phantom is used when omitted.
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Directory holding the floating slices, defaults to the reference directory
    #[arg(long)]
    floating: Option<PathBuf>,

    /// Number of slices to process, clamped to the configured maximum
    #[arg(short, long, default_value_t = 32)]
    n_couples: u32,

    /// Overrides the configured slice dimension
    #[arg(long)]
    dimension: Option<usize>,

    /// In-plane shift of the synthetic floating volume, in pixels
    #[arg(long, default_value_t = 3)]
    shift: i64,

    /// Seed of the synthetic phantom
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Pipeline repetitions used for timing
    #[arg(long, default_value_t = 1)]
    runs: usize,

    /// Largest accepted difference between pipeline and software results
    #[arg(long, default_value_t = 1e-4)]
    tolerance: f64,

    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

fn load_volumes(args: &Args, config: &MiConfig, n_couples: usize) -> anyhow::Result<(Volume, Volume)> {
    match &args.reference {
        Some(reference_dir) => {
            let floating_dir = args.floating.as_deref().unwrap_or(reference_dir);
            info!(
                reference = %reference_dir.display(),
                floating = %floating_dir.display(),
                "reading slices"
            );
            let reference = png_volume::read_volume(reference_dir, config.dimension, n_couples)?;
            let floating = png_volume::read_volume(floating_dir, config.dimension, n_couples)?;
            Ok((reference, floating))
        }
        None => {
            info!(seed = args.seed, shift = args.shift, "using a synthetic phantom");
            let reference = synthetic::phantom(config.dimension, n_couples, args.seed);
            let floating = synthetic::translated(&reference, args.shift, args.shift);
            Ok((reference, floating))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level, &args.log_dir)?;

    let mut config = match &args.config {
        Some(path) => MiConfig::load(path)?,
        None => MiConfig::default(),
    };
    if let Some(dimension) = args.dimension {
        config.dimension = dimension;
    }
    config.validate()?;

    let n_couples = config.clamp_couples(args.n_couples);
    let padding = config.padding(n_couples);
    let stream_couples = n_couples + padding;
    ensure!(
        stream_couples <= config.max_couples,
        "{n_couples} slices plus {padding} padding exceed the maximum of {}",
        config.max_couples
    );
    info!(
        dimension = config.dimension,
        partitions = config.partitions,
        entropy_pe = config.entropy_pe,
        precision = %config.precision,
        n_couples,
        padding,
        "configuration"
    );

    let (reference, floating) = load_volumes(&args, &config, n_couples as usize)?;
    let reference = reference.padded(stream_couples as usize);
    let floating = floating.padded(stream_couples as usize);

    let layout = config.sample_layout();
    let reference_words = reference.pack(layout);
    let floating_words = floating.pack(layout);
    let depth = config.stream_depth;

    let mut kernel = MutualInfoKernel::new(config)?;
    let mut pipeline_mi = 0.0f32;
    let mut pipeline_time = Duration::ZERO;
    for run in 0..args.runs.max(1) {
        let start = Instant::now();
        let (feed, stream) = spawn_feed("floating", floating_words.clone(), depth);
        pipeline_mi = kernel.run(stream, &reference_words, stream_couples).await?;
        feed.await??;
        let elapsed = start.elapsed();
        pipeline_time += elapsed;
        debug!(run, mi = pipeline_mi, ?elapsed, "pipeline run");
    }
    let pipeline_time = pipeline_time / args.runs.max(1) as u32;

    let start = Instant::now();
    let software = software_mi(reference.voxels(), floating.voxels());
    let software_time = start.elapsed();

    let error = (software.mutual_information - pipeline_mi as f64).abs();
    println!("Software MI: {:.6} ({software_time:?})", software.mutual_information);
    println!("  H(reference) {:.6}", software.reference_entropy);
    println!("  H(floating)  {:.6}", software.floating_entropy);
    println!("  H(joint)     {:.6}", software.joint_entropy);
    println!("Pipeline MI: {pipeline_mi:.6} ({pipeline_time:?} average over {} runs)", args.runs.max(1));
    println!("Error: {error:.3e}");

    if !(pipeline_mi as f64).within(software.mutual_information, args.tolerance) {
        bail!(
            "pipeline MI {pipeline_mi} differs from software MI {} by {error:.3e}",
            software.mutual_information
        );
    }
    info!("pipeline result verified");
    Ok(())
}
