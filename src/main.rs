use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use parking_lot::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;

use voxseg::{
    LabelMap, Palette, RenderMode, Renderer, ViewSession, Volume, VolumeConfig, VolumeLoader,
};

#[derive(Parser)]
#[command(name = "voxseg", version, about = "Import, render and export segmented image-stack volumes")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Render worker threads (overrides the configuration)
    #[arg(short = 'j', long, global = true)]
    threads: Option<usize>,

    /// Verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a directory of slices and persist it as <outbase>.json/.data
    Import(ImportArgs),
    /// Print the dimensions and provenance of a persisted volume
    Info(InfoArgs),
    /// Render a persisted volume to an image
    Render(RenderArgs),
    /// Write a label dump as `x y z id` lines
    Export(ExportArgs),
}

#[derive(Args)]
struct ImportArgs {
    /// Directory holding the slices
    source: PathBuf,
    /// Output base path
    outbase: PathBuf,
}

#[derive(Args)]
struct InfoArgs {
    /// Metadata file written by `import`
    metadata: PathBuf,
}

#[derive(Args)]
struct RenderArgs {
    /// Metadata file written by `import`
    metadata: PathBuf,
    /// Output image
    output: PathBuf,

    #[arg(long, default_value = "512")]
    width: u32,

    #[arg(long, default_value = "512")]
    height: u32,

    #[arg(short, long, value_enum)]
    mode: Option<RenderMode>,

    /// Raw label dump to overlay
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Volume voxels per label cell (overrides the configuration)
    #[arg(long)]
    idfactor: Option<u32>,

    /// Label to center the view on
    #[arg(long)]
    center_on: Option<u16>,
}

#[derive(Args)]
struct ExportArgs {
    /// Metadata file of the labelled volume
    metadata: PathBuf,
    /// Raw label dump
    labels: PathBuf,
    /// Output text file
    output: PathBuf,

    #[arg(long)]
    idfactor: Option<u32>,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(cli: &Cli) -> Result<VolumeConfig> {
    let mut config = match &cli.config {
        Some(path) => VolumeConfig::from_json_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => VolumeConfig::default(),
    };
    if let Some(threads) = cli.threads {
        config.worker_threads = threads;
    }
    Ok(config)
}

fn load_labels(path: &Path, volume: &Volume, idfactor: u32) -> Result<LabelMap> {
    let dim = LabelMap::for_volume(volume, idfactor).dim();
    LabelMap::load(path, dim, idfactor)
        .with_context(|| format!("Failed to read labels {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Import(args) => {
            let mut volume = Volume::default();
            volume
                .import_dir(&args.source, &config)
                .with_context(|| format!("Failed to import {}", args.source.display()))?;
            let (json, data) = volume.persist(&args.outbase)?;
            info!(json = %json.display(), data = %data.display(), "import complete");
        }
        Commands::Info(args) => {
            let volume = VolumeLoader::load(&args.metadata, &config)?;
            if let Some(meta) = volume.metadata() {
                println!("{} x {} x {}", meta.width, meta.height, meta.depth);
                println!("source:   {}", meta.source.display());
                println!("outbase:  {}", meta.outbase.display());
                println!("imported: {}", meta.import_date.to_rfc3339());
                for (label, name) in &meta.names {
                    println!("  #{label}: {name}");
                }
            }
        }
        Commands::Render(args) => {
            let mut config = config.clone();
            if let Some(mode) = args.mode {
                config.render_mode = mode;
            }
            let idfactor = args.idfactor.unwrap_or(config.id_factor).max(1);
            let volume = VolumeLoader::load(&args.metadata, &config)?;
            let renderer = Renderer::new(&config)?;

            let mut session = ViewSession::new(args.width, args.height, &config);
            session.center_on_volume(&volume);
            if let Some(path) = &args.labels {
                let labels = load_labels(path, &volume, idfactor)?;
                session.attach_labels(std::sync::Arc::new(RwLock::new(labels)));
                if let Some(label) = args.center_on {
                    session.center_on(label);
                }
            }

            let image = session.render(&renderer, &volume, &mut Palette::new());
            image
                .save(&args.output)
                .with_context(|| format!("Failed to write {}", args.output.display()))?;
            info!(output = %args.output.display(), "render complete");
        }
        Commands::Export(args) => {
            let idfactor = args.idfactor.unwrap_or(config.id_factor).max(1);
            let volume = VolumeLoader::load(&args.metadata, &config)?;
            let labels = load_labels(&args.labels, &volume, idfactor)?;
            let lines = labels.export(&args.output)?;
            println!("Exported {lines} cells to {}", args.output.display());
        }
    }

    Ok(())
}
