//! CLI for building and serving an image similarity index

use anyhow::Result;
use clap::{Parser, Subcommand};
use image_retrieval::server::{self, AppState};
use image_retrieval::{
    ArtifactPaths, BuildReport, BuilderConfig, CommandExtractor, ExtractorFeatures,
    FeatureExtractor, FeatureSource, FeatureVector, IndexBuilder, PrecomputedFeatures,
    ServiceContext,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "imgsim")]
#[command(about = "Exact nearest-neighbor image retrieval over precomputed features", long_about = None)]
struct Cli {
    /// Index artifact (vectors)
    #[arg(long, env = "IMGSIM_INDEX_PATH", default_value = "data/features.index", global = true)]
    index_path: PathBuf,

    /// Identifier artifact (filenames, aligned with the index)
    #[arg(long, env = "IMGSIM_IDENTIFIERS_PATH", default_value = "data/identifiers.json", global = true)]
    identifiers_path: PathBuf,

    /// Tracing filter, e.g. "info" or "image_retrieval=debug"
    #[arg(long, env = "IMGSIM_LOG", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a directory of images
    Build {
        /// Directory containing the reference images
        #[arg(long)]
        images_dir: PathBuf,
        /// Directory of precomputed per-image feature files (<stem>.npy)
        #[arg(long, conflicts_with = "extractor_cmd")]
        features_dir: Option<PathBuf>,
        /// Extension of precomputed feature files
        #[arg(long, default_value = "npy")]
        feature_extension: String,
        /// External extractor: reads image bytes on stdin, prints the vector
        #[arg(long)]
        extractor_cmd: Option<String>,
        /// Comma-separated image extensions to admit
        #[arg(long, value_delimiter = ',')]
        extensions: Option<Vec<String>>,
    },
    /// Query the index with a feature vector
    Query {
        /// Query vector as comma-separated values (e.g., "1.0,2.0,3.0")
        query: String,
        /// Number of results to return
        #[arg(short, long, default_value = "5")]
        k: usize,
    },
    /// Show the size and dimension of the persisted index
    Info,
    /// Start the HTTP API server
    Serve {
        /// Address to bind to
        #[arg(long, env = "IMGSIM_ADDR", default_value = "0.0.0.0:8000")]
        addr: String,
        /// External extractor used for image uploads
        #[arg(long, env = "IMGSIM_EXTRACTOR_CMD")]
        extractor_cmd: Option<String>,
    },
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .init();
}

fn run_build<S: FeatureSource>(
    source: S,
    config: BuilderConfig,
    images_dir: &Path,
    paths: &ArtifactPaths,
) -> Result<BuildReport> {
    let builder = IndexBuilder::with_config(source, config);
    Ok(builder.build(images_dir, paths)?)
}

/// Open the persisted pair, pointing at `build` when nothing has been built yet.
fn open_context(paths: ArtifactPaths) -> Result<ServiceContext> {
    if !paths.exist() {
        anyhow::bail!(
            "no index at {} / {}; run `imgsim build` first",
            paths.index.display(),
            paths.identifiers.display()
        );
    }
    Ok(ServiceContext::open(paths)?)
}

fn print_report(report: &BuildReport, paths: &ArtifactPaths) {
    println!(
        "Indexed {} of {} images (dimension {})",
        report.indexed, report.admitted, report.dimension
    );
    if !report.failed.is_empty() {
        println!("Skipped {} images:", report.failed.len());
        for item in &report.failed {
            println!("  - {}: {}", item.identifier, item.reason);
        }
    }
    println!(
        "Saved index to {} and identifiers to {}",
        paths.index.display(),
        paths.identifiers.display()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let paths = ArtifactPaths::new(cli.index_path, cli.identifiers_path);

    match cli.command {
        Commands::Build {
            images_dir,
            features_dir,
            feature_extension,
            extractor_cmd,
            extensions,
        } => {
            let mut config = BuilderConfig::default();
            if let Some(extensions) = extensions {
                config.allowed_extensions = extensions
                    .iter()
                    .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
                    .filter(|ext| !ext.is_empty())
                    .collect();
            }

            // Extraction can block for a long time per image.
            let build_paths = paths.clone();
            let report = tokio::task::spawn_blocking(move || match (features_dir, extractor_cmd) {
                (Some(dir), _) => run_build(
                    PrecomputedFeatures::with_extension(dir, feature_extension),
                    config,
                    &images_dir,
                    &build_paths,
                ),
                (None, Some(cmd)) => run_build(
                    ExtractorFeatures::new(CommandExtractor::parse(&cmd)?),
                    config,
                    &images_dir,
                    &build_paths,
                ),
                (None, None) => anyhow::bail!("either --features-dir or --extractor-cmd is required"),
            })
            .await??;
            print_report(&report, &paths);
        }
        Commands::Query { query, k } => {
            let q: FeatureVector = query.parse()?;
            let context = open_context(paths)?;
            let results = context.retrieve_scored(&q, k)?;

            println!("Top {} results:", results.len());
            for (i, (id, distance)) in results.iter().enumerate() {
                println!("{}. {} (distance: {:.4})", i + 1, id, distance);
            }
        }
        Commands::Info => {
            let context = open_context(paths)?;
            let loaded = context.snapshot();
            println!("Vectors:   {}", loaded.len());
            println!("Dimension: {}", loaded.dimension());
        }
        Commands::Serve {
            addr,
            extractor_cmd,
        } => {
            // Refuse to start on a missing or inconsistent artifact pair.
            let context = open_context(paths)?;
            let extractor = match extractor_cmd {
                Some(cmd) => {
                    let extractor: Arc<dyn FeatureExtractor> = Arc::new(CommandExtractor::parse(&cmd)?);
                    Some(extractor)
                }
                None => None,
            };
            server::start(&addr, AppState::new(context, extractor)).await?;
        }
    }
    Ok(())
}
