use clap::{Parser, Subcommand};
use picserve::config::{self, CacheBackend, ServiceConfig};
use picserve::hasher::Hasher;
use picserve::imaging::{ImageBackend, RustBackend};
use picserve::params::{Preset, TransformParams};
use picserve::resolve::Resolver;
use picserve::slug::parse_slug;
use picserve::store::{FilesystemStore, FilesystemStoreOptions, MemoryStore, Store, StoreError};
use picserve::upload::Uploader;
use rayon::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "picserve")]
#[command(about = "On-demand image transformation over content-addressed storage")]
#[command(long_about = "\
On-demand image transformation over content-addressed storage

Originals are stored under the hash of their (normalized) bytes. Retrieval
takes that identifier plus a query string and returns the transformed image,
caching every variant:

  picserve upload photo.jpg                       # prints 9f86d0…0a08
  picserve get 9f86d0…0a08.webp -q 'w=300&h=200&fit=cover' -o thumb.webp
  picserve get /i/9f86d0…0a08.jpg -q 'preset=hero' > hero.jpg

Query parameters:
  w, h, thumbnail      target size (1-8192)
  q | quality          1-100
  format               jpeg | jpg | png | webp | gif | avif
  fit                  cover | contain | fill | inside | outside
  gravity              center | north | south | east | west | northeast |
                       northwest | southeast | southwest | smart
  rotate               0 | 90 | 180 | 270
  flip                 h | v | both
  blur, sharpen        sigma / radius
  grayscale            flag
  preset               thumb | small | medium | large | hero | placeholder

An identifier that was never uploaded resolves to a light-gray PNG placeholder.

Run 'picserve gen-config' to generate a documented picserve.toml.")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./picserve.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store an image and print its identifier
    Upload {
        file: PathBuf,
        /// Print a JSON object instead of the bare identifier
        #[arg(long)]
        json: bool,
    },
    /// Resolve an identifier (or a path ending in <identifier>.<ext>)
    Get {
        slug: String,
        /// Transformation query, e.g. "w=300&format=webp"
        #[arg(short, long, default_value = "")]
        query: String,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Pre-populate the cache for each identifier × variant
    Warm {
        #[arg(required = true)]
        identifiers: Vec<String>,
        /// Preset variant to warm (repeatable)
        #[arg(long = "preset")]
        presets: Vec<Preset>,
        /// Query variant to warm (repeatable)
        #[arg(long = "query")]
        queries: Vec<String>,
    },
    /// Remove a stored original
    Delete { identifier: String },
    /// Print a stock picserve.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            return Ok(());
        }
        _ => load_service_config(cli.config.as_deref())?,
    };
    init_logging(&config.log.level);

    let hasher: Arc<dyn Hasher> = Arc::from(config.hasher.build());
    let backend: Arc<dyn ImageBackend> = Arc::new(RustBackend::new());
    let storage = open_storage(&config)?;

    match cli.command {
        Command::Upload { file, json } => {
            let bytes = std::fs::read(&file)?;
            let uploader = Uploader::new(storage.clone(), hasher, backend, config.upload.limits());
            let identifier = uploader.upload(&bytes)?;
            if json {
                let report = serde_json::json!({
                    "identifier": identifier,
                    "source": file.display().to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{identifier}");
            }
        }
        Command::Get { slug, query, out } => {
            let slug = parse_slug(&slug)?;
            let params = slug.apply_extension(TransformParams::from_query(&query)?);
            let cache = open_cache(&config)?;
            let resolver = Resolver::new(cache.clone(), storage.clone(), hasher, backend);
            let image = resolver.get(&slug.identifier, &params)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, &image.bytes)?;
                    println!(
                        "{} ({}, {} bytes)",
                        path.display(),
                        image.content_type,
                        image.bytes.len()
                    );
                }
                None => std::io::stdout().lock().write_all(&image.bytes)?,
            }
            cache.close()?;
        }
        Command::Warm {
            identifiers,
            presets,
            queries,
        } => {
            let variants = warm_variants(&presets, &queries)?;
            if config.cache.backend == CacheBackend::Memory {
                warn!("memory cache does not outlive this process; warming is a dry run");
            }
            init_thread_pool(&config.processing);
            let cache = open_cache(&config)?;
            let resolver = Resolver::new(cache.clone(), storage.clone(), hasher, backend);

            let jobs: Vec<(&String, &(String, TransformParams))> = identifiers
                .iter()
                .flat_map(|id| variants.iter().map(move |v| (id, v)))
                .collect();
            let failed: usize = jobs
                .par_iter()
                .map(|(id, (label, params))| match resolver.get(id, params) {
                    Ok(image) => {
                        println!("{id} {label}: {} bytes", image.bytes.len());
                        0
                    }
                    Err(e) => {
                        eprintln!("{id} {label}: {e}");
                        1
                    }
                })
                .sum();
            cache.close()?;
            if failed > 0 {
                return Err(format!("{failed} of {} variants failed", jobs.len()).into());
            }
        }
        Command::Delete { identifier } => {
            storage.delete(&identifier)?;
            info!(%identifier, "deleted original");
        }
        // Printed before any config was loaded.
        Command::GenConfig => {}
    }

    storage.close()?;
    Ok(())
}

/// Load `--config`, or `picserve.toml` from the working directory when it
/// exists. An explicit path must exist.
fn load_service_config(path: Option<&Path>) -> Result<ServiceConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) if !path.exists() => {
            Err(format!("config file not found: {}", path.display()).into())
        }
        Some(path) => Ok(config::load_config(path)?),
        None => Ok(config::load_config(Path::new(config::DEFAULT_CONFIG_FILE))?),
    }
}

/// Install the global subscriber: `RUST_LOG` wins over the configured level.
/// Logs go to stderr so `get` can stream image bytes on stdout.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn open_storage(config: &ServiceConfig) -> Result<Arc<dyn Store>, StoreError> {
    let store = FilesystemStore::open(FilesystemStoreOptions::new(&config.storage.path))?;
    Ok(Arc::new(store))
}

fn open_cache(config: &ServiceConfig) -> Result<Arc<dyn Store>, StoreError> {
    match config.cache.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        CacheBackend::Filesystem => {
            let mut options = FilesystemStoreOptions::new(&config.cache.path);
            if let Some(ttl) = config.cache.ttl() {
                options = options.with_ttl(ttl);
            }
            Ok(Arc::new(FilesystemStore::open(options)?))
        }
    }
}

/// Labelled parameter sets to warm. With neither presets nor queries, the
/// bare (web defaults) variant is warmed.
fn warm_variants(
    presets: &[Preset],
    queries: &[String],
) -> Result<Vec<(String, TransformParams)>, Box<dyn std::error::Error>> {
    let mut variants: Vec<(String, TransformParams)> = presets
        .iter()
        .map(|p| {
            (
                format!("preset={p}"),
                TransformParams::default().with_preset(*p).expand_preset(),
            )
        })
        .collect();
    for query in queries {
        variants.push((query.clone(), TransformParams::from_query(query)?));
    }
    if variants.is_empty() {
        variants.push(("(web defaults)".to_string(), TransformParams::default()));
    }
    Ok(variants)
}
