use clap::{Parser, Subcommand};
use lostfound_compress::batch::{self, BatchConfig};
use lostfound_compress::compress::CompressionSettings;
use lostfound_compress::config::{self, CompressorConfig};
use lostfound_compress::imaging::{HeicConverter, MagickConverter, RustSurface};
use lostfound_compress::{logging, output};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "lostfound-compress")]
#[command(about = "Shrink lost-and-found photos to fit the upload limit")]
#[command(long_about = "\
Shrink lost-and-found photos to fit the upload limit

Every image is re-encoded as WebP no larger than the byte budget (0.9 MB by
default). The compressor tries the largest size and best quality first and
steps down until the result fits:

  1024px: q80 → q70 → q60 → q50 → q40
   896px: q80 → ...
   640px: ... → q40 → give up

iPhone HEIC/HEIF photos are converted to JPEG first (needs ImageMagick with
HEIC support on PATH).

Run 'lostfound-compress gen-config' to generate a documented config file.")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./lostfound-compress.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log detail on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress files or directories of images
    Compress {
        /// Image files or directories to compress
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Directory for compressed files
        #[arg(long, default_value = "compressed")]
        output: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the trial sequence for the current config
    Plan,
    /// Validate the config and report HEIC support
    Check,
    /// Print a stock config file with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Command::Compress {
            paths,
            output: output_dir,
            json,
        } => {
            let config = load(cli.config.as_deref())?;
            init_thread_pool(&config.processing);

            let inputs = batch::collect_inputs(&paths)?;
            tracing::info!(files = inputs.len(), "collected inputs");
            let batch_config = BatchConfig {
                settings: CompressionSettings::from_config(&config),
                timeout: config.processing.timeout(),
            };
            let converter = MagickConverter::new(config.heic.converter.clone());

            let (tx, rx) = std::sync::mpsc::channel();
            let show_progress = cli.verbose > 0 && !json;
            let printer = std::thread::spawn(move || {
                for event in rx {
                    if show_progress {
                        for line in output::format_event(&event) {
                            println!("{}", line);
                        }
                    }
                }
            });
            let report = batch::compress_files(
                &RustSurface::new(),
                &converter,
                &inputs,
                &output_dir,
                &batch_config,
                Some(tx),
            )?;
            if printer.join().is_err() {
                tracing::warn!("progress printer panicked");
            }

            if json {
                output::print_report_json(&report)?;
            } else {
                output::print_report(&report);
            }
            if report.failures() > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Plan => {
            let config = load(cli.config.as_deref())?;
            output::print_plan(&CompressionSettings::from_config(&config));
        }
        Command::Check => {
            let config = load(cli.config.as_deref())?;
            println!("==> Config is valid");
            output::print_plan(&CompressionSettings::from_config(&config));
            let converter = MagickConverter::new(config.heic.converter.clone());
            if converter.is_available() {
                println!("HEIC: {} found", converter.program());
            } else {
                println!(
                    "HEIC: {} not found, HEIC/HEIF uploads will fail",
                    converter.program()
                );
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// An explicit `--config` must exist; the default file is optional.
fn load(path: Option<&Path>) -> Result<CompressorConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) if !path.exists() => {
            return Err(format!("config file not found: {}", path.display()).into());
        }
        Some(path) => config::load_config(path)?,
        None => config::load_config(Path::new(config::DEFAULT_CONFIG_FILE))?,
    };
    tracing::debug!(?config, "loaded config");
    Ok(config)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores — user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
