use clap::{Parser, Subcommand};
use liveheic::config::{self, Config};
use liveheic::engine::{self, EngineKind, Quality};
use liveheic::pairing::{DuplicatePolicy, InputFile};
use liveheic::session::{CancelToken, Session, SessionOptions};
use liveheic::unit::UnitStatus;
use liveheic::{output, report};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "liveheic")]
#[command(about = "Live Photo pairing and HEIC to JPEG batch conversion")]
#[command(long_about = "\
Live Photo pairing and HEIC to JPEG batch conversion

Inputs are image and video files. An image and a video sharing a base name
(IMG_0001.HEIC + IMG_0001.MOV) form one Live Photo unit that is converted
and exported together. Recognized extensions:

  images: heic heif jpg jpeg png webp
  videos: mov mp4

HEIC/HEIF images are decoded to JPEG by a conversion engine: the ImageMagick
CLI (magick or convert on PATH) by default, or a built-in libheif decoder
when compiled with --features libheif. Other recognized images pass through
unchanged; videos are never transcoded.

  liveheic convert ~/import              # convert a directory
  liveheic convert a.heic a.mov b.jpg    # convert specific files
  liveheic pair ~/import                 # preview the grouping only

Run 'liveheic gen-config' to generate a documented liveheic.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./liveheic.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Clone)]
struct ConvertArgs {
    /// Files or directories to convert (directories are walked recursively)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory for converted files
    #[arg(long, default_value = "converted")]
    out: PathBuf,

    /// JPEG quality, 1-100
    #[arg(long)]
    quality: Option<u8>,

    /// Handling of inputs whose base name collides
    #[arg(long, value_enum)]
    duplicates: Option<DuplicatePolicy>,

    /// Conversion engine
    #[arg(long, value_enum)]
    engine: Option<EngineKind>,

    /// Re-run failed units up to N extra rounds
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Maximum parallel workers (default: CPU cores)
    #[arg(long)]
    jobs: Option<usize>,

    /// Print a JSON batch report instead of per-unit lines
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Convert inputs, pairing Live Photo videos with their images
    Convert(ConvertArgs),
    /// Preview how inputs group into units, without converting
    Pair {
        /// Files or directories to group
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Print a stock liveheic.toml with all options documented
    GenConfig,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run() {
        eprintln!("Error: {}", error);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => config::load_config_file(path)?,
        None => config::load_config(Path::new("."))?,
    };

    match cli.command {
        Command::Convert(args) => run_convert(args, config),
        Command::Pair { inputs } => run_pair(&inputs, &config),
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(())
        }
    }
}

fn run_convert(args: ConvertArgs, mut config: Config) -> Result<(), Box<dyn std::error::Error>> {
    // Flags override config values.
    if let Some(quality) = args.quality {
        config.convert.quality = quality;
    }
    if let Some(duplicates) = args.duplicates {
        config.convert.duplicates = duplicates;
    }
    if let Some(kind) = args.engine {
        config.engine.kind = kind;
    }
    if let Some(jobs) = args.jobs {
        config.processing.max_processes = Some(jobs);
    }
    config.validate()?;

    if config.engine.kind == EngineKind::Libheif && cfg!(not(feature = "libheif")) {
        return Err("engine 'libheif' requires a build with --features libheif".into());
    }

    init_thread_pool(&config.processing);

    let mut session = Session::new(
        engine::discover(config.engine.kind),
        SessionOptions {
            quality: Quality::new(config.convert.quality),
            duplicates: config.convert.duplicates,
        },
    );
    session.add_files(read_inputs(&args.inputs)?)?;
    if session.units().is_empty() {
        return Err("no image or video inputs recognized".into());
    }

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.cancel())?;
    }

    // Line output streams from a printer thread as events arrive; --json
    // stays silent until the final report.
    let (observer, printer) = if args.json {
        (None, None)
    } else {
        let (tx, rx) = std::sync::mpsc::channel();
        let printer = std::thread::spawn(move || {
            for event in rx {
                output::print_convert_event(&event);
            }
        });
        (Some(tx), Some(printer))
    };

    session.convert_all(observer.clone(), Some(&cancel));
    for round in 1..=args.retries {
        if cancel.is_cancelled() {
            break;
        }
        let failed = session
            .units()
            .iter()
            .filter(|u| u.status == UnitStatus::Error)
            .count();
        if failed == 0 {
            break;
        }
        tracing::info!("retry round {round}: {failed} failed units");
        session.retry_failed(observer.clone(), Some(&cancel));
    }
    drop(observer);
    if let Some(printer) = printer {
        printer.join().unwrap();
    }

    let written = output::write_artifacts(session.units(), &args.out)?;

    let batch = report::BatchReport::from_units(session.units());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&batch)?);
    } else {
        output::print_batch_summary(&batch);
        if !written.is_empty() {
            println!("Wrote {} files to {}", written.len(), args.out.display());
        }
    }

    if batch.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_pair(inputs: &[PathBuf], config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::new(
        None,
        SessionOptions {
            quality: Quality::new(config.convert.quality),
            duplicates: config.convert.duplicates,
        },
    );
    session.add_files(read_inputs(inputs)?)?;
    if session.units().is_empty() {
        println!("No image or video inputs recognized.");
        return Ok(());
    }
    output::print_pair_output(session.units());
    Ok(())
}

/// Read every input into memory as named byte buffers.
///
/// Directories are walked recursively; their files keep the path relative
/// to the walked directory as their name, so nested names survive into
/// exported artifacts.
fn read_inputs(paths: &[PathBuf]) -> Result<Vec<InputFile>, Box<dyn std::error::Error>> {
    let mut inputs = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let name = entry
                    .path()
                    .strip_prefix(path)?
                    .to_string_lossy()
                    .into_owned();
                inputs.push(InputFile::new(name, std::fs::read(entry.path())?));
            }
        } else {
            let name = path
                .file_name()
                .ok_or_else(|| format!("not a file: {}", path.display()))?
                .to_string_lossy()
                .into_owned();
            inputs.push(InputFile::new(name, std::fs::read(path)?));
        }
    }
    Ok(inputs)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the available CPU cores; config can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
