use clap::{Parser, Subcommand};
use photo_tidy::{config, library, output, process};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Flags shared by commands that read a library.
#[derive(clap::Args, Clone)]
struct LibraryArgs {
    /// Library to read [config: library.input]
    #[arg(long)]
    input: Option<PathBuf>,

    /// Only look at a random subset of this many images [config: library.sample_size]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    sample: Option<u64>,

    /// Size budget per image in megabytes [config: compression.target_size_mb]
    #[arg(long)]
    target_size_mb: Option<f64>,
}

#[derive(clap::Args, Clone)]
struct ProcessArgs {
    #[command(flatten)]
    library: LibraryArgs,

    /// Output root [config: library.output]
    #[arg(long)]
    output: Option<PathBuf>,

    /// Lowest quality the search may reach [config: compression.min_quality]
    #[arg(long)]
    min_quality: Option<u32>,

    /// Quality drop between attempts [config: compression.quality_step]
    #[arg(long)]
    quality_step: Option<u32>,

    /// Per-image compression budget in seconds [config: compression.timeout_seconds]
    #[arg(long)]
    timeout_seconds: Option<f64>,

    /// Keep existing files in the output directory
    #[arg(long)]
    no_clean: bool,

    /// Write the per-image report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Parser)]
#[command(name = "photo-tidy")]
#[command(about = "Shrink oversized photos and sort a library by GPS presence")]
#[command(long_about = "\
Shrink oversized photos and sort a library by GPS presence

Images within the size budget are copied unchanged. Larger ones are
re-encoded as JPEG at decreasing quality until they fit, keeping their EXIF.
Re-encoded files keep their original name, so an oversized PNG, BMP, GIF or
TIFF comes out as JPEG data under its old extension.

Output layout:

  processed-photos/
  ├── IMG_0001.JPG                 # Geotagged
  ├── missing-locations/
  │   └── IMG_0002.PNG             # No GPS latitude in EXIF
  └── problem-photos/
      └── IMG_0003.JPG             # Partial encode that ran out of time;
                                   # the original sits in the bucket above

Set RUST_LOG (e.g. RUST_LOG=photo_tidy=debug) for more detail on stderr.

Run 'photo-tidy gen-config' to generate a documented photo-tidy.toml.")]
#[command(version)]
struct Cli {
    /// Config file [default: ./photo-tidy.toml when present]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarise a library: image count, size, GPS coverage
    Inspect(LibraryArgs),
    /// Copy or compress every image into the bucketed output tree
    Process(ProcessArgs),
    /// Print a stock photo-tidy.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::Inspect(args) => {
            let mut config = load_config(cli.config.as_deref())?;
            apply_library_args(&mut config, &args);
            config.validate()?;
            init_thread_pool(&config.processing);

            let table = library::inspect(&config.library.input, config.library.sample_size)?;
            output::print_inspect_summary(
                &table,
                &config.library.input,
                config.compression.target_size_mb,
            );
        }
        Command::Process(args) => {
            let mut config = load_config(cli.config.as_deref())?;
            apply_process_args(&mut config, &args);
            config.validate()?;
            init_thread_pool(&config.processing);

            let params = process::LibraryParams::from_config(&config);
            let input = &config.library.input;
            let out_dir = &config.library.output;

            let start = Instant::now();
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_process_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = process::process_library(input, out_dir, &params, Some(tx));
            printer.join().ok();
            let report = result?;
            let elapsed = start.elapsed();

            println!();
            output::print_process_summary(&report);

            let processed = library::inspect(out_dir, None)?;
            output::print_size_reduction(
                report.source_size_mb,
                processed.total_size_mb(),
                report.inspected,
                elapsed,
            );

            if let Some(path) = &args.report {
                let json = serde_json::to_string_pretty(&report)?;
                std::fs::write(path, json)?;
                tracing::info!(path = %path.display(), "report written");
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load `--config`, or `photo-tidy.toml` from the working directory.
fn load_config(path: Option<&Path>) -> Result<config::Config, Box<dyn std::error::Error>> {
    Ok(config::load_config(path, &std::env::current_dir()?)?)
}

/// Install the stderr log subscriber. `RUST_LOG` wins over the default filter.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("photo_tidy=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn apply_library_args(config: &mut config::Config, args: &LibraryArgs) {
    if let Some(input) = &args.input {
        config.library.input = input.clone();
    }
    if let Some(sample) = args.sample {
        config.library.sample_size = Some(sample as usize);
    }
    if let Some(target) = args.target_size_mb {
        config.compression.target_size_mb = target;
    }
}

fn apply_process_args(config: &mut config::Config, args: &ProcessArgs) {
    apply_library_args(config, &args.library);
    if let Some(output) = &args.output {
        config.library.output = output.clone();
    }
    if let Some(q) = args.min_quality {
        config.compression.min_quality = q;
    }
    if let Some(step) = args.quality_step {
        config.compression.quality_step = step;
    }
    if let Some(timeout) = args.timeout_seconds {
        config.compression.timeout_seconds = timeout;
    }
    if args.no_clean {
        config.library.clean_output = false;
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
