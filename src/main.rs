use clap::{Parser, Subcommand};
use playbill::imaging::{ImageHandle, ImageServices, OutputFormat};
use playbill::process::{self, Job, Pipeline, ProcessConfig};
use playbill::{config, logging, output};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "playbill")]
#[command(about = "Fetch, trim and thumbnail show posters through a resilient disk cache")]
#[command(long_about = "\
Fetch, trim and thumbnail show posters through a resilient disk cache

Images are fetched from the web archive's closest snapshot first, falling
back to the origin after a bounded number of retries. Every download is
cached on disk, so re-running a batch only touches what is missing.

Each image larger than the thumbnail frame has its uniform border removed
(two passes, for letterboxed posters) before being scaled down to fit.

Environment:
  PLAYBILL_LOG            tracing filter, e.g. \"debug\" or \"playbill=trace\"
  PLAYBILL_DIRECT_FETCH   1/true/yes to skip the web archive

Run 'playbill gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

/// Flags shared by every command that loads configuration.
#[derive(clap::Args)]
struct GlobalArgs {
    /// Directory containing config.toml
    #[arg(long, default_value = ".", global = true)]
    config: PathBuf,

    /// Override the cache root from config.toml
    #[arg(long, global = true)]
    cache_root: Option<PathBuf>,

    /// Fetch origins directly, skipping the web archive
    #[arg(long, global = true)]
    direct: bool,
}

impl GlobalArgs {
    /// config.toml, then PLAYBILL_DIRECT_FETCH, then command-line flags.
    fn resolve(&self) -> Result<config::PlaybillConfig, config::ConfigError> {
        let mut config = config::load_config(&self.config)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        if let Some(root) = &self.cache_root {
            config.cache_root = root.display().to_string();
        }
        if self.direct {
            config.fetch.direct = true;
        }
        logging::init_logging(&config.logging.level);
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Fetch URLs and write thumbnails into a directory
    Fetch {
        /// Image URLs
        #[arg(required = true)]
        urls: Vec<String>,
        /// Output directory for thumbnails and report.json
        #[arg(long)]
        out: PathBuf,
    },
    /// Run a JSON job list ([{"url": ..., "output": ...}])
    Process {
        /// Path to the job list
        jobs: PathBuf,
        /// Where to write the report (default: next to the job list)
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Print geometry, corner colors and the trim result without writing
    Inspect {
        /// Image URL or local path
        target: String,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Fetch { urls, out } => {
            let config = cli.global.resolve()?;
            let format = OutputFormat::from_extension(&config.images.format)?;
            let jobs = process::jobs_for_urls(&urls, &out, format);
            run_batch(&config, jobs, &out.join("report.json"))?;
        }
        Command::Process { jobs, report } => {
            let config = cli.global.resolve()?;
            let report_path = report.unwrap_or_else(|| default_report_path(&jobs));
            let jobs = process::load_jobs(&jobs)?;
            run_batch(&config, jobs, &report_path)?;
        }
        Command::Inspect { target } => {
            let config = cli.global.resolve()?;
            let handle = if is_url(&target) {
                let pipeline = Pipeline::from_config(&config)?;
                ImageHandle::open_url(&pipeline.services, target.as_str())
            } else {
                let services = Arc::new(
                    ImageServices::offline().with_trim_params(config.images.trim_params()),
                );
                ImageHandle::open_path(&services, &target)
            };
            let info = process::inspect(&handle)
                .ok_or_else(|| format!("{target}: image could not be loaded"))?;
            output::print_inspection(&info);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Run jobs, streaming each outcome to stdout, then write the report.
fn run_batch(
    config: &config::PlaybillConfig,
    jobs: Vec<Job>,
    report_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = Pipeline::from_config(config)?;
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for (i, outcome) in rx.iter().enumerate() {
            for line in output::format_outcome(i + 1, &outcome) {
                println!("{}", line);
            }
        }
    });
    let report = process::process(
        &pipeline.services,
        jobs,
        &ProcessConfig::from_config(config),
        Some(tx),
    )?;
    printer
        .join()
        .map_err(|_| "progress printer thread panicked")?;
    report.write(report_path)?;
    println!();
    output::print_summary(&report, Some(&pipeline.fetcher.cache_stats()));
    println!("Report: {}", report_path.display());
    Ok(())
}

fn default_report_path(jobs: &Path) -> PathBuf {
    jobs.with_extension("report.json")
}

fn is_url(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}
