use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use txcdr::normalizer::normalize_dir;
use txcdr::scraper::{FetchOptions, WebScraper};

#[derive(Parser)]
#[command(name = "txcdr")]
#[command(about = "Texas custodial death report scraper", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct PagesArgs {
    #[arg(
        long,
        value_name = "DIR",
        default_value = txcdr::DEFAULT_PAGES_DIR,
        help = "Directory holding the saved listing pages"
    )]
    pages_dir: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct OutputArgs {
    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        default_value = txcdr::DEFAULT_OUTPUT_FILE,
        help = "CSV file to write (overwritten)"
    )]
    output: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct BrowserArgs {
    #[arg(long, help = "Show the browser window instead of running headless")]
    headed: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the report listing in a browser and save each table page
    Fetch {
        #[command(flatten)]
        pages: PagesArgs,
        #[command(flatten)]
        browser: BrowserArgs,
    },
    /// Turn previously saved pages into the sorted CSV dataset
    Normalize {
        #[command(flatten)]
        pages: PagesArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Fetch, then normalize (the default)
    Run {
        #[command(flatten)]
        pages: PagesArgs,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        browser: BrowserArgs,
    },
}

async fn fetch(scraper: &WebScraper, pages_dir: &Path, headed: bool) {
    let options = FetchOptions {
        headed,
        ..Default::default()
    };

    let total = scraper
        .fetch_pages(pages_dir, &options)
        .await
        .unwrap_or_else(|e| {
            log::error!("Error fetching listing pages: {}", e);
            process::exit(1);
        });

    log::info!("Listing reports {} records in total", total);
}

async fn normalize(scraper: &WebScraper, pages_dir: &Path, output: &Path) {
    let fips = scraper.fetch_fips_lookup().await.unwrap_or_else(|e| {
        log::error!("Error fetching FIPS reference: {}", e);
        process::exit(1);
    });

    normalize_dir(pages_dir, output, &fips).unwrap_or_else(|e| {
        log::error!("Error normalizing pages: {}", e);
        process::exit(1);
    });
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    let scraper = WebScraper::new().unwrap_or_else(|e| {
        log::error!("Error creating scraper: {}", e);
        process::exit(1);
    });

    let command = cli.command.unwrap_or_else(|| Commands::Run {
        pages: PagesArgs {
            pages_dir: PathBuf::from(txcdr::DEFAULT_PAGES_DIR),
        },
        output: OutputArgs {
            output: PathBuf::from(txcdr::DEFAULT_OUTPUT_FILE),
        },
        browser: BrowserArgs { headed: false },
    });

    match command {
        Commands::Fetch { pages, browser } => {
            fetch(&scraper, &pages.pages_dir, browser.headed).await;
        }
        Commands::Normalize { pages, output } => {
            normalize(&scraper, &pages.pages_dir, &output.output).await;
        }
        Commands::Run {
            pages,
            output,
            browser,
        } => {
            fetch(&scraper, &pages.pages_dir, browser.headed).await;
            normalize(&scraper, &pages.pages_dir, &output.output).await;
        }
    }
}
