use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueHint};

use boardmap_lib::config::{load_config, resolve_config_path, AppConfig, Credentials};
use boardmap_lib::logger::init_logging;
use boardmap_lib::services::{GeoJsonService, ScrapeService};
use boardmap_lib::storage::DataStore;
use boardmap_lib::BoardType;

#[derive(Parser)]
#[command(name = "boardmap", version)]
#[command(about = "Collect climbing board gym locations and build GeoJSON maps", long_about = None)]
struct Cli {
    /// Path to a YAML config file
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Output directory (contains data/ and geojson/)
    #[arg(long, global = true, value_hint = ValueHint::DirPath)]
    output: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Emit JSON logs
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch gym locations from every board and write data/{board}.json
    Scrape {
        /// Only scrape these boards (repeatable)
        #[arg(long = "board", value_name = "KEY")]
        boards: Vec<BoardType>,

        /// Username for both Aurora boards and Moonboard
        #[arg(long, requires = "password")]
        username: Option<String>,

        /// Password for both Aurora boards and Moonboard
        #[arg(long, requires = "username")]
        password: Option<String>,
    },
    /// Convert data/{board}.json into geojson/{board}.geojson
    Convert,
    /// Merge every board GeoJSON into geojson/combined.geojson
    Combine,
}

impl Cli {
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        match self.verbose {
            0 => {}
            1 => config.logging.level = "debug".to_string(),
            _ => config.logging.level = "trace".to_string(),
        }
        if self.json {
            config.logging.json = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref()).context("failed to locate config")?;
    let mut config = load_config(config_path.as_deref()).context("failed to load config")?;
    cli.apply_overrides(&mut config);

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("failed to initialise logging: {e}");
    }
    match &config_path {
        Some(path) => tracing::info!("[Config] 使用配置文件: {}", path.display()),
        None => tracing::info!("[Config] 未找到配置文件，使用默认配置"),
    }
    tracing::debug!("[Config] 输出目录: {}", config.output_dir.display());

    match cli.command {
        Command::Scrape {
            boards,
            username,
            password,
        } => {
            let boards = if boards.is_empty() {
                BoardType::ALL.to_vec()
            } else {
                boards
            };
            let credentials = Credentials::from_env().with_override(username, password);
            let service = ScrapeService::new(&config, &boards).context("failed to build clients")?;
            let report = service.scrape_all(&credentials).await;

            for outcome in &report.boards {
                match &outcome.error {
                    None => println!("{:<22} {:>5} gyms", outcome.board.key(), outcome.gyms),
                    Some(error) => println!("{:<22} FAILED {}", outcome.board.key(), error),
                }
            }
            let failed = report.failed();
            if !failed.is_empty() {
                bail!("{} board(s) failed to scrape", failed.len());
            }
        }
        Command::Convert => {
            let service = GeoJsonService::new(DataStore::with_base_dir(&config.output_dir));
            let report = service.convert_all();

            for outcome in &report.boards {
                match &outcome.error {
                    None => println!("{:<22} {:>5} features", outcome.board.key(), outcome.features),
                    Some(error) => println!("{:<22} FAILED {}", outcome.board.key(), error),
                }
            }
            if report.has_failures() {
                bail!("{} board(s) failed to convert", report.failed().len());
            }
        }
        Command::Combine => {
            let service = GeoJsonService::new(DataStore::with_base_dir(&config.output_dir));
            let summary = service.combine_all().context("failed to combine GeoJSON")?;
            println!(
                "Combined {} features into {}",
                summary.features,
                summary.path.display()
            );
        }
    }

    Ok(())
}
