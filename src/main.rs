use clap::{Parser, Subcommand};
use spotpass_config::Config;
use spotpass_registry::Platform;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;

#[derive(Parser)]
#[command(name = "spotpass", about = "Discover and archive SpotPass (BOSS) task content", version)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// More logging; repeat for trace output
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the tasks found in device dumps into the registry
    Ingest {
        /// Platform the dumps come from (ctr, wup)
        #[arg(long, short, value_parser = platform)]
        platform: Platform,
        /// Dump files, or directories of dump files
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Probe every locale to find out which candidate tasks exist
    Discover {
        /// Only this platform (default: both)
        #[arg(long, short, value_parser = platform)]
        platform: Option<Platform>,
        /// Only these apps (default: every app in the registry)
        #[arg(long = "app")]
        apps: Vec<String>,
        /// Candidate task names (default: from configuration)
        #[arg(long = "task")]
        tasks: Vec<String>,
    },
    /// Find the title id of every app that has none yet
    TitleIds {
        /// Only this platform (default: both)
        #[arg(long, short, value_parser = platform)]
        platform: Option<Platform>,
    },
    /// Expand the registry across the locale matrix into the work queue
    Build,
    /// Drain the work queue, archiving manifests and content
    Crawl {
        /// Only this platform (default: both)
        #[arg(long, short, value_parser = platform)]
        platform: Option<Platform>,
        /// Run directory name (default: today's UTC date)
        #[arg(long)]
        run: Option<String>,
    },
    /// Print the URLs a crawl of one app, task and locale would request
    Urls {
        #[arg(long, short, value_parser = platform)]
        platform: Platform,
        app_id: String,
        task: String,
        #[arg(long, default_value = "US")]
        country: String,
        #[arg(long, default_value = "en")]
        language: String,
    },
    /// Show work queue progress
    Status,
}

fn platform(value: &str) -> Result<Platform, String> {
    value.parse().map_err(|_| format!("unknown platform `{value}` (expected `ctr` or `wup`)"))
}

fn init_logging(verbose: u8) {
    let fallback = match verbose {
        0 => "spotpass=info",
        1 => "spotpass=debug",
        _ => "spotpass=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:?}");
            return ExitCode::FAILURE;
        },
    };

    let result = match cli.command {
        Commands::Ingest { platform, paths } => commands::ingest(&config, platform, &paths).await,
        Commands::Discover { platform, apps, tasks } => commands::discover(&config, platform, &apps, &tasks).await,
        Commands::TitleIds { platform } => commands::title_ids(&config, platform).await,
        Commands::Build => commands::build(&config).await,
        Commands::Crawl { platform, run } => commands::crawl(&config, platform, run).await,
        Commands::Urls {
            platform,
            app_id,
            task,
            country,
            language,
        } => commands::urls(&config, platform, &app_id, &task, &country, &language).await,
        Commands::Status => commands::status(&config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}
