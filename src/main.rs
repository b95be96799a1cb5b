//! Binary entrypoint for the tradebench CLI.
//!
//! Commands:
//! - `start [--player <name>]` - run the interactive harness on stdin/stdout
//! - `init` - write a starter `config.toml`
//! - `status` - print the configured containers, autosave schedule and wares
//!
//! See the library crate docs for module-level details: `tradebench::`.
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::io::BufReader;

use tradebench::config::Config;
use tradebench::harness::{Harness, Repl};
use tradebench::inventory::ContainerId;
use tradebench::market::{LocalMarket, SharedMarket};

#[derive(Parser)]
#[command(name = "tradebench")]
#[command(about = "Terminal test harness for a marketplace engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive harness
    Start {
        /// Play as this player instead of the configured one
        #[arg(short, long)]
        player: Option<String>,
    },
    /// Write a default configuration file
    Init,
    /// Show the configured harness setup
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { player } => {
            let (mut config, config_path) = load_or_default(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            info!("Starting tradebench v{}", env!("CARGO_PKG_VERSION"));

            if let Some(name) = player {
                config.harness.player_name = name;
                config.validate()?;
            }

            let market = LocalMarket::open(config.market.clone(), config_path.clone())?;
            let harness = Harness::new(config, config_path, SharedMarket::new(market));
            let mut repl = Repl::new(harness).interactive(atty::is(atty::Stream::Stdin));

            let stdin = BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            repl.run(stdin, &mut stdout).await?;
        }
        Commands::Init => {
            init_logging(&None, cli.verbose);
            if tokio::fs::try_exists(&cli.config).await.unwrap_or(false) {
                warn!("{} already exists; leaving it untouched", cli.config);
                return Ok(());
            }
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Status => {
            let (config, _) = load_or_default(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            print_status(&config);
        }
    }

    Ok(())
}

/// The config at `path`, or defaults when the file does not exist yet.
async fn load_or_default(path: &str) -> Result<(Config, Option<PathBuf>)> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        Ok((Config::load(path).await?, Some(PathBuf::from(path))))
    } else {
        eprintln!("{} not found; using built-in defaults (run `tradebench init` to create it)", path);
        Ok((Config::default(), None))
    }
}

fn print_status(config: &Config) {
    println!("tradebench v{}", env!("CARGO_PKG_VERSION"));
    println!("Player: {}", config.harness.player_name);
    println!("Containers:");
    for id in ContainerId::ALL {
        let capacity = if id == ContainerId::Local {
            config.inventory.self_capacity
        } else {
            config.inventory.neighbor_capacity
        };
        println!("  {:<6} {} at {} - {} item types", id.name(), id, id.coordinate(), capacity);
    }
    if config.autosave.enabled {
        println!(
            "Autosave: every {}s, on exit: {:?}",
            config.autosave.interval_secs, config.autosave.save_on_exit
        );
    } else {
        println!("Autosave: disabled");
    }
    println!(
        "Market: {} wares, data in {}, research {}",
        config.market.wares.len(),
        config.market.data_dir,
        if config.market.research_enabled() {
            format!("${:.2}", config.market.research_cost.unwrap_or_default())
        } else {
            "disabled".to_string()
        }
    );
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|file| std::fs::OpenOptions::new().create(true).append(true).open(file).ok());

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Piped runs keep the console clean; everything still reaches the file
        let is_tty = atty::is(atty::Stream::Stdout);

        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());

            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }

            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
