use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use policy_agent::AgentConfig;
use policy_cache::PolicyCacheStore;
use std::path::{Path, PathBuf};

mod commands;
mod logging;
mod utils;

use commands::{cache, config, run, tls, users};
use utils::env_paths;

/// polagent - policy enforcement agent
///
/// Keeps a local copy of the policy authority's policies fresh over a
/// mutually authenticated channel and synchronises users and groups.
#[derive(Parser)]
#[command(name = "polagent")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Agent configuration file
    #[arg(short, long, global = true, env = "POLAGENT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent
    Run {
        /// Refresh once and exit
        #[arg(long)]
        once: bool,
    },

    /// Inspect or clear the local policy cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Read a user/group source file and print the mapping
    Usersync {
        /// Source file (.json, otherwise delimited text)
        file: PathBuf,

        /// Field delimiter for delimited sources
        #[arg(short, long, default_value = ",")]
        delimiter: String,

        /// Also push every entry to the logging sink
        #[arg(long)]
        push: bool,

        /// Output format (json, yaml, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Secure channel diagnostics
    Tls {
        #[command(subcommand)]
        action: TlsAction,
    },

    /// Show the effective configuration
    Config {
        /// Output format (json, yaml, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show the cached snapshot
    Show {
        /// Output format (json, yaml, text)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Include the policies themselves
        #[arg(long)]
        policies: bool,
    },

    /// Remove the cache file
    Clear,
}

#[derive(Subcommand)]
enum TlsAction {
    /// Build the TLS context from the configured stores
    Check {
        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn load_config(explicit: Option<&Path>) -> Result<(PathBuf, AgentConfig)> {
    let path = env_paths::config_path(explicit)?;
    let config = AgentConfig::from_file(&path)?;
    Ok((path, config))
}

#[tokio::main]
async fn main() {
    // .env has to be in place before clap reads POLAGENT_CONFIG
    env_paths::load_dotenv();
    let cli = Cli::parse();

    if let Err(e) = execute(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let config_arg = cli.config.as_deref();

    match cli.command {
        Commands::Run { once } => {
            let (_, agent_config) = load_config(config_arg)?;
            let level = if cli.verbose { "debug" } else { "info" };
            let _guard = match &agent_config.log_dir {
                Some(dir) => Some(logging::init_with_file(dir, level)?),
                None => {
                    logging::init_console(level);
                    None
                }
            };
            run::execute(agent_config, once).await?;
        }
        Commands::Cache { action } => {
            logging::init_console(log_level);
            let (_, agent_config) = load_config(config_arg)?;
            let store = PolicyCacheStore::new(&agent_config.cache_file);
            match action {
                CacheAction::Show { format, policies } => cache::show(&store, format, policies)?,
                CacheAction::Clear => cache::clear(&store)?,
            }
        }
        Commands::Usersync {
            file,
            delimiter,
            push,
            format,
        } => {
            logging::init_console(log_level);
            users::execute(&file, &delimiter, format, push)?;
        }
        Commands::Tls { action } => {
            logging::init_console(log_level);
            let (_, agent_config) = load_config(config_arg)?;
            match action {
                TlsAction::Check { format } => tls::check(&agent_config, format)?,
            }
        }
        Commands::Config { format } => {
            logging::init_console(log_level);
            let (path, agent_config) = load_config(config_arg)?;
            config::show(&path, &agent_config, format)?;
        }
    }

    Ok(())
}
