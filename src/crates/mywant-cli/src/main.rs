//! `mywant`: the CLI collaborator for the MyWant orchestrator.
//!
//! Every subcommand but `start` proxies to a running `mywant-server` over
//! HTTP via `reqwest`. `start` launches the server in-process instead of
//! shelling out, so a single binary is enough to try the whole system.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod client;
mod commands;

#[derive(Parser)]
#[command(name = "mywant")]
#[command(about = "MyWant CLI - manage a declarative dataflow orchestrator", long_about = None)]
#[command(version)]
struct Cli {
    /// Base URL of the running `mywant-server` (env: MYWANT_SERVER).
    #[arg(long, env = "MYWANT_SERVER", default_value = "http://127.0.0.1:8080", global = true)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the HTTP control plane in this process.
    Start {
        /// Override SERVER (host:port); defaults to the server's own env resolution.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Manage wants.
    Wants {
        #[command(subcommand)]
        command: WantsCommand,
    },

    /// Manage recipe templates.
    Recipes {
        #[command(subcommand)]
        command: RecipesCommand,
    },
}

#[derive(Subcommand)]
enum WantsCommand {
    /// List wants, optionally filtered.
    List {
        #[arg(long = "type")]
        type_name: Option<String>,
        /// Repeatable `key=value` label filter.
        #[arg(long = "label")]
        labels: Vec<String>,
        /// Repeatable `key=value` using-selector filter.
        #[arg(long = "using")]
        using: Vec<String>,
    },
    /// Fetch a single want by id.
    Get { id: String },
    /// Create wants from a config file (YAML or JSON, by extension).
    Create { file: PathBuf },
    /// Alias for `create`, named for symmetry with `export`.
    Import { file: PathBuf },
    /// Dump every want as a `Config` document.
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete a want.
    Delete { id: String },
    /// Suspend a want.
    Suspend { id: String },
    /// Resume a suspended want.
    Resume { id: String },
}

#[derive(Subcommand)]
enum RecipesCommand {
    List,
    Get { name: String },
    Create { file: PathBuf },
    Delete { name: String },
}

#[tokio::main]
async fn main() {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    let cli = Cli::parse();
    let result = run(cli).await;
    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Start { bind } => {
            let mut config = mywant_server::ServerConfig::from_env()?;
            if let Some(bind) = bind {
                config.bind_addr = bind.parse()?;
            }
            mywant_server::serve(config).await?;
            Ok(())
        }
        Commands::Wants { command } => {
            let client = client::Client::new(&cli.server);
            match command {
                WantsCommand::List { type_name, labels, using } => {
                    commands::wants::list(&client, type_name, parse_pairs(&labels)?, parse_pairs(&using)?)
                        .await
                }
                WantsCommand::Get { id } => commands::wants::get(&client, &id).await,
                WantsCommand::Create { file } => commands::wants::create(&client, &file).await,
                WantsCommand::Import { file } => commands::wants::create(&client, &file).await,
                WantsCommand::Export { output } => commands::wants::export(&client, output).await,
                WantsCommand::Delete { id } => commands::wants::delete(&client, &id).await,
                WantsCommand::Suspend { id } => commands::wants::suspend(&client, &id).await,
                WantsCommand::Resume { id } => commands::wants::resume(&client, &id).await,
            }
        }
        Commands::Recipes { command } => {
            let client = client::Client::new(&cli.server);
            match command {
                RecipesCommand::List => commands::recipes::list(&client).await,
                RecipesCommand::Get { name } => commands::recipes::get(&client, &name).await,
                RecipesCommand::Create { file } => commands::recipes::create(&client, &file).await,
                RecipesCommand::Delete { name } => commands::recipes::delete(&client, &name).await,
            }
        }
    }
}

fn parse_pairs(pairs: &[String]) -> anyhow::Result<BTreeMap<String, String>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| anyhow::anyhow!("expected key=value, got '{pair}'"))
        })
        .collect()
}
