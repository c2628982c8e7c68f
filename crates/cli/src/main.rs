mod config;
mod error;

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use mcp::ServerConfig;
use runtime::{ExpressionGenerator, ToolHost, ToolRegistry};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{Error, Result};

#[derive(Parser)]
#[command(name = "exprgen")]
#[command(about = "Write rule expressions from natural-language instructions", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./exprgen.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// MCP servers file in the `mcpServers` JSON format
    #[arg(long, global = true)]
    servers: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a new expression
    Generate {
        /// File describing the available fields ("-" for stdin)
        #[arg(short, long)]
        schema: PathBuf,
        /// What the expression should match
        instruction: String,
    },
    /// Rewrite an existing expression
    Modify {
        /// File describing the available fields ("-" for stdin)
        #[arg(short, long)]
        schema: PathBuf,
        /// The expression to change
        #[arg(short, long)]
        expression: String,
        /// How to change it
        instruction: String,
    },
    /// List the tools offered by the configured MCP servers
    Tools,
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Logs go to stderr so stdout carries only the expression.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::discover(cli.config.as_deref())?;
    let servers = server_configs(cli.servers.as_deref().or(config.mcp.servers.as_deref()))?;

    match cli.command {
        Commands::Generate {
            schema,
            instruction,
        } => {
            let schema = read_schema(&schema)?;
            let expression = cmd_generate(&config, servers, &schema, None, &instruction).await?;
            println!("{expression}");
        }
        Commands::Modify {
            schema,
            expression,
            instruction,
        } => {
            let schema = read_schema(&schema)?;
            let expression =
                cmd_generate(&config, servers, &schema, Some(&expression), &instruction).await?;
            println!("{expression}");
        }
        Commands::Tools => cmd_tools(&config, servers).await,
    }
    Ok(())
}

fn server_configs(path: Option<&Path>) -> Result<Vec<ServerConfig>> {
    match path {
        Some(path) => {
            let servers = mcp::load_servers(path)?;
            debug!(path = %path.display(), count = servers.len(), "loaded MCP servers");
            Ok(servers)
        }
        None => Ok(Vec::new()),
    }
}

fn read_schema(path: &Path) -> Result<String> {
    let read = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).map(|_| buf)
    } else {
        std::fs::read_to_string(path)
    };
    read.map_err(|source| Error::Schema {
        path: path.to_path_buf(),
        source,
    })
}

/// Generate, or modify when `current` is given.
async fn cmd_generate(
    config: &Config,
    servers: Vec<ServerConfig>,
    schema: &str,
    current: Option<&str>,
    instruction: &str,
) -> Result<String> {
    // Resolve the backend before spawning any helper process.
    let provider = config.provider()?;
    info!(backend = %provider, "using backend");

    let registry = ToolRegistry::connect_with_timeout(servers, config.mcp.timeout()).await;
    let generator = ExpressionGenerator::new(provider, &registry);

    let result = match current {
        Some(current) => {
            generator
                .modify_expression(schema, current, instruction)
                .await
        }
        None => generator.generate_expression(schema, instruction).await,
    };

    registry.close().await;
    Ok(result?)
}

async fn cmd_tools(config: &Config, servers: Vec<ServerConfig>) {
    let registry = ToolRegistry::connect_with_timeout(servers, config.mcp.timeout()).await;

    if registry.is_empty() {
        println!("No tools available.");
    }
    for spec in registry.specs() {
        let server = registry.server_for(&spec.name).unwrap_or("?");
        if spec.description.is_empty() {
            println!("{} [{server}]", spec.name);
        } else {
            println!("{} [{server}]  {}", spec.name, spec.description);
        }
    }

    registry.close().await;
}
