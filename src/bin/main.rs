use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use lsp_semcache::config::{ClientConfig, ConfigError};
use lsp_semcache::lsp::TransportError;
use lsp_semcache::{
    ClientError, Location, LspClient, Position, Range, RequestContext, StdioTransport,
};
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Query a language server through a caching semantic layer
#[derive(Parser)]
#[command(name = "lsp-semcache")]
#[command(version)]
#[command(about = "Query a language server through a caching semantic layer")]
struct Cli {
    /// Configuration file (default: <config dir>/lsp-semcache/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server command line, e.g. "gopls serve" (overrides server.command)
    #[arg(long, global = true, value_name = "CMD")]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the symbol forest of a file as JSON
    Structure { file: PathBuf },
    /// Print decoded semantic tokens of the symbol at a position, or of the whole file
    Tokens {
        file: PathBuf,
        #[arg(long, requires = "character")]
        line: Option<u32>,
        #[arg(long, requires = "line")]
        character: Option<u32>,
    },
    /// Print the definitions of whatever is at a position
    Definition {
        file: PathBuf,
        line: u32,
        character: u32,
    },
    /// Print the references to the symbol starting at a position
    References {
        file: PathBuf,
        line: u32,
        character: u32,
    },
    /// Print one line of a file
    Line { file: PathBuf, line: usize },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Failed to start server: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to write output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    init_logging(&config);

    if let Err(e) = run(cli, config).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<ClientConfig, ConfigError> {
    match path {
        Some(path) => ClientConfig::load(path),
        None => Ok(ClientConfig::load_default()?.unwrap_or_default()),
    }
}

fn init_logging(config: &ClientConfig) {
    let filter = config.log_filter.as_deref().unwrap_or("warn");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), CliError> {
    // `line` never talks to the server.
    if let Commands::Line { file, line } = &cli.command {
        let client = LspClient::new(NoServer, Default::default());
        return match client.line_text(&file_uri(file)?, *line).await? {
            Some(text) => {
                print!("{}", text);
                Ok(())
            }
            None => Err(CliError::Usage(format!(
                "line {} is past the end of {}",
                line,
                file.display()
            ))),
        };
    }

    let command = match &cli.server {
        Some(server) => server.split_whitespace().map(str::to_string).collect(),
        None => config.server.command.clone(),
    };
    if command.is_empty() {
        return Err(CliError::Usage(
            "no server command: pass --server or set server.command".to_string(),
        ));
    }

    let mut ctx = RequestContext::new();
    if let Some(timeout) = config.request_timeout() {
        ctx = ctx.with_timeout(timeout);
    }

    let transport = StdioTransport::spawn(&command)?;
    let root = std::env::current_dir()
        .ok()
        .and_then(|dir| Url::from_directory_path(dir).ok());
    let capabilities = transport.initialize(&ctx, root.as_ref()).await?;
    let client = LspClient::new(transport, config.client_options(capabilities));

    let outcome = execute(&client, &ctx, cli.command).await;
    if let Err(e) = client.transport().shutdown(&ctx).await {
        log::warn!(target: "lsp_semcache::client", "Server shutdown failed: {}", e);
    }
    outcome
}

async fn execute(
    client: &LspClient<StdioTransport>,
    ctx: &RequestContext,
    command: Commands,
) -> Result<(), CliError> {
    match command {
        Commands::Structure { file } => {
            let forest = client.file_structure(ctx, &file_uri(&file)?).await?;
            print_json(&forest)
        }
        Commands::Tokens {
            file,
            line,
            character,
        } => {
            let uri = file_uri(&file)?;
            let location = match line.zip(character) {
                Some((line, character)) => {
                    let position = Position::new(line, character);
                    let symbols = client.document_symbols(ctx, &uri).await?;
                    symbols
                        .values()
                        .filter(|symbol| symbol.location.range.contains_position(position))
                        .min_by_key(|symbol| symbol.location.range.span_key())
                        .map(|symbol| symbol.location.clone())
                        .ok_or_else(|| {
                            CliError::Usage(format!("no symbol at {}:{}", line, character))
                        })?
                }
                None => whole_file(client, ctx, uri).await?,
            };
            let tokens = client.semantic_tokens(ctx, &location).await?;
            print_json(&tokens[..])
        }
        Commands::Definition {
            file,
            line,
            character,
        } => {
            let locations = client
                .definition(ctx, &file_uri(&file)?, Position::new(line, character))
                .await?;
            print_json(&locations[..])
        }
        Commands::References {
            file,
            line,
            character,
        } => {
            let position = Position::new(line, character);
            let location = Location::new(file_uri(&file)?, Range::new(position, position));
            let references = client.references(ctx, &location).await?;
            print_json(&references)
        }
        Commands::Line { .. } => Ok(()),
    }
}

/// A location spanning every line of the file.
async fn whole_file(
    client: &LspClient<StdioTransport>,
    ctx: &RequestContext,
    uri: Url,
) -> Result<Location, CliError> {
    let document = client.open(ctx, &uri).await?;
    let lines = u32::try_from(document.line_index().line_count()).unwrap_or(u32::MAX);
    let range = Range::new(Position::new(0, 0), Position::new(lines, 0));
    Ok(Location::new(uri, range))
}

fn file_uri(path: &Path) -> Result<Url, CliError> {
    let absolute = std::path::absolute(path)
        .map_err(|e| CliError::Client(ClientError::io(path, e)))?;
    Url::from_file_path(&absolute)
        .map_err(|_| CliError::Usage(format!("not a local file path: {}", path.display())))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Transport for commands that only read local files.
struct NoServer;

impl lsp_semcache::Transport for NoServer {
    async fn call(
        &self,
        _ctx: &RequestContext,
        _method: &'static str,
        _params: serde_json::Value,
    ) -> Result<serde_json::Value, TransportError> {
        Err(TransportError::Closed)
    }

    async fn notify(
        &self,
        _ctx: &RequestContext,
        _method: &'static str,
        _params: serde_json::Value,
    ) -> Result<(), TransportError> {
        Err(TransportError::Closed)
    }
}
