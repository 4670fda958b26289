use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use docchunk::{
    api, config, converter, logging,
    processing::{ProcessOptions, ProcessingApi, ProcessingService, RagOptions},
    upload::UploadedFile,
};
use serde::Serialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(
    name = "docchunk",
    version,
    about = "Convert documents into metadata-tagged chunks"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Run the pipeline on a local file and print the JSON response.
    Chunk {
        /// Document to convert.
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = Mode::Raw)]
        mode: Mode,
        /// Maximum tokens per chunk (rag mode).
        #[arg(long, default_value_t = 512)]
        chunk_size: usize,
        /// Overlap tokens between split windows (rag mode).
        #[arg(long, default_value_t = 50)]
        chunk_overlap: usize,
        /// Keep undersized sibling chunks apart (rag mode).
        #[arg(long)]
        no_merge_peers: bool,
        /// List pictures next to the chunks (raw mode).
        #[arg(long)]
        extract_images: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Raw,
    Rag,
    Tables,
    Excel,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Serve);
    logging::init_tracing(matches!(command, Command::Chunk { .. }));
    let config = config::init_config().context("Failed to load configuration")?;

    match command {
        Command::Serve => serve(config).await,
        Command::Chunk {
            file,
            mode,
            chunk_size,
            chunk_overlap,
            no_merge_peers,
            extract_images,
        } => {
            let service = ProcessingService::new(
                converter::initialize_converter(config).await,
                config,
            );
            let upload = read_upload(&file).await?;
            match mode {
                Mode::Raw => {
                    let options = ProcessOptions {
                        extract_images,
                        ..ProcessOptions::default()
                    };
                    print_json(&service.process_document(upload, options).await?)
                }
                Mode::Rag => {
                    let options = RagOptions {
                        chunk_size,
                        chunk_overlap,
                        merge_peers: !no_merge_peers,
                    };
                    print_json(&service.process_rag(upload, options).await?)
                }
                Mode::Tables => print_json(&service.extract_tables(upload).await?),
                Mode::Excel => print_json(&service.process_spreadsheet(upload).await?),
            }
        }
    }
}

async fn serve(config: &'static config::Config) -> Result<()> {
    if config.api_key.is_none() {
        tracing::warn!("API_KEY is not set; upload endpoints accept unauthenticated requests");
    }
    let converter = converter::initialize_converter(config).await;
    let service = Arc::new(ProcessingService::new(converter, config));
    let app = api::create_router(service, config);

    let (listener, port) = bind_listener(config).await?;
    tracing::info!("Listening on http://{}:{}", config.server_host, port);
    axum::serve(listener, app).await.context("HTTP server failed")
}

async fn read_upload(path: &Path) -> Result<UploadedFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .context("Input path has no file name")?;
    Ok(UploadedFile::new(filename, bytes))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn bind_listener(config: &config::Config) -> Result<(TcpListener, u16)> {
    let host: IpAddr = config
        .server_host
        .parse()
        .with_context(|| format!("Invalid SERVER_HOST '{}'", config.server_host))?;

    if let Some(port) = config.server_port {
        let listener = TcpListener::bind((host, port))
            .await
            .with_context(|| format!("Failed to bind {host}:{port}"))?;
        return Ok((listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 8000..=8099;
    for port in PORT_RANGE {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }

    bail!("No available port found in range 8000-8099")
}
