use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::io::Write;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use s3fs::config::Settings;
use s3fs::fs::{FileSystemRegistry, S3FileSystem};
use s3fs::s3::WINDOW_SIZE;
use s3fs::vfs::VirtualPath;

#[derive(Parser)]
#[command(name = "s3fs", version, about = "Read S3 objects through a virtual filesystem")]
struct Cli {
    /// Custom S3 endpoint URL
    #[arg(long, global = true)]
    endpoint_url: Option<String>,

    /// Region override
    #[arg(long, global = true)]
    region: Option<String>,

    /// Use path-style addressing
    #[arg(long, global = true)]
    path_style: bool,

    /// Skip credentials (public buckets)
    #[arg(long, global = true)]
    anonymous: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the size of an object
    Stat {
        /// s3://bucket/key
        uri: String,
    },
    /// Write an object, or a byte range of it, to stdout
    Cat {
        /// s3://bucket/key
        uri: String,
        /// Start reading at this byte offset
        #[arg(long, default_value_t = 0)]
        offset: u64,
        /// Stop after this many bytes
        #[arg(long)]
        length: Option<u64>,
        /// Bytes fetched per range request
        #[arg(long, default_value_t = WINDOW_SIZE)]
        window_size: usize,
    },
    /// Manipulate paths without touching storage
    #[command(subcommand)]
    Path(PathCommand),
}

#[derive(Subcommand)]
enum PathCommand {
    Normalize { path: String },
    Parent { path: String },
    Resolve { base: String, other: String },
    Absolute { path: String },
}

impl Cli {
    fn settings(&self) -> Settings {
        let mut settings = Settings::from_env();
        if let Some(endpoint) = &self.endpoint_url {
            settings.endpoint_url = Some(endpoint.clone());
        }
        if let Some(region) = &self.region {
            settings.region = Some(region.clone());
        }
        settings.force_path_style |= self.path_style;
        settings.anonymous |= self.anonymous;
        settings
    }
}

async fn file_system(registry: &FileSystemRegistry, uri: &str, settings: &Settings) -> Result<Arc<S3FileSystem>> {
    registry
        .new_file_system(uri, settings)
        .await
        .with_context(|| format!("Failed to open filesystem for {}", uri))
}

async fn stat(uri: &str, settings: &Settings) -> Result<()> {
    let registry = FileSystemRegistry::new();
    let fs = file_system(&registry, uri, settings).await?;
    let path = registry.get_path(uri)?;

    let metadata = fs
        .metadata(&path)
        .await
        .with_context(|| format!("Failed to stat {}", path))?;
    println!("{}", path.to_uri().bold());
    println!(
        "  Size: {} ({} bytes)",
        humansize::format_size(metadata.size, humansize::BINARY),
        metadata.size
    );
    Ok(())
}

async fn cat(uri: &str, offset: u64, length: Option<u64>, window_size: usize, settings: &Settings) -> Result<()> {
    let registry = FileSystemRegistry::new();
    let fs = file_system(&registry, uri, settings).await?;
    let path = registry.get_path(uri)?;

    let mut reader = fs
        .open_with_window_size(&path, window_size)
        .await
        .with_context(|| format!("Failed to open {}", path))?;
    reader.seek(offset)?;

    let mut remaining = length.unwrap_or(u64::MAX);
    let mut buf = vec![0u8; window_size.max(1)];
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    while remaining > 0 {
        let want = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let n = reader
            .read(&mut buf[..want])
            .await
            .with_context(|| format!("Failed to read {}", path))?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
        remaining -= n as u64;
    }
    out.flush()?;
    reader.close();
    Ok(())
}

fn path_command(command: PathCommand) {
    let output = match command {
        PathCommand::Normalize { path } => VirtualPath::parse(&path).normalize().to_string(),
        PathCommand::Parent { path } => VirtualPath::parse(&path)
            .parent()
            .map(|p| p.to_string())
            .unwrap_or_default(),
        PathCommand::Resolve { base, other } => VirtualPath::parse(&base)
            .resolve(&VirtualPath::parse(&other))
            .to_string(),
        PathCommand::Absolute { path } => VirtualPath::parse(&path).to_absolute_path().to_string(),
    };
    println!("{}", output);
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let settings = cli.settings();

    let result = match cli.command {
        Command::Stat { uri } => stat(&uri, &settings).await,
        Command::Cat {
            uri,
            offset,
            length,
            window_size,
        } => cat(&uri, offset, length, window_size, &settings).await,
        Command::Path(command) => {
            path_command(command);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
