//! dkg CLI: offline dataset preparation for the decentralized knowledge graph.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, WrapErr};

use dkg_client::config::DkgConfig;
use dkg_client::dataset::{AssemblyOptions, Content, assemble, process_content, validate_content};
use dkg_client::merkle::{calculate_merkle_root, calculate_number_of_chunks, legacy_assertion_root};
use dkg_client::rdf::{InputFormat, normalize_dataset_with_limit};
use dkg_client::ual::{format_ual, parse_ual};

#[derive(Parser)]
#[command(name = "dkg", version, about = "Decentralized knowledge graph dataset tools")]
struct Cli {
    /// Client configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Input format of documents: json-ld or n-quads.
    #[arg(long, global = true)]
    format: Option<InputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Canonicalize a JSON-LD or N-Quads document and print its statements.
    Normalize {
        /// Path to the document.
        #[arg(long)]
        file: PathBuf,
    },

    /// Assemble content into a knowledge collection and print it as JSON.
    ///
    /// A JSON file may split content into `public` and `private` parts. Any
    /// other file is read as pre-formatted public N-Quads.
    Assemble {
        #[arg(long)]
        file: PathBuf,
    },

    /// Merkle root of pre-formatted N-Quads, one statement per line.
    Root {
        #[arg(long)]
        file: PathBuf,

        /// Chunk size in bytes (defaults to the configured size).
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Use the per-statement root of single-asset assertions.
        #[arg(long)]
        legacy: bool,
    },

    /// Number of chunks and byte size of pre-formatted N-Quads.
    Chunks {
        #[arg(long)]
        file: PathBuf,

        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Parse or build Uniform Asset Locators.
    Ual {
        #[command(subcommand)]
        action: UalAction,
    },

    /// Print the effective configuration as TOML, or write it to a file.
    Config {
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum UalAction {
    /// Validate a UAL and print its parts as JSON.
    Parse { ual: String },

    /// Build a UAL from its parts.
    Format {
        #[arg(long)]
        blockchain: String,

        #[arg(long)]
        contract: String,

        #[arg(long)]
        collection: u64,

        #[arg(long)]
        asset: Option<u64>,
    },
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading {}", path.display()))
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => DkgConfig::load(path)?,
        None => DkgConfig::default(),
    };
    if let Some(format) = cli.format {
        config.dataset.input_format = format;
    }

    match cli.command {
        Commands::Normalize { file } => {
            let document = serde_json::Value::String(read_file(&file)?);
            let lines = normalize_dataset_with_limit(
                &document,
                config.dataset.input_format,
                config.dataset.canonicalization_work_limit,
            )?;
            for line in lines {
                println!("{line}");
            }
        }

        Commands::Assemble { file } => {
            let text = read_file(&file)?;
            let content = match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(value) => {
                    validate_content(&value)?;
                    Content::from_json(value)
                }
                Err(_) => Content::Text(text),
            };
            let options = AssemblyOptions {
                input_format: config.dataset.input_format,
                chunk_byte_size: config.dataset.chunk_byte_size,
                max_file_size: config.dataset.max_file_size,
                canonicalization_work_limit: config.dataset.canonicalization_work_limit,
                ..AssemblyOptions::default()
            };
            let collection = assemble(&content, &options)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&collection).into_diagnostic()?
            );
        }

        Commands::Root {
            file,
            chunk_size,
            legacy,
        } => {
            let quads = process_content(&read_file(&file)?);
            let root = if legacy {
                legacy_assertion_root(&quads)?
            } else {
                calculate_merkle_root(&quads, chunk_size.unwrap_or(config.dataset.chunk_byte_size))?
            };
            println!("{root}");
        }

        Commands::Chunks { file, chunk_size } => {
            let quads = process_content(&read_file(&file)?);
            let chunk_size = chunk_size.unwrap_or(config.dataset.chunk_byte_size);
            let chunks = calculate_number_of_chunks(&quads, chunk_size)?;
            println!("Chunks: {chunks}");
            println!("Bytes:  {}", chunks * chunk_size);
        }

        Commands::Ual { action } => match action {
            UalAction::Parse { ual } => {
                let parsed = parse_ual(&ual)?;
                println!("{}", serde_json::to_string_pretty(&parsed).into_diagnostic()?);
            }
            UalAction::Format {
                blockchain,
                contract,
                collection,
                asset,
            } => {
                println!("{}", format_ual(&blockchain, &contract, collection, asset));
            }
        },

        Commands::Config { write } => match write {
            Some(path) => {
                config.save(&path)?;
                println!("Wrote {}", path.display());
            }
            None => print!("{}", toml::to_string_pretty(&config).into_diagnostic()?),
        },
    }

    Ok(())
}
