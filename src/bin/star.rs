//! star CLI — retrieval core with an MCP server and a one-shot ingest path.
//!
//! Usage:
//!   star mcp [--transport stdio] [--db path] [--mirror path]
//!   star ingest <path> [--bucket b]...

use clap::{Parser, Subcommand};
use star_core::model::{MoleculeType, Provenance};
use star_core::{Config, StarCore};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "star", version, about = "Physics-inspired retrieval core over a personal knowledge corpus")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP (Model Context Protocol) server
    Mcp {
        /// Transport type (currently only stdio)
        #[arg(long, default_value = "stdio")]
        transport: String,
        /// Path to the SQLite index database
        #[arg(long)]
        db: Option<PathBuf>,
        /// Root of the filesystem mirror
        #[arg(long)]
        mirror: Option<PathBuf>,
    },
    /// Ingest a single file from disk
    Ingest {
        /// Path to the file to ingest
        path: PathBuf,
        /// Buckets to tag this compound with
        #[arg(long = "bucket")]
        buckets: Vec<String>,
        /// Path to the SQLite index database
        #[arg(long)]
        db: Option<PathBuf>,
        /// Root of the filesystem mirror
        #[arg(long)]
        mirror: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Mcp { transport, db, mirror } => {
            if transport != "stdio" {
                eprintln!("error: only 'stdio' transport is currently supported");
                std::process::exit(1);
            }
            let code = star_core::mcp::run_mcp_server(mirror, db);
            std::process::exit(code);
        }
        Commands::Ingest { path, buckets, db, mirror } => std::process::exit(run_ingest(path, buckets, db, mirror)),
    }
}

fn run_ingest(path: PathBuf, buckets: Vec<String>, db: Option<PathBuf>, mirror: Option<PathBuf>) -> i32 {
    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to read {}: {e}", path.display());
            return 1;
        }
    };

    let mut config = Config::default();
    if let Some(root) = mirror {
        config.mirror_root = root;
    }
    if let Some(index_path) = db {
        config.index_path = index_path;
    }

    let store = match star_core::storage::SqliteStore::open(&config.index_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to open database at {}: {e}", config.index_path.display());
            return 1;
        }
    };
    let embedder = Box::new(star_core::embedding::MockEmbedder::new(config.embedding_dim));

    let core = match StarCore::open(Box::new(store), None, embedder, config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to open retrieval core: {e}");
            return 1;
        }
    };

    let source_path = path.to_string_lossy().into_owned();
    match core.ingest(&content, &source_path, MoleculeType::Prose, buckets, std::iter::empty(), Provenance::Internal) {
        Ok(outcome) => {
            println!("{outcome:?}");
            0
        }
        Err(e) => {
            eprintln!("ingest failed: {e}");
            1
        }
    }
}
