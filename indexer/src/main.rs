use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use search_core::builder::build_index;
use search_core::tokenizer::Analyzer;
use tracing_subscriber::{EnvFilter, fmt};

use std::path::Path;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build a field-weighted inverted index from a directory of JSON documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a corpus directory (full rebuild)
    Build {
        /// Corpus directory, scanned recursively for *.json files
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long, default_value = "./index")]
        output: String,
        /// Disable English stemming (the searcher must use the same setting)
        #[arg(long, default_value_t = false)]
        no_stem: bool,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, no_stem } => {
            let input_path = Path::new(&input);
            if !input_path.exists() {
                bail!("input path {} does not exist", input_path.display());
            }
            let analyzer = Analyzer { stem: !no_stem, ..Analyzer::default() };
            let stats = build_index(input_path, Path::new(&output), &analyzer)?;
            println!(
                "indexed {} documents ({} terms, {} skipped) into {}",
                stats.num_docs, stats.num_terms, stats.skipped, output
            );
            Ok(())
        }
    }
}
