use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};
use wikindex_core::config::{BuildConfig, DEFAULT_BATCH_SIZE, DEFAULT_BLOCK_LINES};
use wikindex_core::persist::IndexPaths;
use wikindex_core::pipeline::build_index;
use wikindex_core::tokenizer::Normalizer;

mod source;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build a field-aware inverted index from page dumps", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Stopword list, one word per line (built-in English list if omitted)
        #[arg(long)]
        stopwords: Option<String>,
        /// Documents held in memory before a shard is spilled
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: u32,
        /// Lines per final index block
        #[arg(long, default_value_t = DEFAULT_BLOCK_LINES)]
        block_lines: usize,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, stopwords, batch_size, block_lines } => {
            let normalizer = match stopwords {
                Some(path) => Normalizer::from_stopword_file(path)?,
                None => Normalizer::default(),
            };
            let config = BuildConfig { batch_size, block_lines, ..BuildConfig::default() };
            run_build(Path::new(&input), &output, config, normalizer)
        }
    }
}

fn run_build(input: &Path, output: &str, config: BuildConfig, normalizer: Normalizer) -> Result<()> {
    let files = source::collect_files(input)?;
    tracing::info!(files = files.len(), input = %input.display(), "collected input files");

    let start = std::time::Instant::now();
    let paths = IndexPaths::new(output);
    let stats = build_index(&paths, config, normalizer, source::documents(files))?;

    tracing::info!(
        output,
        num_docs = stats.num_docs,
        total_tokens = stats.total_tokens,
        index_terms = stats.index_terms,
        index_files = stats.index_files,
        index_size_gib = stats.index_size_gib,
        took_s = start.elapsed().as_secs_f64(),
        "index build complete"
    );
    Ok(())
}
