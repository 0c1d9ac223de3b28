use anyhow::{Context, Result};
use clap::Parser;
use server::{write_outcome, EngineArgs};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use tracing_subscriber::{fmt, EnvFilter};

/// Answer every query in a file, one per line.
#[derive(Parser)]
struct Args {
    #[command(flatten)]
    engine: EngineArgs,
    /// Query file, one query per line
    #[arg(long)]
    queries: String,
    /// Output file
    #[arg(long, default_value = "queries_op.txt")]
    output: String,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let engine = args.engine.open()?;

    let input = File::open(&args.queries).with_context(|| format!("opening query file {}", args.queries))?;
    let out = File::create(&args.output).with_context(|| format!("creating output {}", args.output))?;
    let mut out = BufWriter::new(out);

    let mut answered = 0usize;
    for line in BufReader::new(input).lines() {
        let line = line.with_context(|| format!("reading query file {}", args.queries))?;
        let outcome = engine.search(&line)?;
        write_outcome(&mut out, &outcome)?;
        answered += 1;
    }
    out.flush().with_context(|| format!("writing output {}", args.output))?;
    tracing::info!(queries = answered, output = %args.output, "queries answered");
    Ok(())
}
