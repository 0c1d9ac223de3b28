//! End-to-end build: ingest → merge → split → stats.

use crate::builder::IndexBuilder;
use crate::config::BuildConfig;
use crate::index::RawDocument;
use crate::merge::merge_all;
use crate::persist::{save_stats, CorpusStats, IndexPaths, STATS_VERSION};
use crate::segment::FieldSegmenter;
use crate::shard::split_final_index;
use crate::tokenizer::Normalizer;
use anyhow::{Context, Result};
use std::fs;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Build a complete index under `paths` from `docs`, in input order.
/// The first error yielded by `docs` aborts the build.
pub fn build_index<I>(paths: &IndexPaths, config: BuildConfig, normalizer: Normalizer, docs: I) -> Result<CorpusStats>
where
    I: IntoIterator<Item = Result<RawDocument>>,
{
    paths.bootstrap()?;
    let block_lines = config.block_lines;
    let titles_per_file = config.titles_per_file;
    let mut builder = IndexBuilder::new(paths.clone(), config, FieldSegmenter::new(normalizer))?;
    for doc in docs {
        builder.ingest(doc?)?;
    }
    let summary = builder.finish()?;
    tracing::info!(num_docs = summary.num_docs, shards = summary.shards.len(), "primary indexing done");

    let final_index = merge_all(summary.shards, paths).context("merging shards")?;
    let split = split_final_index(paths, block_lines).context("splitting final index")?;

    let size = fs::metadata(&final_index)
        .with_context(|| format!("stat {}", final_index.display()))?
        .len();
    let stats = CorpusStats {
        num_docs: summary.num_docs,
        total_tokens: summary.total_tokens,
        index_terms: split.terms,
        index_size_gib: (size as f64 / GIB * 100.0).round() / 100.0,
        index_files: split.blocks as u32,
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
        version: STATS_VERSION,
        titles_per_file,
    };
    save_stats(paths, &stats)?;
    tracing::info!(terms = stats.index_terms, blocks = stats.index_files, "index build complete");
    Ok(stats)
}
