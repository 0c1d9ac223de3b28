//! Build-time tuning knobs.

use crate::titles::TITLES_PER_FILE;

/// Documents accumulated in memory before a shard is spilled.
pub const DEFAULT_BATCH_SIZE: u32 = 20_000;

/// Lines per block of the final index.
pub const DEFAULT_BLOCK_LINES: usize = 10_000;

/// Results returned per query.
pub const MAX_RESULTS: usize = 10;

#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub batch_size: u32,
    pub block_lines: usize,
    pub titles_per_file: u32,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            block_lines: DEFAULT_BLOCK_LINES,
            titles_per_file: TITLES_PER_FILE,
        }
    }
}
