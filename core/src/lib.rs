//! Field-aware inverted index for Wikipedia-style pages: a bounded-memory
//! build pipeline (segment, spill, external merge, split) and a TF-IDF
//! query engine over the resulting blocks.

pub mod builder;
pub mod config;
pub mod index;
pub mod merge;
pub mod persist;
pub mod pipeline;
pub mod query;
pub mod segment;
pub mod shard;
pub mod titles;
pub mod tokenizer;

pub use index::{DocNum, Document, Field, IndexKey, Posting, RawDocument};
