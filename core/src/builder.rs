use crate::config::BuildConfig;
use crate::index::{DocNum, Document, Field, RawDocument};
use crate::persist::{write_atomic, IndexPaths};
use crate::segment::FieldSegmenter;
use crate::titles::TitleStore;
use crate::tokenizer::tokenize;
use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Per-document counters, one slot per field (see [`Field::index`]).
pub type FieldCounts = [u32; 6];

/// Everything the builder accumulates between two spills.
#[derive(Debug, Default)]
pub struct IndexBuilderState {
    pub table: HashMap<String, BTreeMap<DocNum, FieldCounts>>,
    pub next_doc_num: DocNum,
    pub pending_titles: Vec<String>,
    pub shards_written: u32,
    pub total_tokens: u64,
}

impl IndexBuilderState {
    fn record(&mut self, term: &str, doc_num: DocNum, field: Field) {
        let bump = |docs: &mut BTreeMap<DocNum, FieldCounts>| {
            docs.entry(doc_num).or_insert([0; 6])[field.index()] += 1;
        };
        match self.table.get_mut(term) {
            Some(docs) => bump(docs),
            None => bump(self.table.entry(term.to_string()).or_default()),
        }
    }
}

#[derive(Debug)]
pub struct BuildSummary {
    pub num_docs: u32,
    pub total_tokens: u64,
    pub shards: Vec<PathBuf>,
}

/// Streams documents into sorted intermediate shards, spilling every
/// `batch_size` documents so memory stays bounded.
pub struct IndexBuilder {
    paths: IndexPaths,
    config: BuildConfig,
    segmenter: FieldSegmenter,
    titles: TitleStore,
    state: IndexBuilderState,
    shards: Vec<PathBuf>,
}

impl IndexBuilder {
    pub fn new(paths: IndexPaths, config: BuildConfig, segmenter: FieldSegmenter) -> Result<Self> {
        fs::create_dir_all(paths.intermediates())
            .with_context(|| format!("creating {}", paths.intermediates().display()))?;
        let titles = paths.titles(config.titles_per_file);
        Ok(Self { paths, config, segmenter, titles, state: IndexBuilderState::default(), shards: Vec::new() })
    }

    pub fn state(&self) -> &IndexBuilderState {
        &self.state
    }

    /// Number, segment and count one page. Returns its doc number.
    pub fn ingest(&mut self, raw: RawDocument) -> Result<DocNum> {
        let doc = Document::new(self.state.next_doc_num, raw);
        self.state.next_doc_num += 1;
        self.state.total_tokens += (tokenize(&doc.title).len() + tokenize(&doc.text).len()) as u64;

        let fields = self.segmenter.segment(&doc.title, &doc.text);
        for (field, tokens) in fields.iter() {
            for term in tokens {
                self.state.record(term, doc.doc_num, field);
            }
        }
        self.state.pending_titles.push(doc.title);

        if self.config.batch_size > 0 && self.state.next_doc_num % self.config.batch_size == 0 {
            self.flush()?;
        }
        Ok(doc.doc_num)
    }

    /// Spill the current batch to a new shard and its titles to the title
    /// store. A no-op when nothing was ingested since the last spill.
    pub fn flush(&mut self) -> Result<Option<PathBuf>> {
        if self.state.pending_titles.is_empty() && self.state.table.is_empty() {
            return Ok(None);
        }
        self.state.shards_written += 1;
        let path = self.paths.shard(self.state.shards_written);
        let lines = write_shard(&path, &self.state.table)?;

        let titles = std::mem::take(&mut self.state.pending_titles);
        let first = self.state.next_doc_num - titles.len() as DocNum;
        self.titles.append(first, &titles)?;

        tracing::info!(
            shard = self.state.shards_written,
            terms = self.state.table.len(),
            lines,
            docs = titles.len(),
            "flushed shard"
        );
        self.state.table.clear();
        self.shards.push(path.clone());
        Ok(Some(path))
    }

    /// Flush the trailing partial batch and hand back what was written.
    pub fn finish(mut self) -> Result<BuildSummary> {
        self.flush()?;
        Ok(BuildSummary {
            num_docs: self.state.next_doc_num,
            total_tokens: self.state.total_tokens,
            shards: self.shards,
        })
    }
}

/// Write `table` as `term-f:d<doc>-<tf>|...` lines in key order. Keys with no
/// nonzero counter get no line. Returns the number of lines written.
pub fn write_shard(path: &Path, table: &HashMap<String, BTreeMap<DocNum, FieldCounts>>) -> Result<usize> {
    let mut terms: Vec<&String> = table.keys().collect();
    terms.sort_unstable();
    let mut lines = 0;
    write_atomic(path, |w| {
        for term in terms {
            let docs = &table[term];
            for field in Field::ALL {
                let mut started = false;
                for (doc_num, counts) in docs {
                    let tf = counts[field.index()];
                    if tf == 0 {
                        continue;
                    }
                    if started {
                        w.write_all(b"|")?;
                    } else {
                        write!(w, "{term}-{}:", field.acronym())?;
                        started = true;
                    }
                    write!(w, "d{doc_num}-{tf}")?;
                }
                if started {
                    w.write_all(b"\n")?;
                    lines += 1;
                }
            }
        }
        Ok(())
    })?;
    Ok(lines)
}
