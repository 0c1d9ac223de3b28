//! Query parsing, posting lookup and field-weighted TF-IDF ranking.

use crate::config::MAX_RESULTS;
use crate::index::{parse_postings, split_line, DocNum, Field, IndexKey, Posting};
use crate::persist::{load_secondary_index, load_stats, IndexPaths};
use crate::segment::index_terms;
use crate::titles::TitleStore;
use crate::tokenizer::Normalizer;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::time::{Duration, Instant};

/// Compatibility switches for block lookup. Both default to off.
#[derive(Debug, Clone, Copy, Default)]
pub struct LookupOptions {
    /// Accept the first block line whose key *contains* the queried key,
    /// which can return another term's postings (`cat-b` inside `concat-b`).
    pub substring_match: bool,
    /// Treat every key that lands in block 0 as missing.
    pub skip_first_block: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "terms", rename_all = "lowercase")]
pub enum Query {
    Simple(Vec<String>),
    Field(Vec<(String, Field)>),
}

impl Query {
    /// A line is a field query iff it carries a `<acronym>:` marker at the
    /// start of a word. Words after a marker belong to that field; text
    /// before the first marker is ignored.
    pub fn parse(line: &str, normalizer: &Normalizer) -> Query {
        let line = line.to_lowercase();
        let markers = field_markers(&line);
        if markers.is_empty() {
            return Query::Simple(index_terms(normalizer, &line));
        }
        let mut pairs = Vec::new();
        for (i, &(start, field)) in markers.iter().enumerate() {
            let end = markers.get(i + 1).map_or(line.len(), |m| m.0);
            for term in index_terms(normalizer, &line[start + 2..end]) {
                pairs.push((term, field));
            }
        }
        Query::Field(pairs)
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Query::Simple(_) => "simple",
            Query::Field(_) => "field",
        }
    }

    /// The (term, field) pairs to score. Simple terms fan out to all fields.
    pub fn expand(&self) -> Vec<IndexKey> {
        match self {
            Query::Simple(terms) => terms
                .iter()
                .flat_map(|t| Field::ALL.iter().map(move |&f| IndexKey::new(t.as_str(), f)))
                .collect(),
            Query::Field(pairs) => pairs.iter().map(|(t, f)| IndexKey::new(t.as_str(), *f)).collect(),
        }
    }
}

// Unlike a plain substring check, `cat: dog` is not a title query: markers
// only count at the start of a word.
fn field_markers(line: &str) -> Vec<(usize, Field)> {
    let bytes = line.as_bytes();
    let mut markers = Vec::new();
    for (i, c) in line.char_indices() {
        let at_word_start = i == 0 || bytes[i - 1].is_ascii_whitespace();
        if at_word_start && bytes.get(i + 1) == Some(&b':') {
            if let Some(field) = Field::from_acronym(c) {
                markers.push((i, field));
            }
        }
    }
    markers
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub doc_num: DocNum,
    pub title: String,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub query: Query,
    pub hits: Vec<SearchHit>,
    /// Documents that passed the coverage filter, before truncation.
    pub total_hits: usize,
    pub elapsed: Duration,
}

/// Read-only view of a built index.
pub struct QueryEngine {
    paths: IndexPaths,
    secondary: Vec<IndexKey>,
    num_docs: u32,
    titles: TitleStore,
    normalizer: Normalizer,
    options: LookupOptions,
    max_results: usize,
}

impl QueryEngine {
    pub fn open(paths: IndexPaths, normalizer: Normalizer, options: LookupOptions) -> Result<Self> {
        let secondary = load_secondary_index(&paths)?;
        let stats = load_stats(&paths)?;
        let titles = paths.titles(stats.titles_per_file);
        tracing::info!(blocks = secondary.len(), num_docs = stats.num_docs, "opened index");
        Ok(Self {
            paths,
            secondary,
            num_docs: stats.num_docs,
            titles,
            normalizer,
            options,
            max_results: MAX_RESULTS,
        })
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn num_docs(&self) -> u32 {
        self.num_docs
    }

    pub fn title(&self, doc_num: DocNum) -> Result<String> {
        self.titles.get_title(doc_num)
    }

    /// Posting list of `key`, empty if the key is not in the index.
    pub fn lookup(&self, key: &IndexKey) -> Result<Vec<Posting>> {
        // greatest block-leading key <= key
        let pos = self.secondary.partition_point(|k| k <= key);
        if pos == 0 {
            return Ok(Vec::new());
        }
        let block = pos - 1;
        if self.options.skip_first_block && block == 0 {
            return Ok(Vec::new());
        }

        let path = self.paths.block(block);
        let f = File::open(&path).with_context(|| format!("opening index block {}", path.display()))?;
        let encoded = key.encode();
        for line in BufReader::new(f).lines() {
            let line = line.with_context(|| format!("reading index block {}", path.display()))?;
            let Some((stored, postings)) = split_line(&line) else {
                continue;
            };
            let hit = if self.options.substring_match {
                stored.contains(&encoded)
            } else {
                stored == encoded
            };
            if hit {
                return Ok(parse_postings(postings));
            }
        }
        Ok(Vec::new())
    }

    /// Score documents for `keys`, best first. Ties keep first-encounter
    /// order: keys in the given order, postings in ascending doc order.
    pub fn score(&self, keys: &[IndexKey]) -> Result<Vec<(DocNum, f64)>> {
        let n = self.num_docs as f64;
        let mut encounter: Vec<DocNum> = Vec::new();
        let mut acc: HashMap<DocNum, (f64, u32)> = HashMap::new();

        for key in keys {
            let postings = self.lookup(key)?;
            if postings.is_empty() {
                continue;
            }
            let idf = (n / (postings.len() as f64 + 1.0)).log2();
            let weight = key.field.weight();
            for p in postings {
                let entry = acc.entry(p.doc_num).or_insert_with(|| {
                    encounter.push(p.doc_num);
                    (0.0, 0)
                });
                entry.0 += weight * (p.tf as f64 + 1.0).log2() * idf;
                entry.1 += 1;
            }
        }

        let min_matches = keys.len() as f64 / 1000.0;
        let mut ranked: Vec<(DocNum, f64)> = encounter
            .into_iter()
            .filter_map(|d| {
                let (score, matches) = acc[&d];
                (matches as f64 > min_matches).then_some((d, score))
            })
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(ranked)
    }

    /// Top results for `keys`, with titles attached.
    pub fn rank(&self, keys: &[IndexKey]) -> Result<Vec<SearchHit>> {
        let ranked = self.score(keys)?;
        self.attach_titles(ranked, self.max_results)
    }

    fn attach_titles(&self, ranked: Vec<(DocNum, f64)>, k: usize) -> Result<Vec<SearchHit>> {
        ranked
            .into_iter()
            .take(k)
            .map(|(doc_num, score)| Ok(SearchHit { doc_num, title: self.title(doc_num)?, score }))
            .collect()
    }

    pub fn search(&self, line: &str) -> Result<SearchOutcome> {
        self.search_top(line, self.max_results)
    }

    /// Like [`QueryEngine::search`] but returning at most `k` hits.
    pub fn search_top(&self, line: &str, k: usize) -> Result<SearchOutcome> {
        let start = Instant::now();
        let query = Query::parse(line, &self.normalizer);
        let keys = query.expand();
        let ranked = self.score(&keys)?;
        let total_hits = ranked.len();
        let hits = self.attach_titles(ranked, k)?;
        tracing::debug!(mode = query.mode(), keys = keys.len(), total_hits, "ranked query");
        Ok(SearchOutcome { query, hits, total_hits, elapsed: start.elapsed() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_queries() {
        let n = Normalizer::default();
        let q = Query::parse("The Cats of Rome", &n);
        assert_eq!(q, Query::Simple(vec!["cat".into(), "rome".into()]));
        assert_eq!(q.expand().len(), 12);
        assert_eq!(q.expand()[0], IndexKey::new("cat", Field::Body));
        assert_eq!(q.expand()[5], IndexKey::new("cat", Field::Title));
    }

    #[test]
    fn parses_field_queries() {
        let n = Normalizer::default();
        let q = Query::parse("ignored t:world cup i:2019 c:cricket", &n);
        assert_eq!(
            q,
            Query::Field(vec![
                ("world".into(), Field::Title),
                ("cup".into(), Field::Title),
                ("2019".into(), Field::Infobox),
                ("cricket".into(), Field::Category),
            ])
        );
    }

    #[test]
    fn marker_must_start_a_word() {
        let n = Normalizer::default();
        assert_eq!(Query::parse("ratio: wombat", &n).mode(), "simple");
        assert_eq!(Query::parse("B:wombat", &n).mode(), "field");
    }
}
