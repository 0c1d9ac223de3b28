//! External merge of sorted shards into one final index.
//!
//! Shards are merged pairwise in a binary tree: (1,2), (3,4), ... per level,
//! an odd trailing shard is carried to the next level untouched. Shard `k`
//! holds only doc numbers below those of shard `k + 1`, so concatenating
//! posting lists left-then-right keeps them ascending.

use crate::index::{split_line, IndexKey};
use crate::persist::{write_atomic, IndexPaths};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Lines, Write};
use std::path::{Path, PathBuf};

struct Entry {
    key: IndexKey,
    postings: String,
}

struct ShardCursor {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    skipped: usize,
}

impl ShardCursor {
    fn open(path: &Path) -> Result<Self> {
        let f = File::open(path).with_context(|| format!("opening shard {}", path.display()))?;
        Ok(Self { path: path.to_path_buf(), lines: BufReader::new(f).lines(), skipped: 0 })
    }

    /// Next well-formed entry. Blank and malformed lines are skipped.
    fn next_entry(&mut self) -> Result<Option<Entry>> {
        for line in self.lines.by_ref() {
            let line = line.with_context(|| format!("reading shard {}", self.path.display()))?;
            let parsed = split_line(&line)
                .and_then(|(key, postings)| IndexKey::decode(key).map(|key| (key, postings.trim())));
            match parsed {
                Some((key, postings)) => return Ok(Some(Entry { key, postings: postings.to_string() })),
                None => {
                    if !line.trim().is_empty() {
                        tracing::debug!(path = %self.path.display(), line = %line, "skipping malformed line");
                    }
                    self.skipped += 1;
                }
            }
        }
        Ok(None)
    }
}

fn join_postings(left: &str, right: &str) -> String {
    match (left.is_empty(), right.is_empty()) {
        (true, _) => right.to_string(),
        (_, true) => left.to_string(),
        _ => format!("{left}|{right}"),
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub lines: usize,
    pub combined: usize,
    pub skipped: usize,
}

/// Merge two sorted shards into `out`. `left` must cover the lower doc range.
pub fn merge_pair(left: &Path, right: &Path, out: &Path) -> Result<MergeStats> {
    let mut l = ShardCursor::open(left)?;
    let mut r = ShardCursor::open(right)?;
    let mut stats = MergeStats::default();

    write_atomic(out, |w| {
        let mut a = l.next_entry()?;
        let mut b = r.next_entry()?;
        loop {
            match (a.take(), b.take()) {
                (Some(x), Some(y)) => match x.key.cmp(&y.key) {
                    Ordering::Less => {
                        writeln!(w, "{}:{}", x.key, x.postings)?;
                        a = l.next_entry()?;
                        b = Some(y);
                    }
                    Ordering::Greater => {
                        writeln!(w, "{}:{}", y.key, y.postings)?;
                        b = r.next_entry()?;
                        a = Some(x);
                    }
                    Ordering::Equal => {
                        writeln!(w, "{}:{}", x.key, join_postings(&x.postings, &y.postings))?;
                        stats.combined += 1;
                        a = l.next_entry()?;
                        b = r.next_entry()?;
                    }
                },
                (Some(x), None) => {
                    writeln!(w, "{}:{}", x.key, x.postings)?;
                    a = l.next_entry()?;
                }
                (None, Some(y)) => {
                    writeln!(w, "{}:{}", y.key, y.postings)?;
                    b = r.next_entry()?;
                }
                (None, None) => break,
            }
            stats.lines += 1;
        }
        Ok(())
    })?;

    stats.skipped = l.skipped + r.skipped;
    Ok(stats)
}

/// Merge all shards (in construction order) into `paths.final_index()`.
/// Consumed shards are deleted. No shards yields an empty final index.
pub fn merge_all(shards: Vec<PathBuf>, paths: &IndexPaths) -> Result<PathBuf> {
    let final_index = paths.final_index();
    if shards.is_empty() {
        write_atomic(&final_index, |_| Ok(()))?;
        tracing::info!(path = %final_index.display(), "no shards, wrote empty final index");
        return Ok(final_index);
    }

    let mut files = shards;
    let mut level = 0;
    while files.len() > 1 {
        level += 1;
        tracing::info!(level, files = files.len(), "merging level");
        files = files
            .par_chunks(2)
            .enumerate()
            .map(|(i, pair)| -> Result<PathBuf> {
                let [left, right] = pair else {
                    return Ok(pair[0].clone());
                };
                let out = paths.intermediates().join(format!("merge_{level}_{i}.txt"));
                let stats = merge_pair(left, right, &out)?;
                tracing::debug!(left = %left.display(), right = %right.display(), ?stats, "merged pair");
                fs::remove_file(left).with_context(|| format!("removing {}", left.display()))?;
                fs::remove_file(right).with_context(|| format!("removing {}", right.display()))?;
                Ok(out)
            })
            .collect::<Result<Vec<_>>>()?;
    }

    fs::rename(&files[0], &final_index)
        .with_context(|| format!("renaming {} to {}", files[0].display(), final_index.display()))?;
    Ok(final_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{format_postings, parse_postings, Field, Posting};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    type Model = BTreeMap<IndexKey, Vec<Posting>>;

    fn write_model(path: &Path, model: &Model) {
        let mut s = String::new();
        for (k, p) in model {
            s.push_str(&format!("{k}:{}\n", format_postings(p)));
        }
        fs::write(path, s).unwrap();
    }

    fn read_model(path: &Path) -> (Vec<IndexKey>, Model) {
        let mut keys = Vec::new();
        let mut model = Model::new();
        for line in fs::read_to_string(path).unwrap().lines() {
            let (k, p) = split_line(line).unwrap();
            let key = IndexKey::decode(k).unwrap();
            keys.push(key.clone());
            model.insert(key, parse_postings(p));
        }
        (keys, model)
    }

    /// Deterministic shard generator over a small vocabulary, including
    /// hyphenated terms whose string order differs from key order.
    fn gen_shard(seed: &mut u64, docs: std::ops::Range<u32>) -> Model {
        const TERMS: &[&str] = &["ab", "ab-c", "abc", "b", "cat", "cat-b", "concat", "dog", "z"];
        let mut next = || {
            *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (*seed >> 33) as usize
        };
        let mut model = Model::new();
        for doc in docs {
            for _ in 0..next() % 4 {
                let key = IndexKey::new(TERMS[next() % TERMS.len()], Field::ALL[next() % 6]);
                let list = model.entry(key).or_default();
                match list.last_mut() {
                    Some(p) if p.doc_num == doc => p.tf += 1,
                    _ => list.push(Posting { doc_num: doc, tf: 1 }),
                }
            }
        }
        model
    }

    #[test]
    fn merge_matches_model() {
        let dir = tempdir().unwrap();
        let mut seed = 7u64;
        for round in 0..50 {
            let a = gen_shard(&mut seed, 0..10);
            let b = gen_shard(&mut seed, 10..25);
            let (pa, pb, out) = (dir.path().join("a"), dir.path().join("b"), dir.path().join(format!("o{round}")));
            write_model(&pa, &a);
            write_model(&pb, &b);
            merge_pair(&pa, &pb, &out).unwrap();

            let mut expected = a.clone();
            for (k, p) in &b {
                expected.entry(k.clone()).or_default().extend(p.iter().copied());
            }
            let (keys, got) = read_model(&out);
            assert!(keys.windows(2).all(|w| w[0] < w[1]), "round {round} not sorted");
            assert_eq!(got, expected, "round {round}");
        }
    }

    #[test]
    fn merge_with_empty_shard_is_identity() {
        let dir = tempdir().unwrap();
        let shard = "cat-b:d0-1|d3-2\ncat-t:d1-1\ndog-c:d2-4\n";
        let (a, e, out) = (dir.path().join("a"), dir.path().join("e"), dir.path().join("out"));
        fs::write(&a, shard).unwrap();
        fs::write(&e, "").unwrap();
        merge_pair(&a, &e, &out).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), shard);
        merge_pair(&e, &a, &out).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), shard);
    }

    #[test]
    fn combines_shared_keys_left_then_right() {
        let dir = tempdir().unwrap();
        let (a, b, out) = (dir.path().join("a"), dir.path().join("b"), dir.path().join("out"));
        fs::write(&a, "cat-b:d0-1\n\ngarbage line\ncat-t:d1-1\n").unwrap();
        fs::write(&b, "\ncat-b:d5-2\nemu-i:d6-1\n").unwrap();
        let stats = merge_pair(&a, &b, &out).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "cat-b:d0-1|d5-2\ncat-t:d1-1\nemu-i:d6-1\n");
        assert_eq!(stats.combined, 1);
        assert_eq!(stats.skipped, 3);
    }

    #[test]
    fn merge_all_handles_odd_levels() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        paths.bootstrap().unwrap();
        let contents = ["cat-b:d0-1\n", "cat-b:d1-1\ndog-t:d1-1\n", "ant-l:d2-1\ncat-b:d2-3\n"];
        let shards: Vec<PathBuf> = contents
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let p = paths.shard(i as u32 + 1);
                fs::write(&p, c).unwrap();
                p
            })
            .collect();

        let final_index = merge_all(shards.clone(), &paths).unwrap();
        assert_eq!(
            fs::read_to_string(final_index).unwrap(),
            "ant-l:d2-1\ncat-b:d0-1|d1-1|d2-3\ndog-t:d1-1\n"
        );
        assert!(shards.iter().all(|s| !s.exists()));
    }

    #[test]
    fn merge_all_without_shards_is_empty() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let out = merge_all(Vec::new(), &paths).unwrap();
        assert_eq!(fs::read_to_string(out).unwrap(), "");
    }
}
