use crate::index::IndexKey;
use crate::titles::{TitleStore, TITLES_PER_FILE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const STATS_VERSION: u32 = 1;

/// Write-once summary of a finished build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub num_docs: u32,
    pub total_tokens: u64,
    pub index_terms: u64,
    pub index_size_gib: f64,
    pub index_files: u32,
    pub created_at: String,
    pub version: u32,
    /// Titles per title file at build time; the query side must read with it.
    #[serde(default = "default_titles_per_file")]
    pub titles_per_file: u32,
}

fn default_titles_per_file() -> u32 {
    TITLES_PER_FILE
}

/// Directory layout of one index.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn intermediates(&self) -> PathBuf { self.root.join("intermediates") }
    pub fn shard(&self, n: u32) -> PathBuf { self.intermediates().join(format!("index_file_{n}.txt")) }
    pub fn final_index(&self) -> PathBuf { self.root.join("final_index.txt") }
    pub fn blocks_dir(&self) -> PathBuf { self.root.join("indexes") }
    pub fn block(&self, k: usize) -> PathBuf { self.blocks_dir().join(format!("index_{k}.txt")) }
    pub fn secondary_index(&self) -> PathBuf { self.root.join("secondary_index.txt") }
    pub fn titles_dir(&self) -> PathBuf { self.root.join("titles") }
    pub fn stats(&self) -> PathBuf { self.root.join("stats.json") }

    pub fn titles(&self, per_file: u32) -> TitleStore {
        TitleStore::new(self.titles_dir(), per_file)
    }

    /// Create a clean output tree. Leftovers of an earlier run are removed so
    /// they cannot be mistaken for fresh shards or titles.
    pub fn bootstrap(&self) -> Result<()> {
        for dir in [self.intermediates(), self.blocks_dir(), self.titles_dir()] {
            if dir.exists() {
                fs::remove_dir_all(&dir).with_context(|| format!("clearing {}", dir.display()))?;
            }
            fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Sibling temp path used while `path` is being written.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write through `f` into a temp file, then rename it over `path`.
pub fn write_atomic<F>(path: &Path, f: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let tmp = tmp_path(path);
    let file = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    let mut w = BufWriter::new(file);
    f(&mut w).with_context(|| format!("writing {}", tmp.display()))?;
    w.flush().with_context(|| format!("flushing {}", tmp.display()))?;
    drop(w);
    fs::rename(&tmp, path).with_context(|| format!("renaming {} to {}", tmp.display(), path.display()))?;
    Ok(())
}

pub fn save_stats(paths: &IndexPaths, stats: &CorpusStats) -> Result<()> {
    fs::create_dir_all(&paths.root)?;
    let json = serde_json::to_string_pretty(stats)?;
    write_atomic(&paths.stats(), |w| Ok(w.write_all(json.as_bytes())?))
}

pub fn load_stats(paths: &IndexPaths) -> Result<CorpusStats> {
    let path = paths.stats();
    let buf = fs::read_to_string(&path).with_context(|| format!("reading stats {}", path.display()))?;
    let stats = serde_json::from_str(&buf).with_context(|| format!("parsing stats {}", path.display()))?;
    Ok(stats)
}

/// Load block-leading keys in file order. Undecodable lines are dropped.
pub fn load_secondary_index(paths: &IndexPaths) -> Result<Vec<IndexKey>> {
    let path = paths.secondary_index();
    let f = File::open(&path).with_context(|| format!("opening secondary index {}", path.display()))?;
    let mut keys = Vec::new();
    for line in BufReader::new(f).lines() {
        let line = line.with_context(|| format!("reading secondary index {}", path.display()))?;
        match IndexKey::decode(line.trim_end()) {
            Some(k) => keys.push(k),
            None if line.trim().is_empty() => {}
            None => tracing::warn!(line = %line, "skipping undecodable secondary index entry"),
        }
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn stats_round_trip_and_atomic_write() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let stats = CorpusStats {
            num_docs: 3,
            total_tokens: 12,
            index_terms: 5,
            index_size_gib: 0.0,
            index_files: 1,
            created_at: "2024-01-01T00:00:00Z".into(),
            version: STATS_VERSION,
            titles_per_file: 3,
        };
        save_stats(&paths, &stats).unwrap();
        assert_eq!(load_stats(&paths).unwrap(), stats);
        assert!(!tmp_path(&paths.stats()).exists());
    }

    #[test]
    fn stats_without_titles_per_file_use_default() {
        let json = r#"{"num_docs":1,"total_tokens":2,"index_terms":1,"index_size_gib":0.0,
            "index_files":1,"created_at":"2024-01-01T00:00:00Z","version":1}"#;
        let stats: CorpusStats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.titles_per_file, TITLES_PER_FILE);
    }

    #[test]
    fn bootstrap_clears_leftovers() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        paths.bootstrap().unwrap();
        fs::write(paths.shard(1), "stale-b:d0-1\n").unwrap();
        paths.bootstrap().unwrap();
        assert!(!paths.shard(1).exists());
        assert!(paths.intermediates().is_dir());
    }
}
