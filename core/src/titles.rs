//! Flat title storage: `titles_<k>.txt` holds the titles of documents
//! `k * per_file .. (k + 1) * per_file`, one per line.

use crate::index::DocNum;
use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const TITLES_PER_FILE: u32 = 2_000;

#[derive(Debug, Clone)]
pub struct TitleStore {
    dir: PathBuf,
    per_file: u32,
}

impl TitleStore {
    pub fn new<P: AsRef<Path>>(dir: P, per_file: u32) -> Self {
        Self { dir: dir.as_ref().to_path_buf(), per_file: per_file.max(1) }
    }

    fn file(&self, k: u32) -> PathBuf {
        self.dir.join(format!("titles_{k}.txt"))
    }

    /// Append titles for consecutive documents starting at `first`.
    /// Callers must append in doc_num order without gaps.
    pub fn append(&self, first: DocNum, titles: &[String]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating title dir {}", self.dir.display()))?;
        let mut doc_num = first;
        let mut remaining = titles;
        while !remaining.is_empty() {
            let k = doc_num / self.per_file;
            let room = (self.per_file - doc_num % self.per_file) as usize;
            let (chunk, rest) = remaining.split_at(room.min(remaining.len()));
            let path = self.file(k);
            let f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("opening title file {}", path.display()))?;
            let mut w = BufWriter::new(f);
            for title in chunk {
                writeln!(w, "{}", title.replace(['\n', '\r'], " "))?;
            }
            w.flush().with_context(|| format!("writing title file {}", path.display()))?;
            doc_num += chunk.len() as u32;
            remaining = rest;
        }
        Ok(())
    }

    /// Title of `doc_num`, or an empty string if it was never stored.
    pub fn get_title(&self, doc_num: DocNum) -> Result<String> {
        let path = self.file(doc_num / self.per_file);
        let f = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(doc_num, path = %path.display(), "title file missing");
                return Ok(String::new());
            }
            Err(e) => return Err(e).with_context(|| format!("opening title file {}", path.display())),
        };
        let line = BufReader::new(f).lines().nth((doc_num % self.per_file) as usize).transpose()?;
        Ok(line.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn titles_roll_over_files() {
        let dir = tempdir().unwrap();
        let store = TitleStore::new(dir.path(), 3);
        let batch1: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let batch2: Vec<String> = vec!["e\nf".to_string(), "g".to_string()];
        store.append(0, &batch1).unwrap();
        store.append(4, &batch2).unwrap();

        assert_eq!(store.get_title(0).unwrap(), "a");
        assert_eq!(store.get_title(3).unwrap(), "d");
        assert_eq!(store.get_title(4).unwrap(), "e f");
        assert_eq!(store.get_title(5).unwrap(), "g");
        assert_eq!(store.get_title(6).unwrap(), "");
        assert_eq!(fs::read_to_string(dir.path().join("titles_1.txt")).unwrap(), "d\ne f\ng\n");
    }
}
