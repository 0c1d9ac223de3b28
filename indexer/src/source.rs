//! Document source: `.jsonl` (one page per line) and `.json` (one page or an
//! array of pages) files, read in path order.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use wikindex_core::RawDocument;

/// Input files under `input`, sorted so doc numbering is reproducible.
pub fn collect_files(input: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        anyhow::bail!("input {} does not exist", input.display());
    }
    Ok(files)
}

/// Stream every page from `files`. Unparsable pages are logged and skipped;
/// I/O failures are yielded as errors.
pub fn documents(files: Vec<PathBuf>) -> impl Iterator<Item = Result<RawDocument>> {
    files.into_iter().flat_map(read_file)
}

fn read_file(path: PathBuf) -> Box<dyn Iterator<Item = Result<RawDocument>>> {
    if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        match File::open(&path) {
            Ok(f) => Box::new(read_jsonl(path, BufReader::new(f))),
            Err(e) => Box::new(std::iter::once(
                Err::<RawDocument, _>(e).with_context(|| format!("opening input {}", path.display())),
            )),
        }
    } else {
        match read_json(&path) {
            Ok(docs) => Box::new(docs.into_iter().map(Ok::<RawDocument, anyhow::Error>)),
            Err(e) => Box::new(std::iter::once(Err::<RawDocument, _>(e))),
        }
    }
}

fn read_jsonl<R: BufRead>(path: PathBuf, reader: R) -> impl Iterator<Item = Result<RawDocument>> {
    reader.lines().enumerate().filter_map(move |(n, line)| {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                return Some(Err::<RawDocument, _>(e).with_context(|| format!("reading input {}", path.display())))
            }
        };
        if line.trim().is_empty() {
            return None;
        }
        match serde_json::from_str::<RawDocument>(&line) {
            Ok(doc) => Some(Ok(doc)),
            Err(e) => {
                tracing::warn!(path = %path.display(), line = n + 1, error = %e, "skipping unparsable page");
                None
            }
        }
    })
}

fn read_json(path: &Path) -> Result<Vec<RawDocument>> {
    let f = File::open(path).with_context(|| format!("opening input {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parsing input {}", path.display()))?;
    let values = match json {
        serde_json::Value::Array(arr) => arr,
        v @ serde_json::Value::Object(_) => vec![v],
        _ => Vec::new(),
    };
    let mut docs = Vec::with_capacity(values.len());
    for (i, v) in values.into_iter().enumerate() {
        match serde_json::from_value::<RawDocument>(v) {
            Ok(doc) => docs.push(doc),
            Err(e) => tracing::warn!(path = %path.display(), index = i, error = %e, "skipping unparsable page"),
        }
    }
    Ok(docs)
}
