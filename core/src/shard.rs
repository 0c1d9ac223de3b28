use crate::index::{split_line, IndexKey};
use crate::persist::{write_atomic, IndexPaths};
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShardSummary {
    pub blocks: usize,
    pub terms: u64,
    pub lines: u64,
}

/// Cut the final index into blocks of `block_lines` lines under
/// `indexes/index_<k>.txt` and record each block's first key in the
/// secondary index. The trailing partial block is written too.
pub fn split_final_index(paths: &IndexPaths, block_lines: usize) -> Result<ShardSummary> {
    let block_lines = block_lines.max(1);
    let source = paths.final_index();
    let f = File::open(&source).with_context(|| format!("opening final index {}", source.display()))?;
    fs::create_dir_all(paths.blocks_dir())
        .with_context(|| format!("creating {}", paths.blocks_dir().display()))?;

    let mut summary = ShardSummary::default();
    let mut secondary: Vec<String> = Vec::new();
    let mut block: Vec<String> = Vec::with_capacity(block_lines);
    let mut last_term = String::new();

    for line in BufReader::new(f).lines() {
        let line = line.with_context(|| format!("reading final index {}", source.display()))?;
        let Some((key, _)) = split_line(&line) else {
            continue;
        };
        // the secondary index drops undecodable keys, so blocks must too
        if IndexKey::decode(key).is_none() {
            tracing::debug!(line = %line, "skipping undecodable final index line");
            continue;
        }
        let term = key.rsplit_once('-').map_or(key, |(t, _)| t);
        if term != last_term {
            last_term = term.to_string();
            summary.terms += 1;
        }
        summary.lines += 1;
        block.push(line);
        if block.len() == block_lines {
            write_block(paths, &mut summary, &mut secondary, &mut block)?;
        }
    }
    if !block.is_empty() {
        write_block(paths, &mut summary, &mut secondary, &mut block)?;
    }

    write_atomic(&paths.secondary_index(), |w| {
        for key in &secondary {
            writeln!(w, "{key}")?;
        }
        Ok(())
    })?;
    tracing::info!(blocks = summary.blocks, terms = summary.terms, lines = summary.lines, "split final index");
    Ok(summary)
}

fn write_block(
    paths: &IndexPaths,
    summary: &mut ShardSummary,
    secondary: &mut Vec<String>,
    block: &mut Vec<String>,
) -> Result<()> {
    if let Some((key, _)) = block.first().and_then(|l| split_line(l)) {
        secondary.push(key.to_string());
    }
    write_atomic(&paths.block(summary.blocks), |w| {
        for line in block.iter() {
            writeln!(w, "{line}")?;
        }
        Ok(())
    })?;
    summary.blocks += 1;
    block.clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_full_and_trailing_blocks() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        fs::write(
            paths.final_index(),
            "ant-b:d0-1\nant-t:d0-1\nbee-b:d1-1\n\ncat-c:d2-1\ncat-t:d2-1\n",
        )
        .unwrap();

        let summary = split_final_index(&paths, 2).unwrap();
        assert_eq!(summary, ShardSummary { blocks: 3, terms: 3, lines: 5 });
        assert_eq!(fs::read_to_string(paths.secondary_index()).unwrap(), "ant-b\nbee-b\ncat-t\n");
        assert_eq!(fs::read_to_string(paths.block(1)).unwrap(), "bee-b:d1-1\ncat-c:d2-1\n");
        assert_eq!(fs::read_to_string(paths.block(2)).unwrap(), "cat-t:d2-1\n");
    }

    #[test]
    fn undecodable_lines_do_not_shift_blocks() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        fs::write(paths.final_index(), "ant-b:d0-1
bogus:d9-1
bee-b:d1-1
cat-x:d3-1
cat-t:d2-1
").unwrap();

        let summary = split_final_index(&paths, 1).unwrap();
        assert_eq!(summary.blocks, 3);
        let secondary = crate::persist::load_secondary_index(&paths).unwrap();
        assert_eq!(secondary.len(), summary.blocks);
        assert_eq!(secondary[2], IndexKey::new("cat", crate::index::Field::Title));
        assert_eq!(fs::read_to_string(paths.block(2)).unwrap(), "cat-t:d2-1
");
    }

    #[test]
    fn hyphenated_terms_count_once() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        fs::write(paths.final_index(), "x-ray-b:d0-1\nx-ray-t:d0-1\nxylophone-b:d1-1\n").unwrap();
        let summary = split_final_index(&paths, 10_000).unwrap();
        assert_eq!(summary.terms, 2);
        assert_eq!(summary.blocks, 1);
    }
}
