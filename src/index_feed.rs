//! Read-side of the shard contract, as the search-index builder sees it:
//! discover `disp_tw_*.json` shards and project each post onto the indexed
//! fields. Building the term index itself happens elsewhere.

use crate::model::CanonicalPost;
use crate::ndjson::NdjsonWriter;
use crate::util::open_with_backoff;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Document handed to the indexer: ref = `id`, fields = the rest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub id: String,
    pub text: String,
    pub user_screen_name: String,
    pub hashtags: Vec<String>,
}

impl From<CanonicalPost> for IndexDocument {
    fn from(p: CanonicalPost) -> Self {
        Self { id: p.id, text: p.text, user_screen_name: p.user_screen_name, hashtags: p.hashtags }
    }
}

/// Shard files directly under `dir`, sorted by name.
pub fn discover_shards(dir: &Path) -> Result<Vec<PathBuf>> {
    let re = Regex::new(r"^disp_tw_.+-\d{3,}\.json$").context("shard name pattern")?;
    let mut out = Vec::new();
    if !dir.exists() {
        return Ok(out);
    }
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("list {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_str().map_or(false, |n| re.is_match(n)) {
            out.push(entry.path().to_path_buf());
        }
    }
    out.sort();
    Ok(out)
}

/// Every post of every shard in `dir`, projected for indexing.
/// Within a shard, documents come out in id order.
pub fn collect_index_documents(dir: &Path) -> Result<Vec<IndexDocument>> {
    let mut docs = Vec::new();
    for path in discover_shards(dir)? {
        let f = open_with_backoff(&path, 16, 50).with_context(|| format!("open {}", path.display()))?;
        let shard: BTreeMap<String, CanonicalPost> = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse shard {}", path.display()))?;
        docs.extend(shard.into_values().map(IndexDocument::from));
    }
    tracing::info!(docs = docs.len(), dir = %dir.display(), "index documents collected");
    Ok(docs)
}

/// Write documents as NDJSON for an external indexer.
pub fn write_index_documents(docs: &[IndexDocument], out: &Path, write_buf: usize) -> Result<PathBuf> {
    let mut w = NdjsonWriter::create(out, write_buf)?;
    for d in docs {
        let line = serde_json::to_string(d)?;
        w.write_line(&line).with_context(|| format!("write {}", out.display()))?;
    }
    w.finish()
}
