//! Shard writer: drains the final stores to disk.
//!
//! Posts are cut into consecutive chunks of at most `shard_size` entries in
//! store order, so the same store and size always give the same partition.
//! Each file is written to `<name>.inprogress` and promoted atomically;
//! shards already promoted stay on disk if a later write fails.

use crate::model::{CanonicalPost, CanonicalUser, Keyed};
use crate::util::{create_with_backoff, replace_file_atomic_backoff};
use anyhow::{Context, Result};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

pub fn shard_file_name(basename: &str, n: usize) -> String {
    format!("disp_tw_{basename}-{n:03}.json")
}

pub fn id_index_file_name(basename: &str) -> String {
    format!("disp_twids_{basename}.json")
}

pub fn users_file_name(basename: &str) -> String {
    format!("disp_users_{basename}.json")
}

/// Consecutive index ranges of at most `limit` items (limit clamped to 1).
pub fn plan_shards(len: usize, limit: usize) -> Vec<Range<usize>> {
    let limit = limit.max(1);
    (0..len)
        .step_by(limit)
        .map(|start| start..(start + limit).min(len))
        .collect()
}

/// Serializes a slice of keyed records as one JSON object `{key: record}`,
/// keeping slice order.
struct KeyedObject<'a, T>(&'a [T]);

impl<T: Keyed + Serialize> Serialize for KeyedObject<'_, T> {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_map(self.0.iter().map(|t| (t.key(), t)))
    }
}

#[derive(Clone, Debug)]
pub struct ShardConfig {
    pub out_dir: PathBuf,
    pub basename: String,
    pub shard_size: usize,
    pub write_buffer_bytes: usize,
    pub pretty: bool,
}

/// Result of `write_shards`.
#[derive(Clone, Debug, Default)]
pub struct ShardManifest {
    pub shard_files: Vec<PathBuf>,
    /// post id → shard file name (not path)
    pub id_index: BTreeMap<String, String>,
    pub id_index_path: PathBuf,
}

/// Write every post shard plus the combined id → filename index.
pub fn write_shards(posts: &[CanonicalPost], cfg: &ShardConfig) -> Result<ShardManifest> {
    std::fs::create_dir_all(&cfg.out_dir)
        .with_context(|| format!("create output dir {}", cfg.out_dir.display()))?;

    let mut manifest = ShardManifest::default();
    for (n, range) in plan_shards(posts.len(), cfg.shard_size).into_iter().enumerate() {
        let name = shard_file_name(&cfg.basename, n);
        let path = cfg.out_dir.join(&name);
        let chunk = &posts[range];
        write_json_atomic(&path, &KeyedObject(chunk), cfg.pretty, cfg.write_buffer_bytes)?;
        for post in chunk {
            manifest.id_index.insert(post.id.clone(), name.clone());
        }
        tracing::debug!(shard = %name, posts = chunk.len(), "shard written");
        manifest.shard_files.push(path);
    }

    let index_path = cfg.out_dir.join(id_index_file_name(&cfg.basename));
    write_json_atomic(&index_path, &manifest.id_index, cfg.pretty, cfg.write_buffer_bytes)?;
    manifest.id_index_path = index_path;

    tracing::info!(
        shards = manifest.shard_files.len(),
        posts = posts.len(),
        "post shards written"
    );
    Ok(manifest)
}

/// Write the whole user store as one object keyed by user id.
pub fn write_users(users: &[CanonicalUser], cfg: &ShardConfig) -> Result<PathBuf> {
    std::fs::create_dir_all(&cfg.out_dir)
        .with_context(|| format!("create output dir {}", cfg.out_dir.display()))?;
    let path = cfg.out_dir.join(users_file_name(&cfg.basename));
    write_json_atomic(&path, &KeyedObject(users), cfg.pretty, cfg.write_buffer_bytes)?;
    tracing::info!(users = users.len(), path = %path.display(), "user file written");
    Ok(path)
}

fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    pretty: bool,
    write_buf: usize,
) -> Result<()> {
    let tmp = path.with_extension("json.inprogress");
    let f = create_with_backoff(&tmp, 16, 50).with_context(|| format!("create {}", tmp.display()))?;
    let mut w = BufWriter::with_capacity(write_buf.max(8 * 1024), f);
    let written = if pretty {
        serde_json::to_writer_pretty(&mut w, value)
    } else {
        serde_json::to_writer(&mut w, value)
    };
    written.with_context(|| format!("serialize {}", tmp.display()))?;
    w.flush().with_context(|| format!("flush {}", tmp.display()))?;
    drop(w);
    replace_file_atomic_backoff(&tmp, path)
}
