//! End-to-end driver: stream input lines → unfold → merge → shard.
//!
//! Lines are read in batches. With `parallelism > 1` each batch is decoded and
//! unfolded on a rayon pool (unfolding is pure per line); the results come
//! back in input order and are merged on the calling thread, so the store has
//! exactly one writer and the output matches a sequential run.

use crate::config::DisplayOptions;
use crate::dedupe::DisplayStore;
use crate::error::RecordError;
use crate::ndjson::NdjsonReader;
use crate::progress::{total_input_size, Diagnostics, ProgressScope, RunStats};
use crate::shard::{write_shards, write_users, ShardConfig, ShardManifest};
use crate::unfold::{Unfolded, Unfolder};
use crate::util::init_tracing_once;
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Clone, Default)]
pub struct DisplayETL {
    pub(crate) opts: DisplayOptions,
}

/// Everything a finished run produced.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub basename: String,
    pub manifest: ShardManifest,
    pub users_path: PathBuf,
    pub posts_written: usize,
    pub users_written: usize,
    pub stats: RunStats,
}

/// Per-input state threaded through `ingest_*`.
pub struct Ingest {
    pub store: DisplayStore,
    pub stats: RunStats,
    diagnostics: Diagnostics,
}

impl Ingest {
    pub fn new(log_every: u64) -> Self {
        Self { store: DisplayStore::new(), stats: RunStats::default(), diagnostics: Diagnostics::new(log_every) }
    }

    fn apply(&mut self, decoded: Option<Result<Unfolded, RecordError>>) {
        self.stats.lines_read += 1;
        match decoded {
            None => self.stats.lines_blank += 1,
            Some(Ok(unfolded)) => {
                self.store.merge(unfolded);
            }
            Some(Err(e)) => {
                tracing::debug!(line = self.stats.lines_read, kind = e.kind(), "skipping line: {e}");
                self.stats.record_skip(&e);
            }
        }
        self.diagnostics.tick(
            &self.stats,
            self.store.stats(),
            self.store.posts().len(),
            self.store.users().len(),
        );
    }
}

/// Decode one raw line. `None` for blank lines.
pub fn decode_line(line: &[u8], unfolder: &Unfolder) -> Option<Result<Unfolded, RecordError>> {
    let text = match std::str::from_utf8(line) {
        Ok(t) => t,
        Err(e) => return Some(Err(e.into())),
    };
    if text.trim().is_empty() {
        return None;
    }
    Some(
        serde_json::from_str::<Value>(text)
            .map_err(RecordError::from)
            .and_then(|raw| unfolder.unfold(&raw)),
    )
}

impl DisplayETL {
    pub fn new() -> Self {
        Self { opts: DisplayOptions::default() }
    }

    pub fn from_options(opts: DisplayOptions) -> Self {
        Self { opts }
    }

    // -------- Builder methods --------
    pub fn output_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_output_dir(dir); self }
    pub fn basename(mut self, name: impl Into<String>) -> Self { self.opts = self.opts.with_basename(name); self }
    pub fn shard_size(mut self, n: usize) -> Self { self.opts = self.opts.with_shard_size(n); self }
    pub fn max_depth(mut self, depth: usize) -> Self { self.opts = self.opts.with_max_depth(depth); self }
    pub fn parallelism(mut self, threads: usize) -> Self { self.opts = self.opts.with_parallelism(threads); self }
    pub fn batch_lines(mut self, n: usize) -> Self { self.opts = self.opts.with_batch_lines(n); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn progress_label(mut self, label: impl Into<String>) -> Self { self.opts = self.opts.with_progress_label(label); self }
    pub fn log_every(mut self, lines: u64) -> Self { self.opts = self.opts.with_log_every(lines); self }
    pub fn io_read_buffer(mut self, bytes: usize) -> Self { self.opts = self.opts.with_io_read_buffer(bytes); self }
    pub fn io_write_buffer(mut self, bytes: usize) -> Self { self.opts = self.opts.with_io_write_buffer(bytes); self }
    pub fn timestamps_rfc3339(mut self, yes: bool) -> Self { self.opts = self.opts.with_rfc3339_timestamps(yes); self }
    pub fn pretty_output(mut self, yes: bool) -> Self { self.opts = self.opts.with_pretty_output(yes); self }

    pub fn options(&self) -> &DisplayOptions {
        &self.opts
    }

    pub fn unfolder(&self) -> Unfolder {
        Unfolder::new(self.opts.max_depth, self.opts.timestamps_rfc3339)
    }

    fn build_pool(&self) -> Result<Option<rayon::ThreadPool>> {
        match self.opts.parallelism {
            Some(n) if n > 1 => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("unfold-{i}"))
                    .build()
                    .context("build unfold thread pool")?;
                Ok(Some(pool))
            }
            _ => Ok(None),
        }
    }

    /// Feed in-memory lines (tests, small inputs). Same path as file ingestion.
    pub fn ingest_lines<'a, I>(&self, ingest: &mut Ingest, lines: I)
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let unfolder = self.unfolder();
        for line in lines {
            ingest.apply(decode_line(line, &unfolder));
        }
    }

    /// Stream one NDJSON (optionally `.zst`) file into `ingest`.
    /// A decode failure partway through a compressed file ends that file with a
    /// warning; records read before it are kept.
    pub fn ingest_file(
        &self,
        ingest: &mut Ingest,
        path: &Path,
        pool: Option<&rayon::ThreadPool>,
        progress: &ProgressScope,
    ) -> Result<()> {
        let mut rdr = NdjsonReader::open(path, self.opts.read_buffer_bytes)
            .with_context(|| format!("open {}", path.display()))?;
        let unfolder = self.unfolder();
        let batch_size = self.opts.batch_lines.max(1);
        let mut batch: Vec<Vec<u8>> = Vec::with_capacity(batch_size);
        let mut buf = Vec::with_capacity(16 * 1024);

        ingest.stats.files_read += 1;
        loop {
            let n = match rdr.read_line(&mut buf) {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "stopping read after decode error: {e}");
                    ingest.stats.files_truncated += 1;
                    0
                }
            };
            progress.inc_bytes(rdr.take_progress());
            if n > 0 {
                batch.push(std::mem::take(&mut buf));
            }
            if batch.len() >= batch_size || (n == 0 && !batch.is_empty()) {
                self.process_batch(ingest, &batch, &unfolder, pool);
                batch.clear();
            }
            if n == 0 {
                break;
            }
        }
        Ok(())
    }

    fn process_batch(&self, ingest: &mut Ingest, batch: &[Vec<u8>], unfolder: &Unfolder, pool: Option<&rayon::ThreadPool>) {
        match pool {
            Some(pool) => {
                let decoded: Vec<_> = pool.install(|| {
                    batch.par_iter().map(|line| decode_line(line, unfolder)).collect()
                });
                for d in decoded {
                    ingest.apply(d);
                }
            }
            None => {
                for line in batch {
                    ingest.apply(decode_line(line, unfolder));
                }
            }
        }
    }

    /// Terminal step: drain the store into shard, index and user files.
    pub fn write_outputs(&self, ingest: Ingest, basename: &str) -> Result<RunSummary> {
        let Ingest { store, mut stats, .. } = ingest;
        let (posts, users, merge) = store.into_parts();
        stats.merge = merge;

        let cfg = ShardConfig {
            out_dir: self.opts.output_dir.clone(),
            basename: basename.to_string(),
            shard_size: self.opts.shard_size,
            write_buffer_bytes: self.opts.write_buffer_bytes,
            pretty: self.opts.pretty_output,
        };
        let manifest = write_shards(&posts, &cfg)?;
        let users_path = write_users(&users, &cfg)?;

        Ok(RunSummary {
            basename: basename.to_string(),
            manifest,
            users_path,
            posts_written: posts.len(),
            users_written: users.len(),
            stats,
        })
    }

    /// Process `inputs` into one store and write one output set.
    pub fn run<P: AsRef<Path>>(&self, inputs: &[P]) -> Result<RunSummary> {
        init_tracing_once();
        let basename = self.opts.basename_for(inputs.first().map(|p| p.as_ref()));
        let pool = self.build_pool()?;
        let progress = ProgressScope::bytes(
            self.opts.progress,
            self.opts.progress_label.as_deref(),
            total_input_size(inputs),
        );

        tracing::info!(inputs = inputs.len(), %basename, "starting display extraction");
        let mut ingest = Ingest::new(self.opts.log_every);
        for path in inputs {
            let path = path.as_ref();
            self.ingest_file(&mut ingest, path, pool.as_ref(), &progress)
                .with_context(|| format!("processing {}", path.display()))?;
        }
        progress.finish("input read");

        let summary = self.write_outputs(ingest, &basename)?;
        let s = &summary.stats;
        tracing::info!(
            lines = s.lines_read,
            skipped = s.lines_skipped,
            posts = summary.posts_written,
            users = summary.users_written,
            shards = summary.manifest.shard_files.len(),
            folded = s.merge.reposts_folded,
            dangling = s.merge.reposts_dangling,
            fields_dropped = s.merge.fields_dropped,
            "run complete"
        );
        Ok(summary)
    }
}
