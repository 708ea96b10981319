//! Progress reporting and run diagnostics: a byte-based progress bar over the
//! input files and periodic counter logging. Nothing here affects output.

use crate::dedupe::MergeStats;
use crate::error::RecordError;
use crate::mem::{headroom, LOW_HEADROOM_FRACTION};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub fn make_progress_bar_labeled(total_bytes: u64, label: Option<&str>) -> ProgressBar {
    let pb = ProgressBar::new(total_bytes);
    let style = ProgressStyle::with_template(
        "{spinner:.green} {msg} {bytes:>10}/{total_bytes:<10} [{bar:.cyan/blue}] {percent:>3}%  \
         {bytes_per_sec}  elapsed: {elapsed_precise}  eta: {eta_precise}"
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ");
    pb.set_style(style);
    if let Some(msg) = label {
        pb.set_message(msg.to_string());
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn total_input_size<P: AsRef<Path>>(files: &[P]) -> u64 {
    files
        .iter()
        .map(|p| std::fs::metadata(p.as_ref()).map(|m| m.len()).unwrap_or(0))
        .sum()
}

/// Small wrapper around an optional `indicatif` bar, so call sites don't branch.
pub struct ProgressScope {
    pb: Option<ProgressBar>,
}

impl ProgressScope {
    pub fn bytes(enabled: bool, label: Option<&str>, total_bytes: u64) -> Self {
        let pb = enabled.then(|| make_progress_bar_labeled(total_bytes, label));
        Self { pb }
    }
    #[inline]
    pub fn inc_bytes(&self, delta: u64) {
        if let Some(pb) = &self.pb {
            pb.inc(delta);
        }
    }
    pub fn finish<T: Into<String>>(&self, msg: T) {
        if let Some(pb) = &self.pb {
            pb.finish_with_message(msg.into());
        }
    }
}

/// Line-level counters for one run. Merge decisions live in `MergeStats`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub files_read: u64,
    pub files_truncated: u64,
    pub lines_read: u64,
    pub lines_blank: u64,
    pub lines_skipped: u64,
    /// skip reason → count
    pub skipped_by_kind: BTreeMap<&'static str, u64>,
    pub merge: MergeStats,
}

impl RunStats {
    pub fn record_skip(&mut self, err: &RecordError) {
        self.lines_skipped += 1;
        *self.skipped_by_kind.entry(err.kind()).or_insert(0) += 1;
    }
}

/// Emits an `info` line every `every` lines and warns once on low memory.
pub struct Diagnostics {
    every: u64,
    warned_low_memory: bool,
}

impl Diagnostics {
    pub fn new(every: u64) -> Self {
        Self { every, warned_low_memory: false }
    }

    pub fn tick(&mut self, stats: &RunStats, merge: &MergeStats, posts: usize, users: usize) {
        if self.every == 0 || stats.lines_read == 0 || stats.lines_read % self.every != 0 {
            return;
        }
        let room = headroom();
        tracing::info!(
            lines = stats.lines_read,
            skipped = stats.lines_skipped,
            posts,
            users,
            folded = merge.reposts_folded,
            dangling = merge.reposts_dangling,
            mem_free = room.fraction(),
            mem_free_mib = room.available_mib(),
            "ingest progress"
        );
        if !self.warned_low_memory && room.is_low() {
            self.warned_low_memory = true;
            tracing::warn!(
                posts,
                users,
                mem_free_mib = room.available_mib(),
                "available memory below {:.0}%; the post store is held in RAM until the shard drain",
                LOW_HEADROOM_FRACTION * 100.0
            );
        }
    }
}
