use crate::unfold::DEFAULT_MAX_DEPTH;
use std::path::{Path, PathBuf};

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct DisplayOptions {
    pub output_dir: PathBuf,
    pub basename: Option<String>,       // if None, derived from the first input's file stem
    pub shard_size: usize,              // max posts per disp_tw_ shard
    pub max_depth: usize,               // embedding depth the unfolder will descend
    pub parallelism: Option<usize>,     // Some(N > 1) unfolds batches on an N-thread rayon pool
    pub batch_lines: usize,             // lines handed to the pool per batch
    pub progress: bool,                 // show progress bar
    pub progress_label: Option<String>, // optional label for progress bar
    pub log_every: u64,                 // lines between diagnostics log lines (0 = never)

    // IO tuning
    pub read_buffer_bytes: usize,
    pub write_buffer_bytes: usize,

    // output formatting
    pub timestamps_rfc3339: bool, // rewrite upstream created_at values as RFC 3339
    pub pretty_output: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            basename: None,
            shard_size: 10_000,
            max_depth: DEFAULT_MAX_DEPTH,
            parallelism: None,
            batch_lines: 4096,
            progress: true,
            progress_label: None,
            log_every: 100_000,

            read_buffer_bytes: 256 * 1024,
            write_buffer_bytes: 256 * 1024,

            timestamps_rfc3339: false,
            pretty_output: false,
        }
    }
}

impl DisplayOptions {
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_basename(mut self, name: impl Into<String>) -> Self {
        let name = name.into().trim().to_string();
        self.basename = if name.is_empty() { None } else { Some(name) };
        self
    }
    pub fn with_shard_size(mut self, n: usize) -> Self {
        self.shard_size = n.max(1);
        self
    }
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = Some(threads);
        self
    }
    pub fn with_batch_lines(mut self, n: usize) -> Self {
        self.batch_lines = n.max(1);
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_progress_label(mut self, label: impl Into<String>) -> Self {
        self.progress_label = Some(label.into());
        self
    }
    pub fn with_log_every(mut self, lines: u64) -> Self {
        self.log_every = lines;
        self
    }

    // IO buffers tuning
    pub fn with_io_read_buffer(mut self, bytes: usize) -> Self {
        self.read_buffer_bytes = bytes.max(8 * 1024);
        self
    }
    pub fn with_io_write_buffer(mut self, bytes: usize) -> Self {
        self.write_buffer_bytes = bytes.max(8 * 1024);
        self
    }

    pub fn with_rfc3339_timestamps(mut self, yes: bool) -> Self {
        self.timestamps_rfc3339 = yes;
        self
    }
    pub fn with_pretty_output(mut self, yes: bool) -> Self {
        self.pretty_output = yes;
        self
    }

    /// Overlay `DISPARCH_OUT` and `DISPARCH_SHARD_SIZE` from the environment.
    /// Unparsable values are logged and ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("DISPARCH_OUT") {
            if !dir.trim().is_empty() {
                self.output_dir = PathBuf::from(dir.trim());
            }
        }
        if let Ok(raw) = std::env::var("DISPARCH_SHARD_SIZE") {
            match raw.trim().parse::<usize>() {
                Ok(n) => self.shard_size = n.max(1),
                Err(_) => tracing::warn!("DISPARCH_SHARD_SIZE is set but not a number: {}", raw),
            }
        }
        self
    }

    /// Effective basename for output files.
    pub fn basename_for(&self, first_input: Option<&Path>) -> String {
        if let Some(b) = &self.basename {
            return b.clone();
        }
        first_input
            .and_then(stem_without_compression)
            .unwrap_or_else(|| "archive".to_string())
    }
}

/// `foo.jsonl.zst` → `foo`, `foo.json` → `foo`.
fn stem_without_compression(p: &Path) -> Option<String> {
    let name = p.file_name()?.to_str()?;
    let name = name.strip_suffix(".zst").unwrap_or(name);
    let stem = match name.rsplit_once('.') {
        Some((s, _)) if !s.is_empty() => s,
        _ => name,
    };
    Some(stem.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_defaults_to_input_stem() {
        let o = DisplayOptions::default();
        assert_eq!(o.basename_for(Some(Path::new("data/charlottesville_0010.json"))), "charlottesville_0010");
        assert_eq!(o.basename_for(Some(Path::new("x/dump.jsonl.zst"))), "dump");
        assert_eq!(o.basename_for(Some(Path::new("noext"))), "noext");
        assert_eq!(o.basename_for(None), "archive");
        let o = o.with_basename("cville");
        assert_eq!(o.basename_for(Some(Path::new("other.json"))), "cville");
    }

    #[test]
    fn shard_size_is_clamped() {
        assert_eq!(DisplayOptions::default().with_shard_size(0).shard_size, 1);
    }
}
