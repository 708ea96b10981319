use crate::util::{create_with_backoff, open_with_backoff, replace_file_atomic_backoff};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use zstd::stream::read::Decoder;

/// A `Read` wrapper that counts on-disk (possibly compressed) bytes read.
struct CountingReader<R: Read> {
    inner: R,
    counter: Arc<AtomicU64>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// NDJSON line reader over plain or `.zst` input.
///
/// Lines come back as raw bytes so that invalid UTF-8 stays a per-line
/// problem instead of an I/O error for the whole file.
pub struct NdjsonReader {
    rdr: Box<dyn BufRead>,
    counter: Arc<AtomicU64>,
    reported: u64,
}

impl NdjsonReader {
    pub fn open(path: &Path, buf_bytes: usize) -> io::Result<Self> {
        let f = open_with_backoff(path, 16, 50)?;
        let counter = Arc::new(AtomicU64::new(0));
        let counted = CountingReader { inner: f, counter: counter.clone() };
        let cap = buf_bytes.max(8 * 1024);

        let rdr: Box<dyn BufRead> = if is_zstd(path) {
            let mut decoder = Decoder::new(counted)?;
            decoder.window_log_max(31)?;
            Box::new(BufReader::with_capacity(cap, decoder))
        } else {
            Box::new(BufReader::with_capacity(cap, counted))
        };
        Ok(Self { rdr, counter, reported: 0 })
    }

    /// Read the next line into `buf`. Returns the number of bytes read (0 on EOF).
    /// Strips trailing `\r?\n`.
    pub fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        buf.clear();
        let n = self.rdr.read_until(b'\n', buf)?;
        if n == 0 { return Ok(0); }
        if buf.ends_with(b"\n") {
            buf.pop();
            if buf.ends_with(b"\r") { buf.pop(); }
        }
        Ok(n)
    }

    /// On-disk bytes consumed since the previous call.
    pub fn take_progress(&mut self) -> u64 {
        let cur = self.counter.load(Ordering::Relaxed);
        let delta = cur.saturating_sub(self.reported);
        self.reported = cur;
        delta
    }
}

fn is_zstd(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()).map_or(false, |e| e.eq_ignore_ascii_case("zst"))
}

/// Minimal NDJSON writer with buffering and robust file creation.
/// Writes go to `<path>.inprogress`; `finish` promotes atomically.
pub struct NdjsonWriter {
    tmp: PathBuf,
    path: PathBuf,
    w: Option<BufWriter<File>>,
}

impl NdjsonWriter {
    pub fn create(path: &Path, buf_bytes: usize) -> Result<Self> {
        let tmp = path.with_extension("ndjson.inprogress");
        let f = create_with_backoff(&tmp, 16, 50).with_context(|| format!("create {}", tmp.display()))?;
        Ok(Self {
            tmp,
            path: path.to_path_buf(),
            w: Some(BufWriter::with_capacity(buf_bytes.max(8 * 1024), f)),
        })
    }

    #[inline]
    pub fn write_line(&mut self, s: &str) -> io::Result<()> {
        if let Some(w) = &mut self.w {
            w.write_all(s.as_bytes())?;
            w.write_all(b"\n")?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<PathBuf> {
        if let Some(mut w) = self.w.take() {
            w.flush().with_context(|| format!("flush {}", self.tmp.display()))?;
        }
        replace_file_atomic_backoff(&self.tmp, &self.path)?;
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_plain_and_zstd_lines_as_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("a.jsonl");
        std::fs::write(&plain, b"{\"a\":1}\r\n\xff\xfe\n\nlast").unwrap();

        let zst = dir.path().join("a.jsonl.zst");
        let f = File::create(&zst).unwrap();
        let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
        enc.write_all(b"{\"a\":1}\r\n\xff\xfe\n\nlast").unwrap();
        enc.finish().unwrap();

        for p in [&plain, &zst] {
            let mut r = NdjsonReader::open(p, 8 * 1024).unwrap();
            let mut buf = Vec::new();
            let mut lines = Vec::new();
            while r.read_line(&mut buf).unwrap() > 0 {
                lines.push(buf.clone());
            }
            assert_eq!(lines, vec![b"{\"a\":1}".to_vec(), vec![0xff, 0xfe], vec![], b"last".to_vec()]);
            let consumed = r.take_progress();
            assert!(consumed > 0 && consumed <= std::fs::metadata(p).unwrap().len());
            assert_eq!(r.take_progress(), 0);
        }
    }

    #[test]
    fn writer_promotes_on_finish() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("docs.ndjson");
        let mut w = NdjsonWriter::create(&out, 0).unwrap();
        w.write_line("{}").unwrap();
        assert!(!out.exists());
        let p = w.finish().unwrap();
        assert_eq!(std::fs::read_to_string(p).unwrap(), "{}\n");
    }
}
