//! Memory headroom for the display store. Posts and users stay in RAM until
//! the final shard drain, so the only lever a long run has is to report how
//! much room is left next to the store sizes and warn once when it runs low.

use parking_lot::Mutex;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use sysinfo::{System, SystemExt};

/// Below this share of total memory available, the store is close to the
/// point where the drain can no longer be reached.
pub const LOW_HEADROOM_FRACTION: f64 = 0.10;

const REFRESH_EVERY: Duration = Duration::from_millis(500);

/// Available memory at the last refresh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Headroom {
    pub available_bytes: u64,
    pub total_bytes: u64,
}

impl Headroom {
    /// Share of total memory still available, in `0.0..=1.0`. Unknown totals
    /// read as fully available.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        (self.available_bytes as f64 / self.total_bytes as f64).clamp(0.0, 1.0)
    }

    pub fn available_mib(&self) -> u64 {
        self.available_bytes / (1024 * 1024)
    }

    pub fn is_low(&self) -> bool {
        self.fraction() < LOW_HEADROOM_FRACTION
    }
}

struct Watch {
    sys: System,
    refreshed: Option<Instant>,
    last: Headroom,
}

static WATCH: OnceLock<Mutex<Watch>> = OnceLock::new();

/// Current headroom; `sysinfo` is queried at most every `REFRESH_EVERY`, so
/// this is cheap enough to call from the ingest loop.
pub fn headroom() -> Headroom {
    let watch = WATCH.get_or_init(|| {
        Mutex::new(Watch {
            sys: System::new(),
            refreshed: None,
            last: Headroom { available_bytes: 0, total_bytes: 0 },
        })
    });
    let mut w = watch.lock();
    let now = Instant::now();
    if w.refreshed.map_or(true, |at| now.duration_since(at) >= REFRESH_EVERY) {
        w.sys.refresh_memory();
        w.last = Headroom { available_bytes: w.sys.available_memory(), total_bytes: w.sys.total_memory() };
        w.refreshed = Some(now);
    }
    w.last
}

/// Shorthand for `headroom().fraction()`.
pub fn available_memory_fraction() -> f64 {
    headroom().fraction()
}
