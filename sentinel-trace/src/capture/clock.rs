//! Monotonic tick source
//!
//! Producer-assigned timestamps must not touch wall-clock services, so
//! ticks are microseconds since the first use in this process.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

pub fn ticks_now() -> u64 {
    let epoch = *EPOCH.get_or_init(Instant::now);
    Instant::now().duration_since(epoch).as_micros() as u64
}
