//! Small ambient helpers centralized rather than called ad hoc, matching
//! the teacher's habit of wrapping `Uuid::new_v4`/clock access in one spot
//! (see `document::core::Document::new`).

use crate::types::RecordId;
use std::thread;
use std::time::Duration;

#[must_use]
pub fn new_record_id() -> RecordId {
    RecordId::new_v4()
}

/// Monotonic nanosecond timestamp used for shard `last_accessed` stamps.
#[must_use]
pub fn now_ns() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    let start = START.get_or_init(std::time::Instant::now);
    start.elapsed().as_nanos() as u64
}

/// Bounded retry with fixed backoff, used by the codec's framed save path
/// and the collection's persistence worker.
pub fn with_retry<T, E>(
    attempts: u32,
    backoff: Duration,
    mut op: impl FnMut() -> std::result::Result<T, E>,
) -> std::result::Result<T, E> {
    let mut last_err = None;
    for attempt in 0..attempts.max(1) {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) => {
                last_err = Some(e);
                if attempt + 1 < attempts {
                    thread::sleep(backoff);
                }
            }
        }
    }
    Err(last_err.expect("attempts >= 1 guarantees at least one error"))
}
