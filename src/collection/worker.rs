//! The debounced background saver. One logical worker per collection,
//! woken by a condition variable rather than polled, unlike the teacher's
//! cache purge thread (`src/cache/core.rs`), which sleeps on a fixed
//! interval; a flush schedule needs debounce with a max delay, so this
//! models `arm`/`wake`/`cancel` explicitly over a `Mutex` + `Condvar`
//! instead of a bare sleep loop.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct SchedulerState {
    alive: bool,
    /// Timestamp of the most recent actual flush, or of the first
    /// `schedule_save` call if no flush has happened yet.
    last_save_time: Option<Instant>,
    /// When the worker should next wake and flush, if a timer is armed.
    deadline: Option<Instant>,
    /// Set to force an immediate wake regardless of `deadline`.
    wake_now: bool,
}

/// Shared between the scheduling side (`schedule_save`, called from every
/// mutator) and the worker thread that waits on it.
pub struct SaveScheduler {
    state: Mutex<SchedulerState>,
    condvar: Condvar,
    debounce: Duration,
    max_save_delay: Duration,
}

impl SaveScheduler {
    #[must_use]
    pub fn new(debounce: Duration, max_save_delay: Duration) -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                alive: true,
                last_save_time: None,
                deadline: None,
                wake_now: false,
            }),
            condvar: Condvar::new(),
            debounce,
            max_save_delay,
        }
    }

    /// `scheduleSave`: debounce with a max-delay escape hatch.
    pub fn schedule_save(&self) {
        let now = Instant::now();
        let mut state = self.state.lock();
        match state.last_save_time {
            None => {
                state.last_save_time = Some(now);
                state.deadline = Some(now + self.debounce);
            }
            Some(last) if now.saturating_duration_since(last) > self.max_save_delay => {
                state.wake_now = true;
            }
            Some(_) => {
                state.deadline = Some(now + self.debounce);
            }
        }
        self.condvar.notify_all();
    }

    /// Called by the worker after a successful flush cycle.
    fn record_save(&self) {
        let mut state = self.state.lock();
        state.last_save_time = Some(Instant::now());
        state.deadline = None;
        state.wake_now = false;
    }

    /// Block until either a flush is due or the scheduler has been shut
    /// down. Returns `false` once shutdown has been observed and no final
    /// flush is owed.
    fn wait_for_wake(&self) -> Wake {
        let mut state = self.state.lock();
        loop {
            if !state.alive {
                return Wake::Shutdown;
            }
            if state.wake_now {
                state.wake_now = false;
                return Wake::Flush;
            }
            match state.deadline {
                None => {
                    self.condvar.wait(&mut state);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        state.deadline = None;
                        return Wake::Flush;
                    }
                    self.condvar.wait_for(&mut state, deadline - now);
                }
            }
        }
    }

    /// Cancel any pending timer, mark the scheduler dead, and wake the
    /// worker so it can perform its final flush and exit.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.alive = false;
        state.deadline = None;
        self.condvar.notify_all();
    }
}

enum Wake {
    Flush,
    Shutdown,
}

/// Spawn the background saver thread. `flush` is invoked on every debounced
/// wake and once more, synchronously from the worker's point of view, as
/// the last thing the thread does before `shutdown()`'s caller's `join`
/// returns, so in-flight storage operations complete before shutdown does.
pub fn spawn(scheduler: Arc<SaveScheduler>, mut flush: impl FnMut() + Send + 'static) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || loop {
        match scheduler.wait_for_wake() {
            Wake::Flush => {
                flush();
                scheduler.record_save();
            }
            Wake::Shutdown => {
                flush();
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn debounced_schedule_flushes_once_the_timer_elapses() {
        let scheduler = Arc::new(SaveScheduler::new(Duration::from_millis(20), Duration::from_secs(10)));
        let flushes = Arc::new(AtomicUsize::new(0));
        let flushes_clone = flushes.clone();
        let handle = spawn(scheduler.clone(), move || {
            flushes_clone.fetch_add(1, Ordering::SeqCst);
        });

        scheduler.schedule_save();
        scheduler.schedule_save();
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(flushes.load(Ordering::SeqCst), 1);

        scheduler.shutdown();
        handle.join().unwrap();
        assert_eq!(flushes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn max_save_delay_forces_an_immediate_wake() {
        let scheduler = Arc::new(SaveScheduler::new(Duration::from_secs(10), Duration::from_millis(10)));
        let flushes = Arc::new(AtomicUsize::new(0));
        let flushes_clone = flushes.clone();
        let handle = spawn(scheduler.clone(), move || {
            flushes_clone.fetch_add(1, Ordering::SeqCst);
        });

        scheduler.schedule_save();
        std::thread::sleep(Duration::from_millis(20));
        scheduler.schedule_save();
        std::thread::sleep(Duration::from_millis(20));
        assert!(flushes.load(Ordering::SeqCst) >= 1);

        scheduler.shutdown();
        handle.join().unwrap();
    }

    #[test]
    fn shutdown_with_no_pending_work_still_runs_final_flush() {
        let scheduler = Arc::new(SaveScheduler::new(Duration::from_millis(5), Duration::from_secs(10)));
        let flushes = Arc::new(AtomicUsize::new(0));
        let flushes_clone = flushes.clone();
        let handle = spawn(scheduler.clone(), move || {
            flushes_clone.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.shutdown();
        handle.join().unwrap();
        assert_eq!(flushes.load(Ordering::SeqCst), 1);
    }
}
