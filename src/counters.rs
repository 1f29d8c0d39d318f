//! Per-worker event counters, aggregated on read (§3 C12, §6).

use std::sync::atomic::{AtomicU64, Ordering};

/// Contract-stable counter names (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    MessagesProcessed,
    ThreadsPulsed,
    ThreadsWoken,
    LocalPushes,
    SharedPushes,
    Yields,
    MailboxQueueMax,
}

const COUNTER_COUNT: usize = 7;

impl Counter {
    fn index(self) -> usize {
        match self {
            Counter::MessagesProcessed => 0,
            Counter::ThreadsPulsed => 1,
            Counter::ThreadsWoken => 2,
            Counter::LocalPushes => 3,
            Counter::SharedPushes => 4,
            Counter::Yields => 5,
            Counter::MailboxQueueMax => 6,
        }
    }

    pub const ALL: [Counter; COUNTER_COUNT] = [
        Counter::MessagesProcessed,
        Counter::ThreadsPulsed,
        Counter::ThreadsWoken,
        Counter::LocalPushes,
        Counter::SharedPushes,
        Counter::Yields,
        Counter::MailboxQueueMax,
    ];
}

/// One worker thread's private counter bank. Written only by its owning
/// thread — no synchronization needed on the increment path (§5 "Shared
/// resource policy": per-thread caches require no synchronization for
/// reads/writes by the owning thread).
#[derive(Default)]
pub struct ThreadCounters {
    values: [AtomicU64; COUNTER_COUNT],
}

impl ThreadCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self, counter: Counter) {
        self.values[counter.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_max(&self, counter: Counter, candidate: u64) {
        let cell = &self.values[counter.index()];
        let mut current = cell.load(Ordering::Relaxed);
        while candidate > current {
            match cell.compare_exchange_weak(
                current,
                candidate,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.values[counter.index()].load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        for v in &self.values {
            v.store(0, Ordering::Relaxed);
        }
    }
}

/// Aggregation across every worker thread's [`ThreadCounters`] — the
/// Framework-facing `get_counter` / `get_per_thread_counters` API (§6). A
/// short lock over the `Vec` of thread contexts is taken only while
/// aggregating, matching §5's "aggregation functions read under a short
/// lock over the list of thread contexts".
pub struct CounterRegistry {
    threads: std::sync::Mutex<Vec<std::sync::Arc<ThreadCounters>>>,
}

impl CounterRegistry {
    pub fn new() -> Self {
        CounterRegistry {
            threads: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn register_thread(&self, counters: std::sync::Arc<ThreadCounters>) {
        self.threads.lock().unwrap().push(counters);
    }

    pub fn unregister_all(&self) {
        self.threads.lock().unwrap().clear();
    }

    pub fn get(&self, counter: Counter) -> u64 {
        let threads = self.threads.lock().unwrap();
        if counter == Counter::MailboxQueueMax {
            threads.iter().map(|t| t.get(counter)).max().unwrap_or(0)
        } else {
            threads.iter().map(|t| t.get(counter)).sum()
        }
    }

    pub fn get_per_thread(&self, counter: Counter, out: &mut Vec<u64>) {
        let threads = self.threads.lock().unwrap();
        out.clear();
        out.extend(threads.iter().map(|t| t.get(counter)));
    }

    pub fn reset_all(&self) {
        let threads = self.threads.lock().unwrap();
        for t in threads.iter() {
            t.reset();
        }
    }
}

impl Default for CounterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
