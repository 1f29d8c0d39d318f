//! Non-blocking `SharedQueue`: a spin-guarded FIFO with a staged backoff
//! policy instead of OS-level parking (§4.3 "Yield strategies", §9 "Spin/
//! backoff loops replacing blocking primitives").

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::YieldStrategy;
use crate::counters::{Counter, ThreadCounters};
use crate::mailbox::MailboxRef;

use super::queue::SharedQueue;
use super::spinlock::SpinLock;

/// Backoff escalation thresholds, in empty-poll counts, before moving to
/// the next stage. Tuned so `aggressive` never leaves the pure-spin stage.
struct BackoffThresholds {
    yield_after: u32,
    sleep_after: u32,
}

impl BackoffThresholds {
    fn for_strategy(strategy: YieldStrategy) -> Self {
        match strategy {
            YieldStrategy::Aggressive => BackoffThresholds {
                yield_after: u32::MAX,
                sleep_after: u32::MAX,
            },
            YieldStrategy::Strong => BackoffThresholds {
                yield_after: 4_000,
                sleep_after: 40_000,
            },
            YieldStrategy::Polite | YieldStrategy::Blocking => BackoffThresholds {
                yield_after: 200,
                sleep_after: 2_000,
            },
        }
    }
}

pub struct NonBlockingShared {
    inner: SpinLock<VecDeque<MailboxRef>>,
    strategy: YieldStrategy,
    waiters: AtomicU32,
}

impl NonBlockingShared {
    pub fn new(strategy: YieldStrategy) -> Self {
        NonBlockingShared {
            inner: SpinLock::new(VecDeque::new()),
            strategy,
            waiters: AtomicU32::new(0),
        }
    }
}

impl SharedQueue for NonBlockingShared {
    fn push(&self, mailbox: MailboxRef) {
        self.inner.lock().push_back(mailbox);
    }

    /// Pops if anything is queued; otherwise runs exactly one step of the
    /// staged backoff escalation (tight pause-loop -> short yields ->
    /// OS-level yield -> brief sleep) and returns `None`. The caller's
    /// dispatch loop re-invokes `pop` on the next iteration, so the
    /// escalation is observed across repeated calls via the per-thread
    /// poll counter below, not within a single call.
    fn pop(&self, counters: &ThreadCounters) -> Option<MailboxRef> {
        if let Some(mailbox) = self.inner.lock().pop_front() {
            return Some(mailbox);
        }

        let thresholds = BackoffThresholds::for_strategy(self.strategy);
        let polls = self.waiters.fetch_add(1, Ordering::Relaxed);
        counters.incr(Counter::Yields);

        if polls < thresholds.yield_after {
            std::hint::spin_loop();
        } else if polls < thresholds.sleep_after {
            std::thread::yield_now();
        } else {
            std::thread::sleep(std::time::Duration::from_micros(200));
        }
        None
    }

    fn wake_all(&self) {
        // No parked threads to wake in the non-blocking variant; resets
        // the shared backoff counter so the next empty poll restarts at
        // the tight-spin stage instead of the stage it happened to reach
        // while there was nothing to do.
        self.waiters.store(0, Ordering::Relaxed);
    }

    fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
