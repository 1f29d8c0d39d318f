//! The worker-thread pool: owns the [`WorkQueue`](queue::WorkQueue), spawns
//! and joins OS threads, and drives each worker's dispatch loop (§3 C7, §4.3,
//! §4.7 "Thread scaling").

pub mod blocking;
pub mod nonblocking;
pub mod queue;
pub mod spinlock;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{debug, trace};

use crate::config::{FrameworkConfig, YieldStrategy};
use crate::counters::{Counter, CounterRegistry};
use crate::mailbox::MailboxRef;

use blocking::BlockingShared;
use nonblocking::NonBlockingShared;
use queue::{SharedQueue, WorkQueue, WorkerContext};

/// Per-mailbox dispatch step, supplied by the owning
/// [`Framework`](crate::framework::Framework) so the scheduler stays
/// ignorant of actor/handler-table mechanics (§4.4 is entirely the
/// Dispatcher's concern; the Scheduler only pulls work and re-offers
/// mailboxes that still have pending messages). The `WorkQueue` is passed
/// in rather than captured, since it belongs to the very `Scheduler` that
/// owns this closure — avoiding a reference cycle between the two.
pub type DispatchFn = dyn Fn(&WorkerContext, &MailboxRef, &WorkQueue) + Send + Sync;

/// Builds the `Arc<dyn SharedQueue>` matching a [`YieldStrategy`] (§4.3:
/// "offer both a blocking and non-blocking scheduler variant behind the same
/// WorkQueue trait").
fn build_shared(strategy: YieldStrategy) -> Arc<dyn SharedQueue> {
    match strategy {
        YieldStrategy::Blocking => Arc::new(BlockingShared::new()),
        other => Arc::new(NonBlockingShared::new(other)),
    }
}

struct Worker {
    ctx: Arc<WorkerContext>,
    handle: Option<JoinHandle<()>>,
}

/// Owns the work queue and worker threads for one Framework instance (§3
/// C7). `min_threads`/`max_threads` bound dynamic scaling; `peak_threads`
/// records the high-water mark for diagnostics.
pub struct Scheduler {
    work_queue: Arc<WorkQueue>,
    workers: Mutex<Vec<Worker>>,
    next_index: AtomicU32,
    peak_threads: AtomicU32,
    min_threads: u32,
    max_threads: u32,
    counters: Arc<CounterRegistry>,
    dispatch: Arc<DispatchFn>,
}

impl Scheduler {
    pub fn new(config: &FrameworkConfig, counters: Arc<CounterRegistry>, dispatch: Arc<DispatchFn>) -> Arc<Self> {
        let scheduler = Arc::new(Scheduler {
            work_queue: Arc::new(WorkQueue::new(build_shared(config.yield_strategy))),
            workers: Mutex::new(Vec::new()),
            next_index: AtomicU32::new(0),
            peak_threads: AtomicU32::new(0),
            min_threads: config.min_threads.max(1),
            max_threads: config.max_threads.max(config.min_threads).max(1),
            counters,
            dispatch,
        });
        for _ in 0..config.thread_count.max(scheduler.min_threads) {
            scheduler.spawn_worker();
        }
        scheduler
    }

    pub fn work_queue(&self) -> &Arc<WorkQueue> {
        &self.work_queue
    }

    pub fn thread_count(&self) -> usize {
        self.workers.lock().unwrap().len()
    }

    pub fn peak_threads(&self) -> u32 {
        self.peak_threads.load(Ordering::Relaxed)
    }

    fn spawn_worker(self: &Arc<Self>) {
        let mut workers = self.workers.lock().unwrap();
        if workers.len() as u32 >= self.max_threads {
            return;
        }
        let index = self.next_index.fetch_add(1, Ordering::Relaxed);
        let ctx = WorkerContext::new(index as usize);
        self.counters.register_thread(ctx.counters.clone());

        let scheduler = self.clone();
        let worker_ctx = ctx.clone();
        let handle = std::thread::Builder::new()
            .name(format!("theron-worker-{index}"))
            .spawn(move || scheduler.run_worker(worker_ctx))
            .expect("failed to spawn worker thread");

        workers.push(Worker {
            ctx,
            handle: Some(handle),
        });
        let total = workers.len() as u32;
        drop(workers);
        self.peak_threads.fetch_max(total, Ordering::Relaxed);
    }

    fn run_worker(&self, ctx: Arc<WorkerContext>) {
        debug!(worker = ctx.index, "worker thread started");
        while ctx.is_running() {
            match self.work_queue.pop(&ctx) {
                Some(mailbox) => {
                    ctx.counters.incr(Counter::ThreadsPulsed);
                    queue::set_current_worker(Some(ctx.clone()));
                    (self.dispatch)(&ctx, &mailbox, &self.work_queue);
                    queue::set_current_worker(None);
                }
                None => trace!(worker = ctx.index, "empty pop"),
            }
        }
        debug!(worker = ctx.index, "worker thread exiting");
    }

    /// Raises the pool towards `count`, bounded by `max_threads`. Lowering
    /// the count is handled by [`Scheduler::set_min_threads`] stopping the
    /// newest workers; there is no forced-kill path, workers only exit their
    /// own loop once `running` is cleared (§4.7, §4.8).
    pub fn set_max_threads(self: &Arc<Self>, count: u32) {
        let target = count.max(self.min_threads);
        while (self.thread_count() as u32) < target.min(self.max_threads) {
            self.spawn_worker();
        }
    }

    /// Stops the newest workers down to `count`, never below
    /// [`Scheduler::min_threads`]'s floor recorded at construction.
    pub fn set_min_threads(&self, count: u32) {
        let target = count.max(1);
        let mut workers = self.workers.lock().unwrap();
        while workers.len() as u32 > target {
            if let Some(worker) = workers.pop() {
                worker.ctx.stop();
            } else {
                break;
            }
        }
        drop(workers);
        self.work_queue.wake_all();
    }

    /// Signals every worker to exit its loop and joins them all. Called
    /// from the Framework's teardown sequence (§4.8); safe to call once.
    pub fn stop(&self) {
        let mut workers = self.workers.lock().unwrap();
        for worker in workers.iter() {
            worker.ctx.stop();
        }
        self.work_queue.wake_all();
        for worker in workers.iter_mut() {
            if let Some(handle) = worker.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::counters::CounterRegistry;
    use crate::mailbox::Mailbox;
    use crate::message::Message;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn worker_drains_pushed_mailbox() {
        let processed = Arc::new(AtomicUsize::new(0));
        let processed_clone = processed.clone();

        let config = FrameworkConfig {
            thread_count: 2,
            min_threads: 1,
            max_threads: 2,
            ..FrameworkConfig::default()
        };
        let counters = Arc::new(CounterRegistry::new());
        let dispatch: Arc<DispatchFn> = Arc::new(move |_ctx, mailbox, _wq| {
            while mailbox.pop_head().is_some() {
                processed_clone.fetch_add(1, Ordering::SeqCst);
            }
            mailbox.set_scheduled(false);
        });

        let scheduler = Scheduler::new(&config, counters, dispatch);
        let mbox = Mailbox::new(None);
        mbox.push(Message::new(1i32, Address::null()));
        scheduler.work_queue().push(&WorkerContext::new(99), mbox, false);

        for _ in 0..200 {
            if processed.load(Ordering::SeqCst) == 1 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        scheduler.stop();
        assert_eq!(processed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn set_min_threads_shrinks_pool() {
        let config = FrameworkConfig {
            thread_count: 4,
            min_threads: 1,
            max_threads: 4,
            ..FrameworkConfig::default()
        };
        let counters = Arc::new(CounterRegistry::new());
        let dispatch: Arc<DispatchFn> = Arc::new(|_ctx, _mailbox, _wq| {});
        let scheduler = Scheduler::new(&config, counters, dispatch);
        assert_eq!(scheduler.thread_count(), 4);
        scheduler.set_min_threads(2);
        // Give workers a moment to observe the stop flag.
        std::thread::sleep(std::time::Duration::from_millis(100));
        assert_eq!(scheduler.thread_count(), 2);
        scheduler.stop();
    }
}
