//! Two-level work queue: one shared MPMC queue per scheduler, one
//! single-slot local queue per worker thread (§3 C6, §4.3).

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::counters::{Counter, ThreadCounters};
use crate::mailbox::MailboxRef;

thread_local! {
    /// The `WorkerContext` of the worker currently executing a dispatch on
    /// this thread, if any (§4.3 "tail-send locality"). Set by the
    /// scheduler's run loop around each dispatch call so a `Context::tail_send`
    /// deep inside user handler code can find its way back to the calling
    /// worker's local slot without threading a `WorkerContext` through every
    /// API in between.
    static CURRENT_WORKER: RefCell<Option<Arc<WorkerContext>>> = RefCell::new(None);
}

/// Records which worker (if any) is dispatching on the calling thread.
/// `None` on any thread that isn't a scheduler worker — ordinary `send`
/// calls from outside a dispatch fall back to the non-local path.
pub fn set_current_worker(ctx: Option<Arc<WorkerContext>>) {
    CURRENT_WORKER.with(|cell| *cell.borrow_mut() = ctx);
}

pub fn current_worker() -> Option<Arc<WorkerContext>> {
    CURRENT_WORKER.with(|cell| cell.borrow().clone())
}

/// The scheduling backend behind the shared half of a [`WorkQueue`] — the
/// part of the "Common contract" (§4.3) that differs between the blocking
/// and non-blocking scheduler variants (§9 "offer both a blocking and
/// non-blocking scheduler variant behind the same WorkQueue trait").
pub trait SharedQueue: Send + Sync {
    fn push(&self, mailbox: MailboxRef);

    /// Attempts to pop. When the shared queue is empty this applies the
    /// variant's wait policy (park-on-condvar, or backoff-and-return) and
    /// only returns `None` once that policy concludes without work having
    /// appeared.
    fn pop(&self, counters: &ThreadCounters) -> Option<MailboxRef>;

    fn wake_all(&self);

    fn is_empty(&self) -> bool;
}

/// Per-worker scheduling state: the single-slot local queue, the
/// dispatch-loop `running` flag, and this worker's private counter bank
/// (§3 C6, §5).
pub struct WorkerContext {
    pub index: usize,
    local: Mutex<Option<MailboxRef>>,
    running: AtomicBool,
    pub counters: Arc<ThreadCounters>,
}

impl WorkerContext {
    pub fn new(index: usize) -> Arc<Self> {
        Arc::new(WorkerContext {
            index,
            local: Mutex::new(None),
            running: AtomicBool::new(true),
            counters: Arc::new(ThreadCounters::new()),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn local_is_empty(&self) -> bool {
        self.local.lock().unwrap().is_none()
    }
}

/// The two-level queue itself: a shared [`SharedQueue`] plus the set of
/// per-worker local slots (§3 C6).
pub struct WorkQueue {
    shared: Arc<dyn SharedQueue>,
}

impl WorkQueue {
    pub fn new(shared: Arc<dyn SharedQueue>) -> Self {
        WorkQueue { shared }
    }

    /// `local_hint` is the tail-send locality hint (§4.3, Glossary): the
    /// sender's claim that this send is the last action of its current
    /// handler, so keeping the recipient on the same worker avoids a
    /// cross-thread wake-up.
    pub fn push(&self, ctx: &WorkerContext, mailbox: MailboxRef, local_hint: bool) {
        if local_hint {
            let mut local = ctx.local.lock().unwrap();
            match local.replace(mailbox) {
                None => {
                    ctx.counters.incr(Counter::LocalPushes);
                    return;
                }
                Some(displaced) => {
                    drop(local);
                    ctx.counters.incr(Counter::LocalPushes);
                    self.push_shared(displaced, &ctx.counters);
                    return;
                }
            }
        }
        self.push_shared(mailbox, &ctx.counters);
    }

    /// Pushes directly onto the shared queue, for callers with no
    /// `WorkerContext` of their own — e.g. a `Framework::send` invoked from
    /// a plain application thread rather than from inside a dispatch
    /// (§4.5 "an external send always targets the shared queue").
    pub fn push_external(&self, mailbox: MailboxRef, counters: &ThreadCounters) {
        self.push_shared(mailbox, counters);
    }

    fn push_shared(&self, mailbox: MailboxRef, counters: &ThreadCounters) {
        self.shared.push(mailbox);
        counters.incr(Counter::SharedPushes);
        self.shared.wake_all();
    }

    /// A worker first consumes its local slot (taking exactly one mailbox
    /// per pop); if empty, it removes one from the shared queue (§4.3).
    pub fn pop(&self, ctx: &WorkerContext) -> Option<MailboxRef> {
        if let Some(mailbox) = ctx.local.lock().unwrap().take() {
            return Some(mailbox);
        }
        self.shared.pop(&ctx.counters)
    }

    pub fn is_empty(&self, ctx: &WorkerContext) -> bool {
        ctx.local_is_empty() && self.shared.is_empty()
    }

    pub fn wake_all(&self) {
        self.shared.wake_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::Mailbox;

    struct TestShared {
        inner: Mutex<std::collections::VecDeque<MailboxRef>>,
    }

    impl SharedQueue for TestShared {
        fn push(&self, mailbox: MailboxRef) {
            self.inner.lock().unwrap().push_back(mailbox);
        }
        fn pop(&self, _counters: &ThreadCounters) -> Option<MailboxRef> {
            self.inner.lock().unwrap().pop_front()
        }
        fn wake_all(&self) {}
        fn is_empty(&self) -> bool {
            self.inner.lock().unwrap().is_empty()
        }
    }

    fn shared() -> Arc<dyn SharedQueue> {
        Arc::new(TestShared {
            inner: Mutex::new(std::collections::VecDeque::new()),
        })
    }

    #[test]
    fn local_hint_keeps_first_push_local() {
        let wq = WorkQueue::new(shared());
        let ctx = WorkerContext::new(0);
        let mbox = Mailbox::new(None);
        wq.push(&ctx, mbox.clone(), true);

        assert_eq!(ctx.counters.get(Counter::LocalPushes), 1);
        assert_eq!(ctx.counters.get(Counter::SharedPushes), 0);

        let popped = wq.pop(&ctx).unwrap();
        assert!(Arc::ptr_eq(&popped, &mbox));
    }

    #[test]
    fn second_tail_send_displaces_older_to_shared() {
        let wq = WorkQueue::new(shared());
        let ctx = WorkerContext::new(0);
        let first = Mailbox::new(None);
        let second = Mailbox::new(None);

        wq.push(&ctx, first.clone(), true);
        wq.push(&ctx, second.clone(), true);

        assert_eq!(ctx.counters.get(Counter::SharedPushes), 1);

        // This worker's own pop still prefers its local slot (the newer,
        // `second`, target) — locality, not global FIFO, is the point of
        // the hint. The displaced `first` is still reachable, just no
        // longer local: any worker (including this one, once its local
        // slot empties) can pick it up from the shared queue.
        let a = wq.pop(&ctx).unwrap();
        assert!(Arc::ptr_eq(&a, &second));
        let b = wq.pop(&ctx).unwrap();
        assert!(Arc::ptr_eq(&b, &first));
    }

    #[test]
    fn non_local_push_always_goes_shared() {
        let wq = WorkQueue::new(shared());
        let ctx = WorkerContext::new(0);
        let mbox = Mailbox::new(None);
        wq.push(&ctx, mbox, false);
        assert_eq!(ctx.counters.get(Counter::SharedPushes), 1);
        assert_eq!(ctx.counters.get(Counter::LocalPushes), 0);
    }

    #[test]
    fn empty_reports_both_slots_drained() {
        let wq = WorkQueue::new(shared());
        let ctx = WorkerContext::new(0);
        assert!(wq.is_empty(&ctx));
        wq.push(&ctx, Mailbox::new(None), true);
        assert!(!wq.is_empty(&ctx));
        wq.pop(&ctx);
        assert!(wq.is_empty(&ctx));
    }
}
