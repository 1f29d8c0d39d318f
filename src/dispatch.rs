//! The per-mailbox dispatch algorithm (§3 C8, §4.4).
//!
//! Grounded on the teacher's `kernel.rs` mailbox-draining loop, replacing
//! its async `await` points with direct calls now that a mailbox is only
//! ever processed by one worker at a time.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::error;

use crate::counters::Counter;
use crate::fallback::FallbackChain;
use crate::mailbox::MailboxRef;
use crate::scheduler::queue::{WorkQueue, WorkerContext};

/// Runs one round of dispatch for a mailbox the scheduler just popped.
///
/// Steps (§4.4): pin the bound actor so `unbind` can't race a panic or a
/// concurrent detach; pop and execute exactly one pending message — hand it
/// to the actor, fall back to the [`FallbackChain`] if nothing claimed it,
/// then apply any handler-table mutations the actor made during that
/// dispatch; finally unpin and re-enqueue the mailbox if more messages
/// remain, so every worker gets a turn at the shared queue between any two
/// messages addressed to the same actor (§4.3 fairness).
///
/// A panicking handler is caught (SPEC_FULL.md panic policy) rather than
/// unwinding the worker thread or leaving the mailbox permanently
/// unscheduled — the mailbox keeps running, the same as the teacher's
/// supervision `Sentinel` guard does for a failed actor restart, just
/// without an accompanying restart step (the spec defines no supervision
/// hierarchy here).
pub fn run(ctx: &WorkerContext, mailbox: &MailboxRef, fallback: &FallbackChain, work_queue: &WorkQueue) {
    mailbox.pin();

    if let Some(msg) = mailbox.pop_head() {
        let handled = mailbox.with_actor(|actor| match actor {
            Some(actor) => match catch_unwind(AssertUnwindSafe(|| actor.dispatch(&msg))) {
                Ok(handled) => handled,
                Err(_) => {
                    error!(from = %msg.from(), type_name = msg.type_name(), "actor panicked while dispatching a message");
                    true
                }
            },
            None => false,
        });

        if !handled {
            fallback.run(&msg);
        }

        mailbox.with_actor(|actor| {
            if let Some(actor) = actor {
                actor.apply_pending();
            }
        });

        ctx.counters.incr(Counter::MessagesProcessed);
    }

    ctx.counters.set_max(Counter::MailboxQueueMax, mailbox.high_water_mark() as u64);
    mailbox.unpin();

    if mailbox.is_empty() {
        mailbox.set_scheduled(false);
    } else {
        work_queue.push(ctx, mailbox.clone(), false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::mailbox::{BoundActor, Mailbox};
    use crate::message::Message;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingActor {
        hits: Arc<AtomicUsize>,
    }

    impl BoundActor for CountingActor {
        fn dispatch(&mut self, _msg: &Message) -> bool {
            self.hits.fetch_add(1, Ordering::SeqCst);
            true
        }
        fn apply_pending(&mut self) {}
        fn pre_start(&mut self) {}
        fn post_stop(&mut self) {}
    }

    struct PanickingActor;
    impl BoundActor for PanickingActor {
        fn dispatch(&mut self, _msg: &Message) -> bool {
            panic!("boom");
        }
        fn apply_pending(&mut self) {}
        fn pre_start(&mut self) {}
        fn post_stop(&mut self) {}
    }

    fn test_queue() -> WorkQueue {
        use crate::scheduler::blocking::BlockingShared;
        WorkQueue::new(Arc::new(BlockingShared::new()))
    }

    #[test]
    fn clears_scheduled_flag_once_drained() {
        let mbox = Mailbox::new(None);
        let hits = Arc::new(AtomicUsize::new(0));
        mbox.bind(Box::new(CountingActor { hits: hits.clone() }));
        mbox.push(Message::new(1i32, Address::null()));

        let ctx = WorkerContext::new(0);
        let wq = test_queue();
        let fallback = FallbackChain::new();
        run(&ctx, &mbox, &fallback, &wq);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(mbox.is_empty());
        assert!(!mbox.is_scheduled());
    }

    #[test]
    fn unhandled_message_reaches_fallback() {
        let mbox = Mailbox::new(None);
        mbox.push(Message::new(1i32, Address::null()));

        let ctx = WorkerContext::new(0);
        let wq = test_queue();
        let fallback = FallbackChain::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        fallback.set_framework_handler(Arc::new(move |_msg| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        }));

        run(&ctx, &mbox, &fallback, &wq);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panic_in_handler_does_not_poison_the_mailbox() {
        let mbox = Mailbox::new(None);
        mbox.bind(Box::new(PanickingActor));
        mbox.push(Message::new(1i32, Address::null()));

        let ctx = WorkerContext::new(0);
        let wq = test_queue();
        let fallback = FallbackChain::new();
        run(&ctx, &mbox, &fallback, &wq);

        assert!(mbox.is_bound());
        assert!(mbox.is_empty());

        mbox.push(Message::new(2i32, Address::null()));
        assert_eq!(mbox.count(), 1);
    }
}
