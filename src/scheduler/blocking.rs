//! Blocking `SharedQueue`: parks idle workers on a condvar keyed to the
//! shared queue's mutex (§4.3, §5 "Suspension points").

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::counters::{Counter, ThreadCounters};
use crate::mailbox::MailboxRef;

use super::queue::SharedQueue;

pub struct BlockingShared {
    inner: Mutex<VecDeque<MailboxRef>>,
    available: Condvar,
}

impl BlockingShared {
    pub fn new() -> Self {
        BlockingShared {
            inner: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }
}

impl Default for BlockingShared {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedQueue for BlockingShared {
    fn push(&self, mailbox: MailboxRef) {
        let mut queue = self.inner.lock().unwrap();
        queue.push_back(mailbox);
    }

    fn pop(&self, counters: &ThreadCounters) -> Option<MailboxRef> {
        let mut queue = self.inner.lock().unwrap();
        loop {
            if let Some(mailbox) = queue.pop_front() {
                return Some(mailbox);
            }
            // A `wait_timeout` rather than an unbounded `wait` lets a
            // worker notice its `running` flag flipped during shutdown
            // even if `wake_all` raced the flag write (§4.8 teardown).
            let (guard, timeout) = self
                .available
                .wait_timeout(queue, std::time::Duration::from_millis(50))
                .unwrap();
            queue = guard;
            if !timeout.timed_out() {
                counters.incr(Counter::ThreadsWoken);
            }
            if queue.is_empty() && timeout.timed_out() {
                return None;
            }
        }
    }

    fn wake_all(&self) {
        self.available.notify_all();
    }

    fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}
