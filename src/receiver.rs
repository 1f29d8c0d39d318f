//! Receivers: typed inboxes driven by an explicit `wait`/`consume` call
//! rather than the scheduler's worker pool (§3 C10). Used for request/reply
//! patterns and test harnesses where a plain thread, not an actor, needs to
//! observe messages.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock, Weak};
use std::time::Duration;

use crate::address::{Address, RECEIVER_FRAMEWORK_ID};
use crate::handler::{Handler, HandlerTable, UntypedHandler};
use crate::message::{Message, Payload};

static NEXT_RECEIVER_INDEX: AtomicU32 = AtomicU32::new(0);

fn next_receiver_index() -> u32 {
    NEXT_RECEIVER_INDEX.fetch_add(1, Ordering::Relaxed)
}

/// Type-erased delivery target for a [`Receiver<A>`], so the process-wide
/// registry below doesn't need to be generic over `A`.
trait ReceiverSink: Send + Sync {
    fn deliver(&self, msg: Message);
}

impl<A: Send + 'static> ReceiverSink for Receiver<A> {
    fn deliver(&self, msg: Message) {
        self.push(msg);
    }
}

fn registry() -> &'static Mutex<HashMap<u64, Weak<dyn ReceiverSink>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<u64, Weak<dyn ReceiverSink>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Delivers `msg` to the Receiver addressed by `to`, if it is still alive.
/// Returns whether a live Receiver was found.
///
/// A Receiver is not bound to any Framework's Directory (§3, §4.7), so
/// [`Runtime::send`](crate::framework::Runtime::send) routes addresses with
/// [`Address::is_receiver`] here instead of through a Directory lookup —
/// this table is process-wide, keyed by the same packed address a Receiver
/// hands out from [`Receiver::address`].
pub fn deliver_to_receiver(to: &Address, msg: Message) -> bool {
    let sink = registry()
        .lock()
        .unwrap()
        .get(&to.as_u64())
        .and_then(Weak::upgrade);
    match sink {
        Some(sink) => {
            sink.deliver(msg);
            true
        }
        None => false,
    }
}

/// Arrival/consumption counters guarded together so `wait` can block on the
/// `Condvar` paired with the same lock that `push` updates under (§4.7).
struct Counts {
    arrived: u64,
    consumed: u64,
}

/// A typed inbox with its own [`HandlerTable`], addressed under
/// [`RECEIVER_FRAMEWORK_ID`] so it can be the `to` of an ordinary `send`
/// call (§3, §4.6 "the raw calling convention").
///
/// Unlike a [`Mailbox`](crate::mailbox::Mailbox), nothing ever pulls a
/// Receiver off a work queue: the owning thread calls [`Receiver::wait`] or
/// [`Receiver::consume`] itself, so no `pinned`/`scheduled` bookkeeping is
/// needed here.
pub struct Receiver<A> {
    address: Address,
    state: Mutex<A>,
    handlers: HandlerTable<A>,
    counts: Mutex<Counts>,
    available: Condvar,
}

impl<A> Receiver<A> {
    pub fn new(state: A) -> Arc<Self>
    where
        A: Send + 'static,
    {
        let index = next_receiver_index();
        let receiver = Arc::new(Receiver {
            address: Address::new(RECEIVER_FRAMEWORK_ID, index),
            state: Mutex::new(state),
            handlers: HandlerTable::new(),
            counts: Mutex::new(Counts { arrived: 0, consumed: 0 }),
            available: Condvar::new(),
        });
        let sink: Arc<dyn ReceiverSink> = receiver.clone();
        registry()
            .lock()
            .unwrap()
            .insert(receiver.address.as_u64(), Arc::downgrade(&sink));
        receiver
    }

    pub fn address(&self) -> Address {
        self.address.clone()
    }

    pub fn register_handler<T: Payload>(&self, f: Handler<A, T>) {
        self.handlers.register(f);
        // Receivers are never mid-dispatch from another thread's point of
        // view (only the owning thread ever calls `wait`/`consume`), so
        // registration can apply immediately rather than waiting for the
        // next `apply_pending` the way an actor's table does (§4.2).
        self.handlers.apply_pending();
    }

    pub fn deregister_handler<T: Payload>(&self, f: Handler<A, T>) -> bool {
        let found = self.handlers.deregister(f);
        self.handlers.apply_pending();
        found
    }

    pub fn is_handler_registered<T: Payload>(&self, f: Handler<A, T>) -> bool {
        self.handlers.is_registered(f)
    }

    pub fn set_default_handler(&self, handler: UntypedHandler<A>) {
        self.handlers.set_default_handler(handler);
    }

    /// Invokes every matching handler against `msg` synchronously, on
    /// whatever thread is calling `push`, then counts the arrival and lets
    /// `msg` drop (§4.7) — matching the original Theron's `Receiver::Push`,
    /// which runs handlers under its own lock before bumping the arrival
    /// counter rather than queuing the message for a later `Wait`/`Consume`.
    pub fn push(&self, msg: Message) {
        self.dispatch_one(&msg);
        let mut counts = self.counts.lock().unwrap();
        counts.arrived += 1;
        self.available.notify_all();
    }

    /// Messages that have arrived but not yet been acknowledged by a `wait`
    /// or `consume` call.
    pub fn count(&self) -> u32 {
        let counts = self.counts.lock().unwrap();
        (counts.arrived - counts.consumed) as u32
    }

    pub fn arrival_count(&self) -> u64 {
        self.counts.lock().unwrap().arrived
    }

    pub fn reset(&self) {
        let mut counts = self.counts.lock().unwrap();
        counts.arrived = 0;
        counts.consumed = 0;
    }

    /// Acknowledges up to `max` already-arrived messages, without blocking.
    /// Returns the number actually acknowledged. Dispatch already happened
    /// in `push`; this only gates on and decrements the arrival counter.
    pub fn consume(&self, max: u32) -> u32 {
        let mut counts = self.counts.lock().unwrap();
        let mut taken = 0;
        while taken < max && counts.consumed < counts.arrived {
            counts.consumed += 1;
            taken += 1;
        }
        taken
    }

    /// Blocks (with the same backoff-free `wait_timeout` loop as
    /// [`BlockingShared`](crate::scheduler::blocking::BlockingShared))
    /// until at least one message has arrived, then acknowledges up to
    /// `max`. Returns the number acknowledged — always at least one unless
    /// the Receiver never receives anything (this call never returns in
    /// that case, matching the Open Question resolution recorded in
    /// SPEC_FULL.md: `wait` has no timeout parameter).
    pub fn wait(&self, max: u32) -> u32 {
        let mut counts = self.counts.lock().unwrap();
        while counts.consumed >= counts.arrived {
            counts = self
                .available
                .wait_timeout(counts, Duration::from_millis(50))
                .unwrap()
                .0;
        }
        let mut taken = 0;
        while taken < max && counts.consumed < counts.arrived {
            counts.consumed += 1;
            taken += 1;
        }
        taken
    }

    fn dispatch_one(&self, msg: &Message) {
        let mut state = self.state.lock().unwrap();
        if !self.handlers.dispatch(&mut state, msg) {
            self.handlers.default_handler_invoke(&mut state, msg);
        }
    }
}
