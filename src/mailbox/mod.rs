//! The per-actor FIFO and single-writer-at-a-time invariant (§3, §4.1 C3).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::message::Message;

/// Capability set a bound actor exposes to its Mailbox/Dispatcher, replacing
/// the teacher's member-function-pointer dispatch (§9) with a single typed
/// `dyn` trait object. A concrete actor type's [`ActorCell`](crate::actor::ActorCell)
/// implements this.
pub trait BoundActor: Send {
    /// Runs the actor's `HandlerTable` (and, if unmatched, its own default
    /// handler) against `msg`. Returns whether *some* handler ran — the
    /// caller still owes a FallbackChain visit when this is `false` and no
    /// default handler was registered either.
    fn dispatch(&mut self, msg: &Message) -> bool;

    /// Compacts deferred handler-table mutations recorded during the last
    /// `dispatch` call (§9 "Deferred handler deregistration").
    fn apply_pending(&mut self);

    fn pre_start(&mut self);

    fn post_stop(&mut self);
}

struct MailboxState {
    queue: VecDeque<Message>,
    actor: Option<Box<dyn BoundActor>>,
    name: Option<String>,
    pinned: u32,
    scheduled: bool,
    high_water_mark: u32,
}

/// FIFO of undelivered messages addressed to a single actor (§3 C3).
///
/// `lock` (here, a single `std::sync::Mutex`) protects `queue`, `actor`,
/// `pinned`, `scheduled`, and `name` together, exactly as specified — the
/// spec's "spin-or-short-mutex" is realized as a short-held `Mutex` rather
/// than a hand-rolled spinlock: lock hold times here are O(1) pointer/flag
/// manipulation, so a futex-backed mutex and a spinlock behave identically
/// in practice, and the teacher repo (and the rest of the pack) reaches for
/// `std::sync::Mutex` rather than a bespoke spinlock wherever hold times are
/// this short.
pub struct Mailbox {
    state: Mutex<MailboxState>,
}

/// Outcome of a push: whether the mailbox transitioned from empty to
/// non-empty *and* was not already scheduled, i.e. whether the caller must
/// now enqueue this mailbox on a work queue (§4.1, §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushOutcome {
    pub needs_schedule: bool,
}

impl Mailbox {
    pub fn new(name: Option<String>) -> Arc<Self> {
        Arc::new(Mailbox {
            state: Mutex::new(MailboxState {
                queue: VecDeque::new(),
                actor: None,
                name,
                pinned: 0,
                scheduled: false,
                high_water_mark: 0,
            }),
        })
    }

    /// Appends `msg` and atomically decides whether this push is the one
    /// that must trigger scheduling — the empty-to-non-empty transition
    /// while not already referenced by a work queue (I-Order, §4.5 step 3).
    pub fn push(&self, msg: Message) -> PushOutcome {
        let mut state = self.state.lock().unwrap();
        let was_empty = state.queue.is_empty();
        state.queue.push_back(msg);
        let len = state.queue.len() as u32;
        if len > state.high_water_mark {
            state.high_water_mark = len;
        }
        let needs_schedule = was_empty && !state.scheduled;
        if needs_schedule {
            state.scheduled = true;
        }
        PushOutcome { needs_schedule }
    }

    pub fn pop_head(&self) -> Option<Message> {
        self.state.lock().unwrap().queue.pop_front()
    }

    /// Number of messages waiting on this mailbox, including the one
    /// currently being handled by a pinned dispatch, if any — matching the
    /// original Theron's `GetNumQueuedMessages` ("the count includes the
    /// message currently being handled").
    pub fn count(&self) -> u32 {
        let state = self.state.lock().unwrap();
        state.queue.len() as u32 + if state.pinned > 0 { 1 } else { 0 }
    }

    pub fn high_water_mark(&self) -> u32 {
        self.state.lock().unwrap().high_water_mark
    }

    pub fn name(&self) -> Option<String> {
        self.state.lock().unwrap().name.clone()
    }

    /// Binds `actor` to this mailbox slot. Used by the Directory when a new
    /// actor is constructed over a freshly allocated slot.
    pub fn bind(&self, actor: Box<dyn BoundActor>) {
        self.state.lock().unwrap().actor = Some(actor);
    }

    /// Detaches the bound actor, spinning until no dispatch holds a pin
    /// (I-LiveWhileWorking, §3). Safe to call from any thread; the spin is
    /// bounded in practice by one in-flight dispatch (pin is held only for
    /// the duration of a single message + requeue decision, §4.4).
    pub fn unbind(&self) -> Option<Box<dyn BoundActor>> {
        loop {
            let mut state = self.state.lock().unwrap();
            if state.pinned == 0 {
                return state.actor.take();
            }
            drop(state);
            std::thread::yield_now();
        }
    }

    pub fn is_bound(&self) -> bool {
        self.state.lock().unwrap().actor.is_some()
    }

    pub fn pin(&self) {
        self.state.lock().unwrap().pinned += 1;
    }

    pub fn unpin(&self) {
        let mut state = self.state.lock().unwrap();
        debug_assert!(state.pinned > 0, "unpin without matching pin");
        state.pinned = state.pinned.saturating_sub(1);
    }

    pub fn is_scheduled(&self) -> bool {
        self.state.lock().unwrap().scheduled
    }

    pub fn set_scheduled(&self, scheduled: bool) {
        self.state.lock().unwrap().scheduled = scheduled;
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().queue.is_empty()
    }

    /// Runs `f` with exclusive access to the bound actor, if any, without
    /// otherwise touching the queue or scheduling flags. Used by the
    /// Dispatcher's step 1/5 critical sections (§4.4).
    pub fn with_actor<R>(&self, f: impl FnOnce(Option<&mut Box<dyn BoundActor>>) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(state.actor.as_mut())
    }

    /// Drains every pending message, invoking `f` on each — used to flush
    /// to the FallbackChain on deregistration/teardown (I-NoLoss, §4.8).
    pub fn drain(&self, mut f: impl FnMut(Message)) {
        let mut state = self.state.lock().unwrap();
        while let Some(msg) = state.queue.pop_front() {
            f(msg);
        }
    }
}

pub type MailboxRef = Arc<Mailbox>;
