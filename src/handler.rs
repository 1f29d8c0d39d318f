use std::any::TypeId;
use std::cell::RefCell;

use crate::address::Address;
use crate::message::{Message, Payload};

/// A registered handler: `fn(&mut actor_state, &T, from)`.
///
/// Plain `fn` pointers (not arbitrary closures) are used deliberately —
/// `deregister_handler` identifies an entry by pointer equality, which only
/// `fn` items and non-capturing closures support. This mirrors the teacher's
/// member-function-pointer dispatch (§9 "Dynamic dispatch via member-function
/// pointers"), replaced here with a typed `(type_id, fn pointer)` pair
/// instead of a vtable slot.
pub type Handler<A, T> = fn(&mut A, &T, Address);

/// Either calling convention accepted for default/fallback handlers (§4.6,
/// §6): the typed `(from)`-only form, or the raw `(bytes, size, from)` form
/// for code that wants to inspect an unmatched message's shape without
/// knowing its type.
pub enum UntypedHandler<A> {
    FromOnly(fn(&mut A, Address)),
    Raw(fn(&mut A, &Message, Address)),
}

impl<A> UntypedHandler<A> {
    fn invoke(&self, actor: &mut A, msg: &Message) {
        match self {
            UntypedHandler::FromOnly(f) => f(actor, msg.from().clone()),
            UntypedHandler::Raw(f) => f(actor, msg, msg.from().clone()),
        }
    }
}

struct Entry<A> {
    type_id: TypeId,
    ptr: usize,
    tombstoned: bool,
    invoke: Box<dyn Fn(&mut A, &Message) + Send>,
}

enum PendingOp<A> {
    Register(Entry<A>),
    Deregister { type_id: TypeId, ptr: usize },
}

/// Per-actor ordered list of typed handlers (§3 C2, §4.2).
///
/// Registration and deregistration made while a dispatch is in flight are
/// buffered in `pending` and applied by [`HandlerTable::apply_pending`]
/// once the outer dispatch returns, so `dispatch()` always iterates a
/// stable snapshot (§4.2, §9 "Deferred handler deregistration").
pub struct HandlerTable<A> {
    entries: RefCell<Vec<Entry<A>>>,
    pending: RefCell<Vec<PendingOp<A>>>,
    default_handler: RefCell<Option<UntypedHandler<A>>>,
}

// SAFETY: a `HandlerTable<A>` is only ever read from or written to by the
// single worker thread currently pinning the owning actor's mailbox
// (I-Serial, §3) — the `RefCell`s exist for interior mutability within that
// one-thread-at-a-time window, not to allow genuine concurrent access, so
// sharing `&HandlerTable<A>` across threads (via the `Arc` a `Context` holds
// between dispatches) never races in practice.
unsafe impl<A> Sync for HandlerTable<A> where A: Send {}

impl<A> Default for HandlerTable<A> {
    fn default() -> Self {
        HandlerTable {
            entries: RefCell::new(Vec::new()),
            pending: RefCell::new(Vec::new()),
            default_handler: RefCell::new(None),
        }
    }
}

impl<A> HandlerTable<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler for messages of type `T`. Duplicates are allowed;
    /// each counts and all matching entries run, in registration order
    /// (§4.2 tie-break).
    pub fn register<T: Payload>(&self, f: Handler<A, T>) {
        let entry = Entry {
            type_id: TypeId::of::<T>(),
            ptr: f as usize,
            tombstoned: false,
            invoke: Box::new(move |actor: &mut A, msg: &Message| {
                if let Some(value) = msg.value_ref::<T>() {
                    f(actor, value, msg.from().clone());
                }
            }),
        };
        self.pending.borrow_mut().push(PendingOp::Register(entry));
    }

    /// Marks the last non-tombstoned matching entry for removal. Returns
    /// whether a matching entry was found (checked against both `entries`
    /// and any still-pending registration, so a register-then-deregister
    /// pair within the same handler round-trips correctly, §8).
    pub fn deregister<T: Payload>(&self, f: Handler<A, T>) -> bool {
        let type_id = TypeId::of::<T>();
        let ptr = f as usize;
        let found = self.is_registered(f)
            || self
                .pending
                .borrow()
                .iter()
                .any(|op| matches!(op, PendingOp::Register(e) if e.type_id == type_id && e.ptr == ptr));

        if found {
            self.pending
                .borrow_mut()
                .push(PendingOp::Deregister { type_id, ptr });
        }
        found
    }

    pub fn is_registered<T: Payload>(&self, f: Handler<A, T>) -> bool {
        let type_id = TypeId::of::<T>();
        let ptr = f as usize;
        self.entries
            .borrow()
            .iter()
            .any(|e| !e.tombstoned && e.type_id == type_id && e.ptr == ptr)
    }

    pub fn set_default_handler(&self, handler: UntypedHandler<A>) {
        *self.default_handler.borrow_mut() = Some(handler);
    }

    /// Runs every entry whose `type_id` matches `msg`, in registration
    /// order. Returns whether at least one entry matched (§4.2).
    pub fn dispatch(&self, actor: &mut A, msg: &Message) -> bool {
        // Borrowed only long enough to snapshot the length; a handler body
        // may itself call `register`/`deregister`, which only touch
        // `pending`, never `entries`, so this borrow never conflicts with
        // re-entrant calls from within `invoke` (§4.2, §9).
        let snapshot_len = self.entries.borrow().len();
        let mut handled = false;
        for i in 0..snapshot_len {
            let (tombstoned, type_id) = {
                let entries = self.entries.borrow();
                (entries[i].tombstoned, entries[i].type_id)
            };
            if !tombstoned && type_id == msg.type_id() {
                let entries = self.entries.borrow();
                (entries[i].invoke)(actor, msg);
                handled = true;
            }
        }
        handled
    }

    pub fn default_handler_invoke(&self, actor: &mut A, msg: &Message) -> bool {
        match &*self.default_handler.borrow() {
            Some(h) => {
                h.invoke(actor, msg);
                true
            }
            None => false,
        }
    }

    pub fn has_default_handler(&self) -> bool {
        self.default_handler.borrow().is_some()
    }

    /// Applies buffered register/deregister calls and compacts tombstoned
    /// entries. Called by the dispatcher between message dispatches and
    /// after `pre_start`/`post_stop` (§9 "tombstone + compaction" scheme).
    pub fn apply_pending(&self) {
        let ops = std::mem::take(&mut *self.pending.borrow_mut());
        let mut entries = self.entries.borrow_mut();
        for op in ops {
            match op {
                PendingOp::Register(entry) => entries.push(entry),
                PendingOp::Deregister { type_id, ptr } => {
                    if let Some(pos) = entries
                        .iter()
                        .rposition(|e| !e.tombstoned && e.type_id == type_id && e.ptr == ptr)
                    {
                        entries[pos].tombstoned = true;
                    }
                }
            }
        }
        entries.retain(|e| !e.tombstoned);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        total: i64,
    }

    fn add(c: &mut Counter, v: &i32, _from: Address) {
        c.total += *v as i64;
    }

    #[test]
    fn register_and_dispatch() {
        let table: HandlerTable<Counter> = HandlerTable::new();
        table.register::<i32>(add);
        table.apply_pending();

        let mut counter = Counter { total: 0 };
        let msg = Message::new(5i32, Address::null());
        assert!(table.dispatch(&mut counter, &msg));
        assert_eq!(counter.total, 5);
    }

    #[test]
    fn unmatched_type_not_handled() {
        let table: HandlerTable<Counter> = HandlerTable::new();
        table.register::<i32>(add);
        table.apply_pending();

        let mut counter = Counter { total: 0 };
        let msg = Message::new(5.0f32, Address::null());
        assert!(!table.dispatch(&mut counter, &msg));
    }

    #[test]
    fn register_then_deregister_round_trips() {
        let table: HandlerTable<Counter> = HandlerTable::new();
        table.register::<i32>(add);
        table.apply_pending();
        assert!(table.is_registered(add));

        assert!(table.deregister::<i32>(add));
        table.apply_pending();
        assert!(!table.is_registered(add));

        let mut counter = Counter { total: 0 };
        let msg = Message::new(5i32, Address::null());
        assert!(!table.dispatch(&mut counter, &msg));
        assert_eq!(counter.total, 0);
    }

    #[test]
    fn duplicate_handlers_both_run() {
        let table: HandlerTable<Counter> = HandlerTable::new();
        table.register::<i32>(add);
        table.register::<i32>(add);
        table.apply_pending();

        let mut counter = Counter { total: 0 };
        let msg = Message::new(5i32, Address::null());
        table.dispatch(&mut counter, &msg);
        assert_eq!(counter.total, 10);
    }
}
