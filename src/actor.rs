//! User-facing actor behavior and the [`Context`] handle passed to it (§3
//! C9, §4.9).
//!
//! Grounded on the teacher's `Actor`/`Context` split (`actor/actor_cell.rs`):
//! a trait the application implements, and a handle — here
//! `Arc`-backed rather than built on the teacher's `ActorRef` tree — that
//! the application uses to register handlers, inspect its own mailbox, and
//! send messages elsewhere.

use std::sync::Arc;

use crate::address::Address;
use crate::framework::RuntimeHandle;
use crate::handler::{Handler, HandlerTable, UntypedHandler};
use crate::mailbox::{BoundActor, MailboxRef};
use crate::message::{Message, Payload};

/// Lifecycle hooks for actor state (§4.9). Both have empty default bodies;
/// most actors only need to register their handlers in `pre_start`.
pub trait Actor: Send + 'static {
    fn pre_start(&mut self, ctx: &Context<Self>)
    where
        Self: Sized,
    {
        let _ = ctx;
    }

    fn post_stop(&mut self, ctx: &Context<Self>)
    where
        Self: Sized,
    {
        let _ = ctx;
    }
}

/// The handle an actor uses to reach back into its own mailbox and the
/// Framework that owns it (§4.9). Cheap to clone; every clone refers to the
/// same underlying mailbox and handler table.
pub struct Context<A> {
    address: Address,
    mailbox: MailboxRef,
    runtime: RuntimeHandle,
    handlers: Arc<HandlerTable<A>>,
}

impl<A> Clone for Context<A> {
    fn clone(&self) -> Self {
        Context {
            address: self.address.clone(),
            mailbox: self.mailbox.clone(),
            runtime: self.runtime.clone(),
            handlers: self.handlers.clone(),
        }
    }
}

impl<A: Send + 'static> Context<A> {
    pub fn register_handler<T: Payload>(&self, f: Handler<A, T>) {
        self.handlers.register(f);
    }

    pub fn deregister_handler<T: Payload>(&self, f: Handler<A, T>) -> bool {
        self.handlers.deregister(f)
    }

    pub fn is_handler_registered<T: Payload>(&self, f: Handler<A, T>) -> bool {
        self.handlers.is_registered(f)
    }

    pub fn set_default_handler(&self, handler: UntypedHandler<A>) {
        self.handlers.set_default_handler(handler);
    }

    pub fn get_address(&self) -> Address {
        self.address.clone()
    }

    pub fn get_num_queued_messages(&self) -> u32 {
        self.mailbox.count()
    }

    pub fn get_framework(&self) -> RuntimeHandle {
        self.runtime.clone()
    }

    /// Sends `value` to `to` as if from this actor. Always targets the
    /// shared work queue, even if the recipient happens to be served by
    /// the same worker currently running this handler (§4.5).
    pub fn send<T: Payload>(&self, to: &Address, value: T) -> bool {
        self.runtime.send(to, Message::new(value, self.address.clone()))
    }

    /// Like [`Context::send`], but hints that this is the last action the
    /// current handler takes, so the recipient should be kept on this
    /// worker's local slot rather than pushed to the shared queue (§4.3
    /// "tail-send locality", Glossary).
    pub fn tail_send<T: Payload>(&self, to: &Address, value: T) -> bool {
        self.runtime.tail_send(to, Message::new(value, self.address.clone()))
    }
}

/// Binds a concrete `A: Actor` to its [`HandlerTable`] and [`Context`],
/// implementing [`BoundActor`] so it can live behind a `Box<dyn BoundActor>`
/// inside a [`Mailbox`](crate::mailbox::Mailbox) (§9, replacing the
/// teacher's member-function-pointer dispatch with this single composed
/// trait object).
pub struct ActorCell<A: Actor> {
    actor: A,
    handlers: Arc<HandlerTable<A>>,
    ctx: Context<A>,
}

impl<A: Actor> ActorCell<A> {
    pub fn new(actor: A, address: Address, mailbox: MailboxRef, runtime: RuntimeHandle) -> Self {
        let handlers = Arc::new(HandlerTable::new());
        let ctx = Context {
            address,
            mailbox,
            runtime,
            handlers: handlers.clone(),
        };
        ActorCell { actor, handlers, ctx }
    }

    /// Runs `pre_start` and applies whatever handlers it registered. Called
    /// once by [`Framework::spawn`](crate::framework::Framework::spawn)
    /// before the actor's address is handed back to the caller, so the
    /// first message delivered always sees a fully populated handler table.
    pub fn run_pre_start(&mut self) {
        self.actor.pre_start(&self.ctx);
        self.handlers.apply_pending();
    }
}

impl<A: Actor> BoundActor for ActorCell<A> {
    fn dispatch(&mut self, msg: &Message) -> bool {
        if self.handlers.dispatch(&mut self.actor, msg) {
            return true;
        }
        self.handlers.default_handler_invoke(&mut self.actor, msg)
    }

    fn apply_pending(&mut self) {
        self.handlers.apply_pending();
    }

    fn pre_start(&mut self) {
        self.run_pre_start();
    }

    fn post_stop(&mut self) {
        self.actor.post_stop(&self.ctx);
    }
}
