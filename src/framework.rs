//! The user-facing façade tying the directory, scheduler, fallback chain
//! and counters together for one Framework instance (§3 C9, §4.5, §4.7,
//! §4.8).
//!
//! Grounded on the teacher's `ActorSystem` (`src/system.rs`, `src/kernel.rs`):
//! a single object applications construct once, that owns every other
//! subsystem and is threaded through as the handle actors use to reach back
//! into the runtime.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::actor::{Actor, ActorCell};
use crate::address::Address;
use crate::config::FrameworkConfig;
use crate::counters::{Counter, CounterRegistry, ThreadCounters};
use crate::dispatch;
use crate::directory::Directory;
use crate::error::{Result, TheronError};
use crate::fallback::{FallbackChain, FrameworkHandler};
use crate::mailbox::MailboxRef;
use crate::message::{Message, Payload};
use crate::scheduler::queue::{current_worker, WorkerContext};
use crate::scheduler::{DispatchFn, Scheduler};

const MAX_FRAMEWORKS: u16 = 1 << 12;

static NEXT_FRAMEWORK_ID: AtomicU16 = AtomicU16::new(1);
static FREED_FRAMEWORK_IDS: Mutex<Vec<u16>> = Mutex::new(Vec::new());

fn allocate_framework_id() -> Result<u16> {
    if let Some(id) = FREED_FRAMEWORK_IDS.lock().unwrap().pop() {
        return Ok(id);
    }
    let id = NEXT_FRAMEWORK_ID.fetch_add(1, Ordering::Relaxed);
    if id >= MAX_FRAMEWORKS {
        return Err(TheronError::FrameworkIdExhausted);
    }
    Ok(id)
}

fn release_framework_id(id: u16) {
    FREED_FRAMEWORK_IDS.lock().unwrap().push(id);
}

/// The subsystems shared between a [`Framework`] and every
/// [`Context`](crate::actor::Context) it hands out. Kept separate from
/// `Framework` itself so `Context` can hold an `Arc<Runtime>` without also
/// holding the `Framework`'s own teardown state (§9 "process-scoped
/// singletons" — this is the per-Framework analogue, not a global one).
pub struct Runtime {
    framework_id: u16,
    directory: Directory,
    scheduler: Arc<Scheduler>,
    fallback: Arc<FallbackChain>,
    counters: Arc<CounterRegistry>,
    external_counters: Arc<ThreadCounters>,
    config: FrameworkConfig,
}

pub type RuntimeHandle = Arc<Runtime>;

impl Runtime {
    pub fn framework_id(&self) -> u16 {
        self.framework_id
    }

    pub fn config(&self) -> &FrameworkConfig {
        &self.config
    }

    /// Pushes `msg` into `to`'s mailbox and, if that push is the one that
    /// transitions it from empty to non-empty, enqueues it (§4.1, §4.5).
    ///
    /// When called from inside a dispatch (a worker thread currently
    /// processing some other mailbox) this is plain `send`, not
    /// `tail_send`: it always targets the shared queue, never the calling
    /// worker's local slot, so only an explicit `tail_send` pays for
    /// locality.
    pub fn send(&self, to: &Address, msg: Message) -> bool {
        if to.is_null() {
            self.fallback.run(&msg);
            return false;
        }
        if to.is_receiver() {
            crate::receiver::deliver_to_receiver(to, msg);
            return true;
        }
        let mailbox = match self.resolve(to) {
            Some(mailbox) => mailbox,
            None => {
                self.fallback.run(&msg);
                return false;
            }
        };
        let outcome = mailbox.push(msg);
        if outcome.needs_schedule {
            self.enqueue(mailbox, false);
        }
        true
    }

    /// Like [`Runtime::send`], but if the calling thread is a scheduler
    /// worker currently mid-dispatch, hints that this is the last action of
    /// the current handler so the recipient should land on that worker's
    /// local slot instead of the shared queue (§4.3 "tail-send locality").
    pub fn tail_send(&self, to: &Address, msg: Message) -> bool {
        if to.is_null() {
            self.fallback.run(&msg);
            return false;
        }
        if to.is_receiver() {
            crate::receiver::deliver_to_receiver(to, msg);
            return true;
        }
        let mailbox = match self.resolve(to) {
            Some(mailbox) => mailbox,
            None => {
                self.fallback.run(&msg);
                return false;
            }
        };
        let outcome = mailbox.push(msg);
        if outcome.needs_schedule {
            self.enqueue(mailbox, true);
        }
        true
    }

    fn resolve(&self, to: &Address) -> Option<MailboxRef> {
        self.directory.lookup(to)
    }

    fn enqueue(&self, mailbox: MailboxRef, local_hint: bool) {
        match current_worker() {
            Some(ctx) => self.scheduler.work_queue().push(&ctx, mailbox, local_hint),
            None => self
                .scheduler
                .work_queue()
                .push_external(mailbox, &self.external_counters),
        }
    }
}

/// The application-facing handle for one actor system instance (§3 C9).
pub struct Framework {
    runtime: RuntimeHandle,
}

impl Framework {
    pub fn new() -> Result<Arc<Self>> {
        Self::with_config(FrameworkConfig::load())
    }

    pub fn with_config(config: FrameworkConfig) -> Result<Arc<Self>> {
        let framework_id = allocate_framework_id()?;
        Self::build(framework_id, config)
    }

    /// Constructs a Framework pinned to a caller-chosen framework id rather
    /// than one drawn from the process-wide allocator — primarily useful in
    /// tests that need deterministic addresses across runs.
    pub fn new_on_endpoint(framework_id: u16, config: FrameworkConfig) -> Result<Arc<Self>> {
        Self::build(framework_id, config)
    }

    fn build(framework_id: u16, config: FrameworkConfig) -> Result<Arc<Self>> {
        let counters = Arc::new(CounterRegistry::new());
        let external_counters = Arc::new(ThreadCounters::new());
        counters.register_thread(external_counters.clone());

        let fallback = Arc::new(FallbackChain::new());
        let directory = Directory::new(framework_id, config.max_actors);

        // The dispatch closure only needs the fallback chain — the
        // `WorkQueue` it requeues onto is passed in by the worker loop
        // itself (the scheduler's own), so building this closure never
        // needs a handle back to the Scheduler or Runtime that will
        // eventually own it.
        let dispatch_fallback = fallback.clone();
        let dispatch_fn: Arc<DispatchFn> = Arc::new(move |ctx, mailbox, work_queue| {
            dispatch::run(ctx, mailbox, &dispatch_fallback, work_queue);
        });

        let scheduler = Scheduler::new(&config, counters.clone(), dispatch_fn);

        let runtime = Arc::new(Runtime {
            framework_id,
            directory,
            scheduler,
            fallback,
            counters,
            external_counters,
            config,
        });

        info!(framework_id, threads = runtime.scheduler.thread_count(), "framework started");
        Ok(Arc::new(Framework { runtime }))
    }

    pub fn framework_id(&self) -> u16 {
        self.runtime.framework_id
    }

    /// Constructs `actor`, binds it to a fresh directory slot, and runs
    /// `pre_start` before returning its address (§4.9).
    pub fn spawn<A: Actor>(&self, actor: A, name: Option<String>) -> Result<Address> {
        let (address, mailbox) = self.runtime.directory.allocate(name)?;
        let mut cell = ActorCell::new(actor, address.clone(), mailbox.clone(), self.runtime.clone());
        cell.run_pre_start();
        mailbox.bind(Box::new(cell));
        Ok(address)
    }

    pub fn send<T: Payload>(&self, to: &Address, value: T) -> bool {
        self.runtime.send(to, Message::new(value, Address::null()))
    }

    /// Like [`Framework::send`], but lets an external caller stamp an
    /// explicit sender address on the envelope — e.g. a `Receiver`'s
    /// address, so a handler with no other way to learn the right reply
    /// target can route a response back through `msg.from()` (§6 "Framework
    /// API": `Framework::send(value, from, to)`).
    pub fn send_from<T: Payload>(&self, to: &Address, value: T, from: Address) -> bool {
        self.runtime.send(to, Message::new(value, from))
    }

    pub fn set_fallback_handler(&self, handler: Arc<FrameworkHandler>) {
        self.runtime.fallback.set_framework_handler(handler);
    }

    pub fn thread_count(&self) -> usize {
        self.runtime.scheduler.thread_count()
    }

    pub fn peak_threads(&self) -> u32 {
        self.runtime.scheduler.peak_threads()
    }

    pub fn set_min_threads(&self, count: u32) {
        self.runtime.scheduler.set_min_threads(count);
    }

    pub fn set_max_threads(&self, count: u32) {
        self.runtime.scheduler.set_max_threads(count);
    }

    pub fn get_counter(&self, counter: Counter) -> u64 {
        self.runtime.counters.get(counter)
    }

    pub fn get_per_thread_counters(&self, counter: Counter, out: &mut Vec<u64>) {
        self.runtime.counters.get_per_thread(counter, out);
    }

    pub fn reset_counters(&self) {
        self.runtime.counters.reset_all();
    }

    pub fn live_actor_count(&self) -> u32 {
        self.runtime.directory.live_count()
    }

    /// Stops every worker thread and releases this Framework's id back to
    /// the process-wide pool. Mailboxes are left bound; any still-queued
    /// messages simply stop being drained (§4.8 — draining to the fallback
    /// chain on teardown is the caller's responsibility via `drain_all`).
    pub fn stop(&self) {
        self.runtime.scheduler.stop();
        release_framework_id(self.runtime.framework_id);
        info!(framework_id = self.runtime.framework_id, "framework stopped");
    }

    /// Flushes every still-queued message on every live mailbox through the
    /// fallback chain, guaranteeing no message is silently dropped on
    /// shutdown (I-NoLoss, §4.8).
    pub fn drain_all(&self) {
        for mailbox in self.runtime.directory.all_mailboxes() {
            mailbox.drain(|msg| self.runtime.fallback.run(&msg));
        }
    }
}
