//! End-to-end scenario: a ring of actors forwards a decrementing token until
//! it reaches zero, at which point the actor holding it reports its own
//! address back to the main thread (SPEC_FULL.md §8, scenario 2).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use theron::prelude::*;

struct SetNext {
    next: Address,
}

struct SetReplyTo {
    reply_to: Address,
}

struct Token(i64);

struct RingNode {
    next: Option<Address>,
    reply_to: Option<Address>,
    ctx: Option<Context<RingNode>>,
}

impl Actor for RingNode {
    fn pre_start(&mut self, ctx: &Context<Self>) {
        self.ctx = Some(ctx.clone());
        ctx.register_handler::<SetNext>(Self::on_set_next);
        ctx.register_handler::<SetReplyTo>(Self::on_set_reply_to);
        ctx.register_handler::<Token>(Self::on_token);
    }
}

impl RingNode {
    fn on_set_next(&mut self, msg: &SetNext, _from: Address) {
        self.next = Some(msg.next.clone());
    }

    fn on_set_reply_to(&mut self, msg: &SetReplyTo, _from: Address) {
        self.reply_to = Some(msg.reply_to.clone());
    }

    fn on_token(&mut self, msg: &Token, _from: Address) {
        let ctx = self.ctx.clone().unwrap();
        let remaining = msg.0 - 1;
        if remaining <= 0 {
            let reply_to = self.reply_to.clone().unwrap();
            let _ = ctx.send(&reply_to, ctx.get_address());
        } else {
            let next = self.next.clone().unwrap();
            let _ = ctx.tail_send(&next, Token(remaining));
        }
    }
}

fn record_winner(state: &mut (Arc<Mutex<Option<Address>>>, Arc<AtomicUsize>), value: &Address, _from: Address) {
    *state.0.lock().unwrap() = Some(value.clone());
    state.1.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn thread_ring_decrements_to_zero_exactly_once() {
    const RING_SIZE: usize = 503;
    const SEED: i64 = 50_000_000;

    let framework = Framework::with_config(FrameworkConfig {
        thread_count: 4,
        min_threads: 1,
        max_threads: 4,
        ..FrameworkConfig::default()
    })
    .unwrap();

    let mut addresses = Vec::with_capacity(RING_SIZE);
    for _ in 0..RING_SIZE {
        let addr = framework
            .spawn(
                RingNode {
                    next: None,
                    reply_to: None,
                    ctx: None,
                },
                None,
            )
            .unwrap();
        addresses.push(addr);
    }

    for i in 0..RING_SIZE {
        let next = addresses[(i + 1) % RING_SIZE].clone();
        assert!(framework.send(&addresses[i], SetNext { next }));
    }

    let winner = Arc::new(Mutex::new(None));
    let hits = Arc::new(AtomicUsize::new(0));
    let replies = Receiver::new((winner.clone(), hits.clone()));
    replies.register_handler::<Address>(record_winner);

    for addr in &addresses {
        assert!(framework.send(
            addr,
            SetReplyTo {
                reply_to: replies.address(),
            },
        ));
    }

    assert!(framework.send(&addresses[0], Token(SEED)));

    let dispatched = replies.wait(4);
    assert_eq!(dispatched, 1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(winner.lock().unwrap().is_some());

    framework.stop();
}
