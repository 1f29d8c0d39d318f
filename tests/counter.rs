//! End-to-end scenario: an actor accumulates `i32`s into a running total and
//! replies with it on `GetAndReset` (SPEC_FULL.md §8, scenario 1).

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use theron::prelude::*;

struct GetAndReset {
    reply_to: Address,
}

struct Tally {
    count: i64,
    ctx: Option<Context<Tally>>,
}

impl Actor for Tally {
    fn pre_start(&mut self, ctx: &Context<Self>) {
        self.ctx = Some(ctx.clone());
        ctx.register_handler::<i32>(Self::on_add);
        ctx.register_handler::<GetAndReset>(Self::on_get_and_reset);
    }
}

impl Tally {
    fn on_add(&mut self, delta: &i32, _from: Address) {
        self.count += *delta as i64;
    }

    fn on_get_and_reset(&mut self, msg: &GetAndReset, _from: Address) {
        let ctx = self.ctx.clone().unwrap();
        let total = self.count;
        self.count = 0;
        let _ = ctx.send(&msg.reply_to, total);
    }
}

fn record_reply(state: &mut Arc<AtomicI64>, value: &i64, _from: Address) {
    state.store(*value, Ordering::SeqCst);
}

#[test]
fn counter_accumulates_and_replies_with_total() {
    let framework = Framework::with_config(FrameworkConfig {
        thread_count: 2,
        min_threads: 1,
        max_threads: 2,
        ..FrameworkConfig::default()
    })
    .unwrap();

    let actor = framework
        .spawn(
            Tally {
                count: 0,
                ctx: None,
            },
            None,
        )
        .unwrap();

    let total = Arc::new(AtomicI64::new(-1));
    let replies = Receiver::new(total.clone());
    replies.register_handler::<i64>(record_reply);

    for _ in 0..6 {
        assert!(framework.send(&actor, 1i32));
    }
    assert!(framework.send(
        &actor,
        GetAndReset {
            reply_to: replies.address(),
        },
    ));

    let dispatched = replies.wait(4);
    assert_eq!(dispatched, 1);
    assert_eq!(total.load(Ordering::SeqCst), 6);

    // A second round confirms the reset actually happened.
    total.store(-1, Ordering::SeqCst);
    assert!(framework.send(&actor, 10i32));
    assert!(framework.send(
        &actor,
        GetAndReset {
            reply_to: replies.address(),
        },
    ));
    assert_eq!(replies.wait(4), 1);
    assert_eq!(total.load(Ordering::SeqCst), 10);

    framework.stop();
}
