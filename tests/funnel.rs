//! End-to-end scenario: 16 producer actors each send a descending run of
//! integers to one consumer; the consumer reports to the main thread once it
//! has seen the literal `0` sixteen times (SPEC_FULL.md §8, scenario 4).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use theron::prelude::*;

struct Producer {
    consumer: Address,
    k: i64,
}

impl Actor for Producer {
    fn pre_start(&mut self, ctx: &Context<Self>) {
        let mut n = self.k - 1;
        while n >= 0 {
            let _ = ctx.send(&self.consumer, n);
            n -= 1;
        }
    }
}

struct Consumer {
    zero_hits: u32,
    reply_to: Address,
    ctx: Option<Context<Consumer>>,
}

impl Actor for Consumer {
    fn pre_start(&mut self, ctx: &Context<Self>) {
        self.ctx = Some(ctx.clone());
        ctx.register_handler::<i64>(Self::on_value);
    }
}

impl Consumer {
    fn on_value(&mut self, value: &i64, _from: Address) {
        if *value == 0 {
            self.zero_hits += 1;
            if self.zero_hits == 16 {
                let ctx = self.ctx.clone().unwrap();
                let _ = ctx.send(&self.reply_to, self.zero_hits);
            }
        }
    }
}

fn record_total(state: &mut Arc<AtomicU32>, value: &u32, _from: Address) {
    state.store(*value, Ordering::SeqCst);
}

#[test]
fn multi_writer_funnel_collects_sixteen_zeros() {
    const PRODUCERS: usize = 16;
    const RUN_LENGTH: i64 = 25;

    let framework = Framework::with_config(FrameworkConfig {
        thread_count: 4,
        min_threads: 1,
        max_threads: 4,
        ..FrameworkConfig::default()
    })
    .unwrap();

    let total = Arc::new(AtomicU32::new(0));
    let replies = Receiver::new(total.clone());
    replies.register_handler::<u32>(record_total);

    let consumer = framework
        .spawn(
            Consumer {
                zero_hits: 0,
                reply_to: replies.address(),
                ctx: None,
            },
            None,
        )
        .unwrap();

    for _ in 0..PRODUCERS {
        framework
            .spawn(
                Producer {
                    consumer: consumer.clone(),
                    k: RUN_LENGTH,
                },
                None,
            )
            .unwrap();
    }

    let dispatched = replies.wait(4);
    assert_eq!(dispatched, 1);
    assert_eq!(total.load(Ordering::SeqCst), 16);

    framework.stop();
}
