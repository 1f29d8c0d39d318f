//! End-to-end scenario: an actor that only handles `u32` lets an `f32` fall
//! through to the framework-wide fallback handler, while the matched `u32`
//! still gets a normal reply (SPEC_FULL.md §8, scenario 5).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use theron::prelude::*;

struct OnlyU32 {
    ctx: Option<Context<OnlyU32>>,
}

impl Actor for OnlyU32 {
    fn pre_start(&mut self, ctx: &Context<Self>) {
        self.ctx = Some(ctx.clone());
        ctx.register_handler::<u32>(Self::on_u32);
    }
}

impl OnlyU32 {
    fn on_u32(&mut self, value: &u32, from: Address) {
        let ctx = self.ctx.clone().unwrap();
        let _ = ctx.send(&from, *value);
    }
}

fn record_reply(state: &mut Arc<AtomicUsize>, _value: &u32, _from: Address) {
    state.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn unmatched_type_reaches_framework_fallback() {
    let framework = Framework::with_config(FrameworkConfig {
        thread_count: 1,
        min_threads: 1,
        max_threads: 1,
        ..FrameworkConfig::default()
    })
    .unwrap();

    let actor = framework.spawn(OnlyU32 { ctx: None }, None).unwrap();

    let fallback_hits = Arc::new(AtomicUsize::new(0));
    let fallback_sender = Arc::new(Mutex::new(None));
    let hits = fallback_hits.clone();
    let sender = fallback_sender.clone();
    framework.set_fallback_handler(Arc::new(move |msg| {
        hits.fetch_add(1, Ordering::SeqCst);
        *sender.lock().unwrap() = Some(msg.from().clone());
    }));

    let replies = Receiver::new(Arc::new(AtomicUsize::new(0)));
    replies.register_handler::<u32>(record_reply);

    let reply_addr = replies.address();
    assert!(framework.send_from(&actor, 1.5f32, reply_addr.clone()));
    assert!(framework.send_from(&actor, 7u32, reply_addr.clone()));

    assert_eq!(replies.wait(4), 1);

    for _ in 0..200 {
        if fallback_hits.load(Ordering::SeqCst) == 1 {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(fallback_hits.load(Ordering::SeqCst), 1);
    assert_eq!(*fallback_sender.lock().unwrap(), Some(reply_addr));

    framework.stop();
}
