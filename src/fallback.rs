//! The framework-wide tail of unhandled-message handling (§3 C11, §4.6).
//!
//! The per-actor default handler (layer one) lives inside each actor's
//! [`HandlerTable`](crate::handler::HandlerTable) and is already tried by
//! [`BoundActor::dispatch`](crate::mailbox::BoundActor::dispatch) before the
//! Dispatcher ever reaches here. This chain covers layers two and three: a
//! framework-wide fallback handler, then a built-in "unhandled" report.

use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::message::Message;

/// A framework-wide handler invoked for any message no actor's own table or
/// default handler claimed (§4.6). Receives the raw, still-typed envelope
/// so it can inspect `type_name`/`size`/`from` without knowing the payload
/// type.
pub type FrameworkHandler = dyn Fn(&Message) + Send + Sync;

#[derive(Default)]
pub struct FallbackChain {
    framework_handler: RwLock<Option<Arc<FrameworkHandler>>>,
}

impl FallbackChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_framework_handler(&self, handler: Arc<FrameworkHandler>) {
        *self.framework_handler.write().unwrap() = Some(handler);
    }

    pub fn clear_framework_handler(&self) {
        *self.framework_handler.write().unwrap() = None;
    }

    /// Runs the framework-level handler if one is set; otherwise falls
    /// through to the built-in report (a `tracing::warn!`, matching the
    /// teacher's dead-letter logging in `kernel/mailbox.rs`). Always
    /// "handles" the message in the sense that it is never silently
    /// dropped (I-NoLoss, §3).
    pub fn run(&self, msg: &Message) {
        let handler = self.framework_handler.read().unwrap().clone();
        match handler {
            Some(handler) => handler(msg),
            None => warn!(
                type_name = msg.type_name(),
                from = %msg.from(),
                size = msg.size(),
                "unhandled message reached the built-in fallback"
            ),
        }
    }
}
