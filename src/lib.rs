//! Theron: a fixed-size, directory-addressed actor core for in-process
//! concurrent programming on multi-core hardware.
//!
//! An application builds a [`Framework`](framework::Framework), spawns
//! [`Actor`](actor::Actor) implementations onto it, and sends copy-by-value
//! messages between their addresses. A pool of OS worker threads pulls
//! non-empty mailboxes off a two-level work queue and dispatches their
//! queued messages through each actor's typed handler table, falling back
//! to a framework-wide handler (or a built-in dead-letter report) for
//! anything no handler claims.

pub mod actor;
pub mod address;
pub mod config;
pub mod counters;
pub mod directory;
pub mod dispatch;
pub mod error;
pub mod fallback;
pub mod framework;
pub mod handler;
pub mod mailbox;
pub mod message;
pub mod receiver;
pub mod scheduler;

/// Common imports for applications building on top of Theron.
pub mod prelude {
    pub use crate::actor::{Actor, Context};
    pub use crate::address::Address;
    pub use crate::config::{FrameworkConfig, YieldStrategy};
    pub use crate::counters::Counter;
    pub use crate::error::{Result, TheronError};
    pub use crate::fallback::FrameworkHandler;
    pub use crate::framework::Framework;
    pub use crate::handler::UntypedHandler;
    pub use crate::message::Message;
    pub use crate::receiver::Receiver;
}
