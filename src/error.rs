use thiserror::Error;

/// Errors surfaced from construction sites. Per-message dispatch never
/// produces a `Result` (see `dispatch.rs`); every failure reachable while a
/// handler is running is routed through the fallback chain instead.
#[derive(Debug, Error)]
pub enum TheronError {
    #[error("directory is at capacity ({max_actors} mailboxes); cannot allocate a new one")]
    CapacityExhausted { max_actors: u32 },

    #[error("name '{0}' is already registered in this framework's directory")]
    DuplicateName(String),

    #[error("message allocation failed")]
    AllocationFailure,

    #[error("framework id space is exhausted (max 4096 concurrent frameworks)")]
    FrameworkIdExhausted,

    #[error("no framework is registered under id {0}")]
    UnknownFramework(u16),
}

pub type Result<T> = std::result::Result<T, TheronError>;
