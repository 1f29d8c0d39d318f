use std::any::{Any, TypeId};
use std::fmt;

use crate::address::Address;

/// Marker trait for values that may travel through a Mailbox.
///
/// Grounded on the teacher's blanket `Message` impl (`riker::Message`,
/// `src/lib.rs`): any `Send + 'static` value qualifies, no explicit opt-in
/// required.
pub trait Payload: Any + Send + 'static {}
impl<T: Any + Send + 'static> Payload for T {}

/// Type-erased envelope carrying a value, the sender's [`Address`], and a
/// stable type tag (§3 C1). `type_id` is `TypeId::of::<T>()` rather than a
/// hand-rolled registry — see SPEC_FULL.md §3 "Type tags".
pub struct Message {
    type_id: TypeId,
    type_name: &'static str,
    value: Box<dyn Any + Send>,
    from: Address,
    size: u32,
}

impl Message {
    pub fn new<T: Payload>(value: T, from: Address) -> Self {
        let size = std::mem::size_of::<T>() as u32;
        Message {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Box::new(value),
            from,
            size,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn from(&self) -> &Address {
        &self.from
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn is<T: Payload>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Consumes the envelope, returning the typed value if `T` matches.
    /// Ownership transfers to the caller exactly once (I-NoLoss, §3):
    /// the `Message` itself is dropped by this call.
    pub fn downcast<T: Payload>(self) -> std::result::Result<T, Message> {
        if self.is::<T>() {
            Ok(*self
                .value
                .downcast::<T>()
                .unwrap_or_else(|_| unreachable!("type_id check guarantees a successful downcast")))
        } else {
            Err(self)
        }
    }

    /// Borrows the value without consuming the envelope, for handler
    /// invocation via the [`HandlerTable`](crate::handler::HandlerTable).
    pub fn value_ref<T: Payload>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("type", &self.type_name)
            .field("from", &self.from)
            .field("size", &self.size)
            .finish()
    }
}
