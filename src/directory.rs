//! Fixed-capacity, directory-addressed mailbox space (§3 C4, §4.1).
//!
//! Grounded on the teacher's `system.rs`/`kernel.rs` registry split: a flat
//! `Vec` of stable slots (the teacher's `ActorRef` table) plus a name index
//! (the teacher's path-keyed actor lookup), here backed by `dashmap` rather
//! than a `RwLock<HashMap>` since the directory is read far more than it is
//! written (one write per actor creation/removal, many reads per `send`).

use std::sync::Arc;

use dashmap::DashMap;

use crate::address::Address;
use crate::error::{Result, TheronError};
use crate::mailbox::{Mailbox, MailboxRef};

/// One directory slot: either free (on the free list) or holding a live
/// mailbox.
enum Slot {
    Free,
    Occupied(MailboxRef),
}

/// The fixed-size table of mailbox slots for one Framework instance, plus
/// its name index (§3 C4).
///
/// `framework_id` is burned into every [`Address`] this directory hands
/// out, so mailboxes from different Frameworks never collide even though
/// `mailbox_index` values are reused after a slot is freed (§3 "Addressing
/// is stable for a mailbox's lifetime; reused after removal").
pub struct Directory {
    framework_id: u16,
    slots: std::sync::Mutex<Vec<Slot>>,
    free_list: std::sync::Mutex<Vec<u32>>,
    capacity: u32,
    by_name: DashMap<String, u32>,
}

impl Directory {
    pub fn new(framework_id: u16, capacity: u32) -> Self {
        Directory {
            framework_id,
            slots: std::sync::Mutex::new(Vec::new()),
            free_list: std::sync::Mutex::new(Vec::new()),
            capacity,
            by_name: DashMap::new(),
        }
    }

    pub fn framework_id(&self) -> u16 {
        self.framework_id
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Allocates a new slot, optionally under `name`, and returns its
    /// address. Reuses a freed index before growing the table; fails once
    /// `capacity` distinct slots are simultaneously live (§4.1 boundary
    /// case, §8 "exceeding max_actors").
    pub fn allocate(&self, name: Option<String>) -> Result<(Address, MailboxRef)> {
        if let Some(name) = &name {
            if self.by_name.contains_key(name) {
                return Err(TheronError::DuplicateName(name.clone()));
            }
        }

        let mut slots = self.slots.lock().unwrap();
        let mut free_list = self.free_list.lock().unwrap();

        let index = if let Some(index) = free_list.pop() {
            index
        } else if (slots.len() as u32) < self.capacity {
            slots.push(Slot::Free);
            (slots.len() - 1) as u32
        } else {
            return Err(TheronError::CapacityExhausted {
                max_actors: self.capacity,
            });
        };

        let mailbox = Mailbox::new(name.clone());
        slots[index as usize] = Slot::Occupied(mailbox.clone());
        drop(free_list);
        drop(slots);

        if let Some(name) = name {
            self.by_name.insert(name, index);
        }

        let address = Address::new(self.framework_id, index);
        Ok((address, mailbox))
    }

    pub fn lookup(&self, address: &Address) -> Option<MailboxRef> {
        if address.framework_id() != self.framework_id {
            return None;
        }
        let slots = self.slots.lock().unwrap();
        match slots.get(address.mailbox_index() as usize)? {
            Slot::Occupied(mailbox) => Some(mailbox.clone()),
            Slot::Free => None,
        }
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<Address> {
        let index = *self.by_name.get(name)?;
        Some(Address::new(self.framework_id, index))
    }

    /// Frees a slot for reuse. The caller is responsible for having already
    /// drained and unbound the mailbox (§4.8 teardown order); this only
    /// removes it from the directory's bookkeeping.
    pub fn free(&self, address: &Address) {
        let index = address.mailbox_index();
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot @ Slot::Occupied(_)) = slots.get_mut(index as usize) {
            if let Slot::Occupied(mailbox) = std::mem::replace(slot, Slot::Free) {
                if let Some(name) = mailbox.name() {
                    self.by_name.remove(&name);
                }
            }
            self.free_list.lock().unwrap().push(index);
        }
    }

    pub fn live_count(&self) -> u32 {
        self.slots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| matches!(s, Slot::Occupied(_)))
            .count() as u32
    }

    /// All live mailboxes, for teardown draining (§4.8).
    pub fn all_mailboxes(&self) -> Vec<Arc<Mailbox>> {
        self.slots
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| match s {
                Slot::Occupied(mailbox) => Some(mailbox.clone()),
                Slot::Free => None,
            })
            .collect()
    }
}
