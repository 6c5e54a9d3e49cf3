//! Copy-on-write table slot.
//!
//! A virtual host starts out reading its parent's table. The first structural
//! change copies the parent's current snapshot into private storage; from then
//! on the two hosts never observe each other's changes.
//!
//! Readers load a snapshot (`Arc<T>`) without locking. Writers are serialized
//! by a mutex and publish a new snapshot atomically.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use arc_swap::ArcSwap;

use crate::host::Host;

/// Picks the slot of the same kind on another host.
pub(crate) type Select<T> = fn(&Host) -> &CowTable<T>;

enum Slot<T> {
    /// Read through the parent, live. `fallback` is the parent's snapshot
    /// taken when the slot was created, used only if the parent is gone.
    Shared {
        parent: Weak<Host>,
        select: Select<T>,
        fallback: Arc<T>,
    },
    Owned(Arc<T>),
}

pub struct CowTable<T> {
    slot: ArcSwap<Slot<T>>,
    write: Mutex<()>,
}

impl<T: Clone> CowTable<T> {
    pub fn owned(table: T) -> Self {
        Self {
            slot: ArcSwap::from_pointee(Slot::Owned(Arc::new(table))),
            write: Mutex::new(()),
        }
    }

    pub(crate) fn shared(parent: &Arc<Host>, select: Select<T>) -> Self {
        let fallback = select(parent).load();
        Self {
            slot: ArcSwap::from_pointee(Slot::Shared {
                parent: Arc::downgrade(parent),
                select,
                fallback,
            }),
            write: Mutex::new(()),
        }
    }

    /// Current snapshot.
    pub fn load(&self) -> Arc<T> {
        match &**self.slot.load() {
            Slot::Owned(table) => table.clone(),
            Slot::Shared {
                parent,
                select,
                fallback,
            } => match parent.upgrade() {
                Some(parent) => select(&parent).load(),
                None => fallback.clone(),
            },
        }
    }

    /// True while reads still resolve through the parent.
    pub fn is_shared(&self) -> bool {
        matches!(&**self.slot.load(), Slot::Shared { .. })
    }

    /// Clone the current snapshot, apply `f`, publish the result as this
    /// slot's private table.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let _guard = self.write.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_shared() {
            tracing::debug!("Copying shared table before first write");
        }
        let mut table = T::clone(&self.load());
        let result = f(&mut table);
        self.slot.store(Arc::new(Slot::Owned(Arc::new(table))));
        result
    }

    /// Publish `table` as this slot's private table.
    pub fn replace(&self, table: T) {
        let _guard = self.write.lock().unwrap_or_else(PoisonError::into_inner);
        self.slot.store(Arc::new(Slot::Owned(Arc::new(table))));
    }
}

impl<T> fmt::Debug for CowTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &**self.slot.load() {
            Slot::Shared { .. } => "shared",
            Slot::Owned(_) => "owned",
        };
        f.debug_struct("CowTable").field("state", &state).finish()
    }
}
