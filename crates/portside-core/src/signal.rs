//! Signal/slot system for Portside.
//!
//! Signals carry events from the networking tasks to subscribed listeners.
//! A slot is a closure invoked with a reference to the emitted value; it is
//! called inline in the emitting task. Emission never waits on anything
//! besides the slots themselves, so a read loop that emits a signal resumes
//! as soon as dispatch returns.
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - The signal type for emitting notifications
//! - [`SlotId`] - Stable handle returned when connecting a slot
//! - [`SlotGuard`] - Borrow-scoped connection that disconnects on drop
//!
//! # Thread Safety
//!
//! `Signal<Args>` is `Send + Sync` when its slots are; slots must be
//! `Fn(&Args) + Send + Sync` and may be connected, invoked, and disconnected
//! from any thread. The slot list is not locked during invocation, so a slot
//! may disconnect itself (or any other slot) while it runs.
//!
//! # Example
//!
//! ```
//! use portside_core::Signal;
//!
//! let bytes_written = Signal::<usize>::new();
//!
//! let id = bytes_written.connect(|&count| {
//!     println!("wrote {} bytes", count);
//! });
//!
//! bytes_written.emit(128);
//! bytes_written.disconnect(id);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Use this id to disconnect a specific slot via [`Signal::disconnect`].
    /// The id remains valid until the connection is explicitly disconnected
    /// or the signal is dropped; disconnecting one slot never disturbs the
    /// ids of others.
    pub struct SlotId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A type-safe signal with multiple connected slots.
///
/// When a signal is emitted, every connected slot is invoked exactly once
/// with a reference to the emitted value. The order in which slots are
/// invoked within one emission is unspecified: slot storage reuses freed
/// entries, so after a disconnect a newer slot may fire before older ones.
///
/// # Type Parameter
///
/// - `Args`: The value passed to connected slots. Use `()` for signals
///   with no payload.
pub struct Signal<Args> {
    /// All active connections.
    slots: Mutex<SlotMap<SlotId, Slot<Args>>>,
    /// Whether emission is temporarily suppressed.
    blocked: AtomicBool,
}

impl<Args> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(SlotMap::with_key()),
            blocked: AtomicBool::new(false),
        }
    }

    /// Connect a slot (closure) to this signal.
    ///
    /// Returns a [`SlotId`] that can be used to disconnect the slot later.
    pub fn connect<F>(&self, slot: F) -> SlotId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.slots.lock().insert(Arc::new(slot))
    }

    /// Connect a slot that is disconnected when the returned guard drops.
    ///
    /// The guard borrows the signal, so it cannot outlive it.
    pub fn connect_scoped<F>(&self, slot: F) -> SlotGuard<'_, Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        SlotGuard {
            signal: self,
            id: self.connect(slot),
        }
    }

    /// Disconnect a specific slot by its id.
    ///
    /// Returns `true` if the connection was found and removed.
    pub fn disconnect(&self, id: SlotId) -> bool {
        self.slots.lock().remove(id).is_some()
    }

    /// Disconnect all slots from this signal.
    pub fn disconnect_all(&self) {
        self.slots.lock().clear();
    }

    /// Get the number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Suppress or re-enable emission.
    ///
    /// While blocked, calls to [`emit`](Self::emit) do nothing.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Check if emission is currently suppressed.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Emit the signal, invoking every connected slot once.
    ///
    /// The slot list is snapshotted before invocation, so slots may connect
    /// or disconnect (including themselves) without deadlocking. A slot
    /// connected during emission first fires on the next emit.
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: "portside_core::signal", "signal blocked, skipping emit");
            return;
        }

        let snapshot: Vec<Slot<Args>> = self.slots.lock().values().cloned().collect();
        tracing::trace!(
            target: "portside_core::signal",
            slot_count = snapshot.len(),
            "emitting signal"
        );

        for slot in snapshot {
            slot(&args);
        }
    }
}

/// A connection that disconnects automatically when dropped.
///
/// Created via [`Signal::connect_scoped`]. Useful for temporary listeners,
/// such as a pull-style receive that only wants the next emission.
pub struct SlotGuard<'a, Args> {
    signal: &'a Signal<Args>,
    id: SlotId,
}

impl<Args> SlotGuard<'_, Args> {
    /// The id of the guarded connection.
    pub fn id(&self) -> SlotId {
        self.id
    }
}

impl<Args> Drop for SlotGuard<'_, Args> {
    fn drop(&mut self) {
        let _ = self.signal.disconnect(self.id);
    }
}
