//! Process-wide registry of open channels
//!
//! Maps a port path to the slot holding its open channel. Before a session opens
//! a port it releases whatever other owner in this process still holds it, so a
//! stale handle from an earlier failed attempt cannot block the open. Entries are
//! weak: the owning session keeps the slot alive.
//!
//! Not a lock. Two sessions on the same port will keep taking the port from each
//! other.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError, Weak};

use crate::channel::SerialChannel;

/// Shared slot for an open channel; `None` once closed or released
pub type ChannelSlot = Arc<Mutex<Option<Box<dyn SerialChannel>>>>;

type WeakSlot = Weak<Mutex<Option<Box<dyn SerialChannel>>>>;

static OPEN_PORTS: LazyLock<Mutex<HashMap<String, WeakSlot>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn open_ports() -> MutexGuard<'static, HashMap<String, WeakSlot>> {
    OPEN_PORTS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Record `slot` as the owner of `port_name`
pub fn register(port_name: &str, slot: &ChannelSlot) {
    open_ports().insert(port_name.to_string(), Arc::downgrade(slot));
}

/// Forget `port_name`, but only if `slot` is still its registered owner
pub fn unregister(port_name: &str, slot: &ChannelSlot) {
    let mut ports = open_ports();
    let owned = ports
        .get(port_name)
        .is_some_and(|weak| Weak::ptr_eq(weak, &Arc::downgrade(slot)));
    if owned {
        ports.remove(port_name);
    }
}

/// Close any channel another owner in this process holds on `port_name`
///
/// Returns whether a live channel was closed. Never fails.
pub fn release(port_name: &str) -> bool {
    let Some(weak) = open_ports().remove(port_name) else {
        return false;
    };
    let Some(slot) = weak.upgrade() else {
        return false;
    };

    let channel = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    match channel {
        Some(channel) => {
            log::debug!("Closing stale handle on {port_name}");
            drop(channel);
            true
        }
        None => false,
    }
}

/// Whether a live owner is registered for `port_name`
pub fn is_open(port_name: &str) -> bool {
    open_ports()
        .get(port_name)
        .and_then(Weak::upgrade)
        .is_some_and(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).is_some())
}
