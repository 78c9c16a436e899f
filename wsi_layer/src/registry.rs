/// Handle registries
///
/// The layer sits between an application and a driver, so it sees two kinds
/// of handles:
///
/// - Handles it did not create (devices, surfaces). [`Registry`] maps the raw
///   value the application passes to the object the layer keeps for it.
/// - Handles it creates itself (swapchains). [`HandleMap`] issues them from a
///   slot map, so a handle whose object was destroyed is rejected even if the
///   slot has been reused.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, Key, KeyData, SlotMap};
use crate::error::{ConfigError, Error, Result};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

// ===== EXTERNAL HANDLES =====

/// Objects associated with handles supplied from outside the layer
pub struct Registry<V: ?Sized> {
    kind: &'static str,
    entries: RwLock<FxHashMap<u64, Arc<V>>>,
}

impl<V: ?Sized> Registry<V> {
    /// Create an empty registry; `kind` names the objects in errors
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: RwLock::new(FxHashMap::default()),
        }
    }

    /// Associate `value` with `handle`; a handle can only be associated once
    pub fn associate(&self, handle: u64, value: Arc<V>) -> Result<()> {
        let mut entries = write(&self.entries);
        if entries.contains_key(&handle) {
            return Err(ConfigError::InvalidParameter(format!(
                "{} 0x{:x} is already registered", self.kind, handle
            ))
            .into());
        }
        entries.insert(handle, value);
        Ok(())
    }

    /// Object associated with `handle`
    pub fn get(&self, handle: u64) -> Result<Arc<V>> {
        read(&self.entries)
            .get(&handle)
            .cloned()
            .ok_or(Error::InvalidHandle(handle))
    }

    /// Remove the association and return the object
    pub fn disassociate(&self, handle: u64) -> Result<Arc<V>> {
        write(&self.entries)
            .remove(&handle)
            .ok_or(Error::InvalidHandle(handle))
    }

    pub fn contains(&self, handle: u64) -> bool {
        read(&self.entries).contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        read(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.entries).is_empty()
    }

    /// Remove every association
    pub fn drain(&self) -> Vec<(u64, Arc<V>)> {
        write(&self.entries).drain().collect()
    }
}

// ===== LAYER HANDLES =====

new_key_type! {
    /// Slot map key behind every handle the layer issues
    struct LayerKey;
}

fn to_handle(key: LayerKey) -> u64 {
    key.data().as_ffi()
}

fn to_key(handle: u64) -> LayerKey {
    KeyData::from_ffi(handle).into()
}

/// Objects created by the layer, addressed by opaque `u64` handles
///
/// Handles are never 0, and a removed handle stays invalid.
pub struct HandleMap<V> {
    slots: RwLock<SlotMap<LayerKey, Arc<V>>>,
}

impl<V> Default for HandleMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> HandleMap<V> {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(SlotMap::with_key()),
        }
    }

    /// Store `value` and issue a handle for it
    pub fn insert(&self, value: V) -> u64 {
        to_handle(write(&self.slots).insert(Arc::new(value)))
    }

    /// Object behind `handle`
    ///
    /// The map lock is released before returning, so blocking calls on the
    /// object do not hold up other handles.
    pub fn get(&self, handle: u64) -> Result<Arc<V>> {
        read(&self.slots)
            .get(to_key(handle))
            .cloned()
            .ok_or(Error::InvalidHandle(handle))
    }

    /// Invalidate `handle` and return its object
    pub fn remove(&self, handle: u64) -> Result<Arc<V>> {
        write(&self.slots)
            .remove(to_key(handle))
            .ok_or(Error::InvalidHandle(handle))
    }

    pub fn contains(&self, handle: u64) -> bool {
        read(&self.slots).contains_key(to_key(handle))
    }

    pub fn len(&self) -> usize {
        read(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.slots).is_empty()
    }

    /// Invalidate every handle and return the objects
    pub fn drain(&self) -> Vec<Arc<V>> {
        write(&self.slots).drain().map(|(_, value)| value).collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
