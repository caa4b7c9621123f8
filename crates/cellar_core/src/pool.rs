//! Pooled state storage
//!
//! Slots freed by [`StatePool::remove`] are reused by later inserts. Every
//! reuse bumps the slot generation, so a handle kept past its removal fails
//! with [`CellarError::StaleHandle`] instead of reaching the new occupant.
//!
//! A pool is owned by one search thread; concurrent drivers keep one pool
//! per thread.

use serde::{Deserialize, Serialize};

use crate::error::{CellarError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle {
    index: usize,
    generation: u32,
}

impl Handle {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Debug, Clone)]
pub struct StatePool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    live: usize,
}

impl<T> Default for StatePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StatePool<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
        }
    }

    pub fn insert(&mut self, value: T) -> Handle {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.generation = slot.generation.wrapping_add(1);
            slot.value = Some(value);
            return Handle {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Handle {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    pub fn get(&self, handle: Handle) -> Result<&T> {
        self.slots
            .get(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
            .ok_or_else(|| stale(handle))
    }

    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut T> {
        self.slots
            .get_mut(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
            .ok_or_else(|| stale(handle))
    }

    /// Returns the stored value and frees its slot.
    pub fn remove(&mut self, handle: Handle) -> Result<T> {
        let value = self
            .slots
            .get_mut(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.take())
            .ok_or_else(|| stale(handle))?;
        self.free.push(handle.index);
        self.live -= 1;
        Ok(value)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_ok()
    }

    /// Live values.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Slots allocated so far, live or free.
    pub fn slots(&self) -> usize {
        self.slots.len()
    }

    /// Frees every slot. Outstanding handles become stale.
    pub fn clear(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            slot.value = None;
            self.free.push(index);
        }
        self.live = 0;
    }
}

impl<T: Clone> StatePool<T> {
    /// Stores an independent copy of the value behind `handle`.
    pub fn duplicate(&mut self, handle: Handle) -> Result<Handle> {
        let copy = self.get(handle)?.clone();
        Ok(self.insert(copy))
    }
}

fn stale(handle: Handle) -> CellarError {
    CellarError::StaleHandle {
        index: handle.index,
        generation: handle.generation,
    }
}
