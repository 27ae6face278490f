//! Entity handles for host-side objects.
//!
//! Hosts hand out an [`EntityHandle`] for every composite, member and static
//! object they place. A handle names a slot plus the generation the slot had
//! when the entity was placed, so a handle kept across a destroy/respawn
//! cycle no longer resolves once the slot is reused.

use std::fmt;

/// A slot and the generation it was issued under.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle {
    slot: u32,
    generation: u32,
}

impl EntityHandle {
    pub fn slot(self) -> u32 {
        self.slot
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityHandle({self})")
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.slot, self.generation)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    generation: u32,
    occupied: bool,
}

/// Issues [`EntityHandle`]s and recognises the ones that are still current.
#[derive(Debug, Default)]
pub struct HandleAllocator {
    slots: Vec<Slot>,
    vacant: Vec<u32>,
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a handle, taking the most recently vacated slot if there is one.
    pub fn allocate(&mut self) -> EntityHandle {
        let slot = match self.vacant.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let entry = &mut self.slots[slot as usize];
        entry.occupied = true;
        EntityHandle {
            slot,
            generation: entry.generation,
        }
    }

    /// Vacate the handle's slot. `false` if the handle was not current.
    pub fn release(&mut self, handle: EntityHandle) -> bool {
        if !self.is_live(handle) {
            return false;
        }
        let entry = &mut self.slots[handle.slot as usize];
        entry.occupied = false;
        entry.generation = entry.generation.wrapping_add(1);
        self.vacant.push(handle.slot);
        true
    }

    pub fn is_live(&self, handle: EntityHandle) -> bool {
        self.slots
            .get(handle.slot as usize)
            .is_some_and(|s| s.occupied && s.generation == handle.generation)
    }
}
