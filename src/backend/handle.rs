use std::fmt;
use std::marker::PhantomData;

/// Typed, generation-checked handle into a [`Slots`] table.
///
/// A handle outlives the resource it names; once the slot is freed the
/// generation no longer matches and lookups return `None`.
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

// Manually implemented so `T` needs none of these traits.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

impl<T> Handle<T> {
    fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }
}

struct Slot<V> {
    generation: u32,
    value: Option<V>,
}

/// Storage for backend resources addressed by `Handle<M>`.
pub struct Slots<M, V> {
    slots: Vec<Slot<V>>,
    free: Vec<u32>,
    live: usize,
    _marker: PhantomData<fn() -> M>,
}

impl<M, V> Slots<M, V> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            _marker: PhantomData,
        }
    }

    pub fn insert(&mut self, value: V) -> Handle<M> {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.value = Some(value);
            return Handle::new(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Handle::new(index, 0)
    }

    pub fn get(&self, handle: Handle<M>) -> Option<&V> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: Handle<M>) -> Option<&mut V> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn remove(&mut self, handle: Handle<M>) -> Option<V> {
        let slot = self
            .slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation)?;
        let value = slot.value.take()?;
        self.free.push(handle.index);
        self.live -= 1;
        Some(value)
    }

    pub fn contains(&self, handle: Handle<M>) -> bool {
        self.get(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

impl<M, V> Default for Slots<M, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    enum Marker {}

    #[test]
    fn handle_is_copy() {
        let mut slots: Slots<Marker, String> = Slots::new();
        let h1 = slots.insert("a".into());
        let h2 = h1;
        assert_eq!(h1, h2);
        assert_eq!(slots.get(h2).map(String::as_str), Some("a"));
    }

    #[test]
    fn removed_handle_goes_stale_when_slot_is_reused() {
        let mut slots: Slots<Marker, u32> = Slots::new();
        let first = slots.insert(1);
        assert_eq!(slots.remove(first), Some(1));
        assert_eq!(slots.remove(first), None);

        let second = slots.insert(2);
        assert_eq!(first.index(), second.index());
        assert_ne!(first, second);
        assert!(slots.get(first).is_none());
        assert_eq!(slots.get(second), Some(&2));
        assert_eq!(slots.len(), 1);
    }
}
