//! Arena-backed doubly linked list ordering cache keys by recency.
//!
//! Nodes live in a `Vec` and link to each other by index, so promotion and
//! removal are O(1) without raw pointers. Each slot carries a generation that
//! is bumped when the slot is freed; a [`NodeId`] captured before a removal
//! never aliases the slot's next occupant.

/// Handle to a node in a [`RecencyList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeId {
    index: usize,
    generation: u64,
}

#[derive(Debug)]
struct Slot<K> {
    key: Option<K>,
    prev: Option<usize>,
    next: Option<usize>,
    generation: u64,
}

/// Keys ordered from most recently used (front) to least (back).
#[derive(Debug)]
pub(crate) struct RecencyList<K> {
    slots: Vec<Slot<K>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<K> RecencyList<K> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Insert a key as most recently used.
    pub(crate) fn push_front(&mut self, key: K) -> NodeId {
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index].key = Some(key);
                index
            }
            None => {
                self.slots.push(Slot {
                    key: Some(key),
                    prev: None,
                    next: None,
                    generation: 0,
                });
                self.slots.len() - 1
            }
        };
        self.link_front(index);
        self.len += 1;
        NodeId {
            index,
            generation: self.slots[index].generation,
        }
    }

    /// Move a live node to the front. Returns false for stale handles.
    pub(crate) fn promote(&mut self, id: NodeId) -> bool {
        if !self.is_live(id) {
            return false;
        }
        if self.head != Some(id.index) {
            self.unlink(id.index);
            self.link_front(id.index);
        }
        true
    }

    /// Remove a live node, returning its key.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<K> {
        if !self.is_live(id) {
            return None;
        }
        self.release(id.index)
    }

    /// Remove the least recently used key.
    pub(crate) fn pop_back(&mut self) -> Option<K> {
        let index = self.tail?;
        self.release(index)
    }

    /// Key stored at a live node.
    #[cfg(test)]
    pub(crate) fn get(&self, id: NodeId) -> Option<&K> {
        if !self.is_live(id) {
            return None;
        }
        self.slots[id.index].key.as_ref()
    }

    /// Free every node. Outstanding handles become stale.
    pub(crate) fn clear(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.key.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            slot.prev = None;
            slot.next = None;
            self.free.push(index);
        }
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Iterate keys from most to least recently used.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &K> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let index = cursor?;
            let slot = &self.slots[index];
            cursor = slot.next;
            slot.key.as_ref()
        })
    }

    fn is_live(&self, id: NodeId) -> bool {
        self.slots
            .get(id.index)
            .is_some_and(|slot| slot.generation == id.generation && slot.key.is_some())
    }

    fn release(&mut self, index: usize) -> Option<K> {
        self.unlink(index);
        let slot = &mut self.slots[index];
        let key = slot.key.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
        Some(key)
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = {
            let slot = &self.slots[index];
            (slot.prev, slot.next)
        };
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }
        let slot = &mut self.slots[index];
        slot.prev = None;
        slot.next = None;
    }

    fn link_front(&mut self, index: usize) {
        let old_head = self.head;
        {
            let slot = &mut self.slots[index];
            slot.prev = None;
            slot.next = old_head;
        }
        if let Some(h) = old_head {
            self.slots[h].prev = Some(index);
        }
        self.head = Some(index);
        if self.tail.is_none() {
            self.tail = Some(index);
        }
    }
}

impl<K> Default for RecencyList<K> {
    fn default() -> Self {
        Self::new()
    }
}
