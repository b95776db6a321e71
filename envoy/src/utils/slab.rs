/// Keyed storage with reuse of freed slots.
///
/// [`insert`](Self::insert) hands out a small index that stays valid until
/// the value is removed, either through [`remove`](Self::remove) or by
/// [`drain`](Self::drain). Freed indices are handed out again by later
/// insertions, so the storage never grows past the peak number of live
/// values.
pub(crate) struct Slab<T> {
    /// Stored values; `None` marks a vacant slot.
    entries: Vec<Option<T>>,
    /// Stack of vacant indices.
    free: Vec<usize>,
    /// Number of occupied slots.
    len: usize,
}

impl<T> Slab<T> {
    /// Creates an empty slab.
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Stores `value` and returns its key.
    ///
    /// A vacant slot is reused if there is one.
    pub(crate) fn insert(&mut self, value: T) -> usize {
        let index = match self.free.pop() {
            Some(index) => {
                self.entries[index] = Some(value);
                index
            }
            None => {
                self.entries.push(Some(value));
                self.entries.len() - 1
            }
        };

        self.len += 1;
        index
    }

    /// Removes the value stored under `index`.
    ///
    /// Returns `None` if the slot is vacant or out of range, which happens
    /// for keys whose value was already drained.
    pub(crate) fn remove(&mut self, index: usize) -> Option<T> {
        let value = self.entries.get_mut(index)?.take()?;

        self.free.push(index);
        self.len -= 1;

        Some(value)
    }

    /// Returns the value stored under `index`, if the slot is occupied.
    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.entries.get_mut(index)?.as_mut()
    }

    /// Returns the number of stored values.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Removes every value, leaving the slab empty.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.free.clear();
        self.len = 0;
        self.entries.drain(..).flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freed_keys_are_reused() {
        let mut slab = Slab::new();
        let a = slab.insert("a");
        let b = slab.insert("b");

        assert_eq!(slab.remove(a), Some("a"));
        assert_eq!(slab.insert("c"), a);
        assert_eq!(slab.get_mut(b), Some(&mut "b"));
        assert_eq!(slab.len(), 2);
    }

    #[test]
    fn removing_a_vacant_key_is_a_no_op() {
        let mut slab = Slab::new();
        let key = slab.insert(1);

        assert_eq!(slab.remove(key), Some(1));
        assert_eq!(slab.remove(key), None);
        assert_eq!(slab.remove(99), None);
        assert_eq!(slab.len(), 0);
    }

    #[test]
    fn drain_empties_the_slab() {
        let mut slab = Slab::new();
        let first = slab.insert(1);
        slab.insert(2);
        slab.insert(3);
        slab.remove(first);

        let mut drained: Vec<_> = slab.drain().collect();
        drained.sort();

        assert_eq!(drained, [2, 3]);
        assert_eq!(slab.len(), 0);
        assert_eq!(slab.get_mut(first), None);
        assert_eq!(slab.insert(4), 0);
    }
}
