/// Fixed-capacity arena with an index free list.
///
/// Slots are reused in LIFO order; nothing is allocated after construction.
pub struct Pool<T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
}

impl<T> Pool<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            free: (0..capacity as u32).rev().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.len() == self.slots.len()
    }

    /// Returns `None` when every slot is taken.
    pub fn insert(&mut self, value: T) -> Option<u32> {
        let index = self.free.pop()?;
        self.slots[index as usize] = Some(value);
        Some(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (i as u32, v)))
    }

    /// Keeps only the values for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&mut T) -> bool) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot {
                if !keep(value) {
                    *slot = None;
                    self.free.push(i as u32);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.free.clear();
        self.free.extend((0..self.slots.len() as u32).rev());
    }
}

#[cfg(test)]
mod tests {
    use super::Pool;

    #[test]
    fn reuses_freed_slots() {
        let mut pool = Pool::with_capacity(2);
        let a = pool.insert("a").unwrap();
        let b = pool.insert("b").unwrap();
        assert_eq!((a, b), (0, 1));
        assert!(pool.insert("c").is_none());
        pool.retain(|v| *v != "a");
        assert_eq!(pool.insert("d"), Some(a));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn retain_releases_slots() {
        let mut pool = Pool::with_capacity(4);
        for i in 0..4 {
            pool.insert(i);
        }
        pool.retain(|v| *v % 2 == 0);
        assert_eq!(pool.len(), 2);
        let kept: Vec<_> = pool.iter().map(|(_, v)| *v).collect();
        assert_eq!(kept, [0, 2]);
        pool.clear();
        assert!(pool.is_empty());
        assert_eq!(pool.insert(9), Some(0));
    }
}
