//! Fixed-capacity bitset over file ids.

use crate::error::{Result, TagscopeError};

const BITS: u32 = u64::BITS;

#[derive(Clone, PartialEq, Eq)]
pub struct IdSet {
    words: Vec<u64>,
    capacity: u32,
}

impl IdSet {
    /// A set able to hold ids in `0..capacity`.
    pub fn with_capacity(capacity: u32) -> Self {
        let words = capacity.div_ceil(BITS) as usize;
        Self {
            words: vec![0; words],
            capacity,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    fn check(&self, id: u32) -> Result<()> {
        if id >= self.capacity {
            return Err(TagscopeError::IdOutOfRange {
                id,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    pub fn add(&mut self, id: u32) -> Result<()> {
        self.check(id)?;
        self.words[(id / BITS) as usize] |= 1 << (id % BITS);
        Ok(())
    }

    pub fn remove(&mut self, id: u32) -> Result<()> {
        self.check(id)?;
        self.words[(id / BITS) as usize] &= !(1 << (id % BITS));
        Ok(())
    }

    pub fn contains(&self, id: u32) -> bool {
        id < self.capacity && self.words[(id / BITS) as usize] & (1 << (id % BITS)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Smallest member.
    pub fn first(&self) -> Option<u32> {
        self.scan_from(0)
    }

    /// Smallest member greater than `id`.
    pub fn next(&self, id: u32) -> Option<u32> {
        id.checked_add(1).and_then(|start| self.scan_from(start))
    }

    fn scan_from(&self, start: u32) -> Option<u32> {
        if start >= self.capacity {
            return None;
        }
        let mut index = (start / BITS) as usize;
        let mut word = self.words[index] & (!0u64 << (start % BITS));
        loop {
            if word != 0 {
                return Some(index as u32 * BITS + word.trailing_zeros());
            }
            index += 1;
            if index == self.words.len() {
                return None;
            }
            word = self.words[index];
        }
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            set: self,
            next: self.first(),
        }
    }
}

impl std::fmt::Debug for IdSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

pub struct Iter<'a> {
    set: &'a IdSet,
    next: Option<u32>,
}

impl Iterator for Iter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let current = self.next?;
        self.next = self.set.next(current);
        Some(current)
    }
}

impl<'a> IntoIterator for &'a IdSet {
    type Item = u32;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_contains_and_count() {
        let mut set = IdSet::with_capacity(200);
        assert!(set.is_empty());
        for id in [1, 63, 64, 65, 199] {
            set.add(id).unwrap();
        }
        set.add(64).unwrap();
        assert!(set.contains(63));
        assert!(set.contains(199));
        assert!(!set.contains(2));
        assert!(!set.contains(500));
        assert_eq!(set.count(), 5);
        assert!(!set.is_empty());
    }

    #[test]
    fn add_out_of_range_is_an_error() {
        let mut set = IdSet::with_capacity(10);
        assert!(set.add(9).is_ok());
        assert!(matches!(
            set.add(10),
            Err(TagscopeError::IdOutOfRange { id: 10, capacity: 10 })
        ));
    }

    #[test]
    fn ordered_iteration() {
        let mut set = IdSet::with_capacity(300);
        for id in [257, 3, 128, 64, 0] {
            set.add(id).unwrap();
        }
        assert_eq!(set.first(), Some(0));
        assert_eq!(set.next(3), Some(64));
        assert_eq!(set.next(257), None);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 3, 64, 128, 257]);

        set.remove(0).unwrap();
        assert_eq!(set.first(), Some(3));
        assert_eq!(format!("{:?}", set), "{3, 64, 128, 257}");
    }

    #[test]
    fn empty_capacity() {
        let set = IdSet::with_capacity(0);
        assert!(set.is_empty());
        assert_eq!(set.first(), None);
        assert!(!set.contains(0));
    }
}
