//! A vector made of fixed size blocks.
//!
//! Growing never reallocates and moves already stored elements, it just appends another block.
//! This bounds the transient over allocation for edge sets with hundreds of millions of entries,
//! which a doubling `Vec` would temporarily need twice.
//! The consuming iterator releases every block as soon as it was passed,
//! so streaming a huge output sequence into a different representation
//! does not keep both copies alive.

use std::{
    iter::FromIterator,
    ops::{Index, IndexMut},
};

/// Size of a single block in bytes.
pub const BLOCK_BYTES: usize = 8 * 1024 * 1024;

/// Append mostly sequence type, stored in blocks of `block_len` elements.
/// All blocks except for the last one are always full.
#[derive(Debug, Clone)]
pub struct SegmentedVec<T> {
    blocks: Vec<Vec<T>>,
    len: usize,
    block_len: usize,
}

impl<T> Default for SegmentedVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SegmentedVec<T> {
    /// Create an empty vector with blocks of `BLOCK_BYTES` bytes.
    pub fn new() -> Self {
        Self::with_block_len((BLOCK_BYTES / std::mem::size_of::<T>().max(1)).max(1))
    }

    /// Create an empty vector with blocks of `block_len` elements.
    pub fn with_block_len(block_len: usize) -> Self {
        assert!(block_len > 0, "blocks must hold at least one element");
        SegmentedVec {
            blocks: Vec::new(),
            len: 0,
            block_len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Number of currently allocated blocks.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Blocks grow lazily one at a time, so there is nothing to reserve.
    pub fn reserve(&mut self, _additional: usize) {}

    pub fn push(&mut self, value: T) {
        match self.blocks.last_mut() {
            Some(block) if block.len() < self.block_len => block.push(value),
            _ => {
                let mut block = Vec::with_capacity(self.block_len);
                block.push(value);
                self.blocks.push(block);
            }
        }
        self.len += 1;
    }

    pub fn pop(&mut self) -> Option<T> {
        let block = self.blocks.last_mut()?;
        let value = block.pop();
        if block.is_empty() {
            self.blocks.pop();
        }
        if value.is_some() {
            self.len -= 1;
        }
        value
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        if index < self.len {
            Some(&self.blocks[index / self.block_len][index % self.block_len])
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index < self.len {
            Some(&mut self.blocks[index / self.block_len][index % self.block_len])
        } else {
            None
        }
    }

    pub fn last(&self) -> Option<&T> {
        self.blocks.last().and_then(|block| block.last())
    }

    /// Shorten the vector to `len` elements and release all blocks which are no longer needed.
    /// Does nothing if `len` is greater than the current length.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        let needed_blocks = (len + self.block_len - 1) / self.block_len;
        self.blocks.truncate(needed_blocks);
        if let Some(block) = self.blocks.last_mut() {
            block.truncate(len - (needed_blocks - 1) * self.block_len);
        }
        self.len = len;
    }

    /// Drop all elements and release all blocks.
    pub fn clear(&mut self) {
        self.blocks = Vec::new();
        self.len = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.blocks.iter().flat_map(|block| block.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.blocks.iter_mut().flat_map(|block| block.iter_mut())
    }

    /// Move all elements of `other` to the end of `self`.
    pub fn append(&mut self, other: SegmentedVec<T>) {
        for value in other {
            self.push(value);
        }
    }

    /// Move the elements into a contiguous `Vec`, freeing blocks while doing so.
    pub fn into_vec(self) -> Vec<T> {
        let mut vec = Vec::with_capacity(self.len);
        vec.extend(self);
        vec
    }
}

impl<T: Clone> SegmentedVec<T> {
    /// Resize to `new_len` elements.
    /// Growing fills up with clones of `value` block by block, shrinking releases unreachable blocks.
    pub fn resize(&mut self, new_len: usize, value: T) {
        if new_len <= self.len {
            self.truncate(new_len);
            return;
        }
        while self.len < new_len {
            let block_len = self.block_len;
            match self.blocks.last_mut() {
                Some(block) if block.len() < block_len => {
                    let fill = (block_len - block.len()).min(new_len - self.len);
                    block.resize(block.len() + fill, value.clone());
                    self.len += fill;
                }
                _ => self.blocks.push(Vec::with_capacity(block_len)),
            }
        }
    }
}

impl<T> Index<usize> for SegmentedVec<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        assert!(index < self.len, "index {} out of bounds for length {}", index, self.len);
        &self.blocks[index / self.block_len][index % self.block_len]
    }
}

impl<T> IndexMut<usize> for SegmentedVec<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        assert!(index < self.len, "index {} out of bounds for length {}", index, self.len);
        &mut self.blocks[index / self.block_len][index % self.block_len]
    }
}

impl<T> Extend<T> for SegmentedVec<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl<T> FromIterator<T> for SegmentedVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut vec = SegmentedVec::new();
        vec.extend(iter);
        vec
    }
}

/// Consuming iterator which frees each block as soon as it has been passed.
#[derive(Debug)]
pub struct IntoIter<T> {
    remaining_blocks: std::vec::IntoIter<Vec<T>>,
    current: std::vec::IntoIter<T>,
    len: usize,
}

impl<T> IntoIter<T> {
    /// Number of blocks still allocated by the iterator, including the one currently being drained.
    pub fn held_blocks(&self) -> usize {
        self.remaining_blocks.len() + usize::from(self.current.len() > 0)
    }
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            if let Some(value) = self.current.next() {
                self.len -= 1;
                return Some(value);
            }
            // assigning drops the exhausted block
            self.current = self.remaining_blocks.next()?.into_iter();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}

impl<T> IntoIterator for SegmentedVec<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        IntoIter {
            remaining_blocks: self.blocks.into_iter(),
            current: Vec::new().into_iter(),
            len: self.len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_index_across_blocks() {
        let mut vec = SegmentedVec::with_block_len(3);
        for i in 0..10 {
            vec.push(i);
        }
        assert_eq!(vec.len(), 10);
        assert_eq!(vec.num_blocks(), 4);
        assert_eq!(vec[0], 0);
        assert_eq!(vec[3], 3);
        assert_eq!(vec[9], 9);
        assert_eq!(vec.get(10), None);
        vec[4] = 42;
        assert_eq!(vec.iter().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3, 42, 5, 6, 7, 8, 9]);
    }

    #[test]
    #[should_panic]
    fn index_beyond_len_panics() {
        let mut vec = SegmentedVec::with_block_len(4);
        vec.push(1u32);
        let _ = vec[1];
    }

    #[test]
    fn resize_releases_blocks() {
        let mut vec = SegmentedVec::with_block_len(4);
        vec.resize(10, 7u32);
        assert_eq!(vec.len(), 10);
        assert_eq!(vec.num_blocks(), 3);
        assert!(vec.iter().all(|&x| x == 7));

        vec.resize(5, 0);
        assert_eq!(vec.len(), 5);
        assert_eq!(vec.num_blocks(), 2);

        vec.resize(8, 1);
        assert_eq!(vec.iter().copied().collect::<Vec<_>>(), vec![7, 7, 7, 7, 7, 1, 1, 1]);

        vec.resize(0, 0);
        assert!(vec.is_empty());
        assert_eq!(vec.num_blocks(), 0);
    }

    #[test]
    fn consuming_iterator_frees_passed_blocks() {
        let vec: SegmentedVec<u32> = {
            let mut vec = SegmentedVec::with_block_len(2);
            vec.extend(0..6);
            vec
        };
        let mut iter = vec.into_iter();
        assert_eq!(iter.held_blocks(), 3);
        assert_eq!(iter.next(), Some(0));
        assert_eq!(iter.held_blocks(), 3);
        assert_eq!(iter.next(), Some(1));
        assert_eq!(iter.next(), Some(2));
        assert_eq!(iter.held_blocks(), 2);
        assert_eq!(iter.len(), 3);
        assert_eq!(iter.collect::<Vec<_>>(), vec![3, 4, 5]);
    }

    #[test]
    fn pop_and_append() {
        let mut a = SegmentedVec::with_block_len(2);
        a.extend(0..3);
        let mut b = SegmentedVec::with_block_len(5);
        b.extend(3..5);
        a.append(b);
        assert_eq!(a.pop(), Some(4));
        assert_eq!(a.last(), Some(&3));
        assert_eq!(a.into_vec(), vec![0, 1, 2, 3]);
    }
}
