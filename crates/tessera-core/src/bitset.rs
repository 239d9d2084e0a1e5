// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Implements the growable bitset used for every occupancy table in the dataset.

/// A growable bitset wrapped around a `Vec<u64>`.
///
/// Bits beyond the current storage read as `0`. Setting such a bit extends the
/// storage transparently; storage is never shrunk. Iteration is always expressed
/// through [`Bitset::next_set_bit`] so that sparse sets stay cheap to scan no
/// matter how large the logical address space is.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Bitset {
    pub(crate) bits: Vec<u64>,
}

const WORD_BITS: usize = 64;

impl Bitset {
    /// Creates a new, empty bitset.
    pub fn new() -> Self {
        Self { bits: Vec::new() }
    }

    /// Creates an empty bitset with storage pre-allocated for at least `bits` bits.
    pub fn with_capacity(bits: usize) -> Self {
        Self {
            bits: vec![0; bits.div_ceil(WORD_BITS)],
        }
    }

    /// Returns the number of bits currently backed by storage.
    pub fn capacity(&self) -> usize {
        self.bits.len() * WORD_BITS
    }

    /// Returns true if the bit at the specified index is set.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        let (word_idx, bit_idx) = split(index);
        match self.bits.get(word_idx) {
            Some(word) => (word & (1 << bit_idx)) != 0,
            None => false,
        }
    }

    /// Sets the bit at the specified index to `value`.
    #[inline]
    pub fn set(&mut self, index: usize, value: bool) {
        if !value {
            self.clear(index);
            return;
        }

        let (word_idx, bit_idx) = split(index);

        // Ensure the vector is large enough to hold the bit.
        if word_idx >= self.bits.len() {
            self.bits.resize(word_idx + 1, 0);
        }

        self.bits[word_idx] |= 1 << bit_idx;
    }

    /// Clears the bit at the specified index to 0.
    #[inline]
    pub fn clear(&mut self, index: usize) {
        let (word_idx, bit_idx) = split(index);

        if word_idx < self.bits.len() {
            self.bits[word_idx] &= !(1 << bit_idx);
        }
    }

    /// Clears every bit while keeping the allocated storage.
    pub fn reset(&mut self) {
        self.bits.iter_mut().for_each(|word| *word = 0);
    }

    /// Returns the index of the first set bit at or after `from`.
    pub fn next_set_bit(&self, from: usize) -> Option<usize> {
        let (mut word_idx, bit_idx) = split(from);
        let mut word = self.bits.get(word_idx)? & (!0u64 << bit_idx);

        loop {
            if word != 0 {
                return Some(word_idx * WORD_BITS + word.trailing_zeros() as usize);
            }
            word_idx += 1;
            word = *self.bits.get(word_idx)?;
        }
    }

    /// Returns the index of the last set bit at or before `from`.
    pub fn previous_set_bit(&self, from: usize) -> Option<usize> {
        if self.bits.is_empty() {
            return None;
        }

        let (mut word_idx, bit_idx) = split(from);
        let mut word = if word_idx >= self.bits.len() {
            word_idx = self.bits.len() - 1;
            self.bits[word_idx]
        } else {
            self.bits[word_idx] & (!0u64 >> (WORD_BITS - 1 - bit_idx))
        };

        loop {
            if word != 0 {
                return Some(word_idx * WORD_BITS + (WORD_BITS - 1) - word.leading_zeros() as usize);
            }
            if word_idx == 0 {
                return None;
            }
            word_idx -= 1;
            word = self.bits[word_idx];
        }
    }

    /// Returns the index of the first clear bit at or after `from`.
    ///
    /// Bits past the end of storage are clear, so this always succeeds.
    pub fn next_clear_bit(&self, from: usize) -> usize {
        let (mut word_idx, bit_idx) = split(from);
        let Some(first) = self.bits.get(word_idx) else {
            return from;
        };
        let mut word = !first & (!0u64 << bit_idx);

        loop {
            if word != 0 {
                return word_idx * WORD_BITS + word.trailing_zeros() as usize;
            }
            word_idx += 1;
            match self.bits.get(word_idx) {
                Some(next) => word = !next,
                None => return word_idx * WORD_BITS,
            }
        }
    }

    /// Returns the number of set bits.
    pub fn count_ones(&self) -> usize {
        self.bits.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Returns true if no bit is set.
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|word| *word == 0)
    }

    /// Returns an iterator over the indices of all set bits, in ascending order.
    pub fn iter_ones(&self) -> Ones<'_> {
        Ones {
            bitset: self,
            cursor: 0,
        }
    }
}

/// Iterator over the set bits of a [`Bitset`], built on [`Bitset::next_set_bit`].
#[derive(Debug, Clone)]
pub struct Ones<'a> {
    bitset: &'a Bitset,
    cursor: usize,
}

impl Iterator for Ones<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.bitset.next_set_bit(self.cursor)?;
        self.cursor = index + 1;
        Some(index)
    }
}

#[inline]
fn split(index: usize) -> (usize, usize) {
    (index / WORD_BITS, index % WORD_BITS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_and_clear() {
        let mut bits = Bitset::new();
        assert!(!bits.get(5));

        bits.set(5, true);
        bits.set(9, true);
        assert!(bits.get(5));
        assert!(bits.get(9));
        assert!(!bits.get(12));

        bits.set(5, false);
        assert!(!bits.get(5));
        assert!(bits.get(9));

        bits.clear(9);
        assert!(bits.is_empty());
    }

    #[test]
    fn grows_transparently() {
        let mut bits = Bitset::new();
        assert_eq!(bits.capacity(), 0);

        bits.set(1000, true);
        assert!(bits.get(1000));
        assert!(bits.capacity() >= 1001);
        assert!(!bits.get(999));

        // Clearing out of range never allocates.
        let mut other = Bitset::new();
        other.clear(500);
        other.set(500, false);
        assert_eq!(other.capacity(), 0);
    }

    #[test]
    fn reset_keeps_capacity() {
        let mut bits = Bitset::with_capacity(130);
        bits.set(3, true);
        bits.set(129, true);
        let capacity = bits.capacity();

        bits.reset();
        assert!(bits.is_empty());
        assert_eq!(bits.capacity(), capacity);
    }

    #[test]
    fn next_set_bit_across_words() {
        let mut bits = Bitset::new();
        bits.set(0, true);
        bits.set(63, true);
        bits.set(64, true);
        bits.set(200, true);

        assert_eq!(bits.next_set_bit(0), Some(0));
        assert_eq!(bits.next_set_bit(1), Some(63));
        assert_eq!(bits.next_set_bit(64), Some(64));
        assert_eq!(bits.next_set_bit(65), Some(200));
        assert_eq!(bits.next_set_bit(201), None);
        assert_eq!(bits.next_set_bit(10_000), None);
    }

    #[test]
    fn previous_set_bit_across_words() {
        let mut bits = Bitset::new();
        assert_eq!(bits.previous_set_bit(10), None);

        bits.set(2, true);
        bits.set(64, true);
        bits.set(130, true);

        assert_eq!(bits.previous_set_bit(10_000), Some(130));
        assert_eq!(bits.previous_set_bit(130), Some(130));
        assert_eq!(bits.previous_set_bit(129), Some(64));
        assert_eq!(bits.previous_set_bit(63), Some(2));
        assert_eq!(bits.previous_set_bit(1), None);
    }

    #[test]
    fn next_clear_bit_skips_full_words() {
        let mut bits = Bitset::new();
        assert_eq!(bits.next_clear_bit(7), 7);

        for i in 0..70 {
            bits.set(i, true);
        }
        assert_eq!(bits.next_clear_bit(0), 70);

        bits.clear(12);
        assert_eq!(bits.next_clear_bit(0), 12);
        assert_eq!(bits.next_clear_bit(13), 70);

        for i in 70..128 {
            bits.set(i, true);
        }
        // Storage is exhausted, the first bit past it is clear.
        assert_eq!(bits.next_clear_bit(13), 128);
    }

    #[test]
    fn iter_ones_matches_count() {
        let mut bits = Bitset::new();
        for i in [1, 5, 64, 65, 300] {
            bits.set(i, true);
        }

        let ones: Vec<usize> = bits.iter_ones().collect();
        assert_eq!(ones, vec![1, 5, 64, 65, 300]);
        assert_eq!(bits.count_ones(), 5);
    }
}
