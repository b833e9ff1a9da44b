//! Record Start Bitmap - which page words begin an allocation record
//!
//! One bit per page word. A reference or free hint is only trusted when the
//! header offset it implies has its bit set.
//!
//! Bitmap Structure:
//! ```text
//! Page: 1,280,000 words
//! Granularity: 1 word per bit
//! Bitmap size: 1,280,000 / 64 = 20,000 u64 words
//!
//! Record header at word offset 130:
//! - Word index: 130 / 64 = 2
//! - Bit index: 130 % 64 = 2
//! ```

/// RecordStartBitmap - record boundaries of one page
#[derive(Debug, Clone)]
pub struct RecordStartBitmap {
    bits: Vec<u64>,
    len: usize,
}

impl RecordStartBitmap {
    /// Create an empty bitmap covering `len` words
    pub fn new(len: usize) -> Self {
        Self {
            bits: vec![0; len.div_ceil(64)],
            len,
        }
    }

    #[inline]
    fn indices(offset: usize) -> (usize, u32) {
        (offset / 64, (offset % 64) as u32)
    }

    pub fn set(&mut self, offset: usize) {
        if offset < self.len {
            let (word, bit) = Self::indices(offset);
            self.bits[word] |= 1 << bit;
        }
    }

    pub fn clear(&mut self, offset: usize) {
        if offset < self.len {
            let (word, bit) = Self::indices(offset);
            self.bits[word] &= !(1 << bit);
        }
    }

    /// Check if a record starts at `offset`
    pub fn is_set(&self, offset: usize) -> bool {
        if offset >= self.len {
            return false;
        }
        let (word, bit) = Self::indices(offset);
        self.bits[word] & (1 << bit) != 0
    }

    /// Number of record starts
    pub fn count(&self) -> usize {
        self.bits.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Words covered by the bitmap
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_clear() {
        let mut bitmap = RecordStartBitmap::new(130);
        bitmap.set(0);
        bitmap.set(64);
        bitmap.set(129);

        assert!(bitmap.is_set(0));
        assert!(bitmap.is_set(64));
        assert!(bitmap.is_set(129));
        assert!(!bitmap.is_set(1));
        assert_eq!(bitmap.count(), 3);

        bitmap.clear(64);
        assert!(!bitmap.is_set(64));
        assert_eq!(bitmap.count(), 2);
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let mut bitmap = RecordStartBitmap::new(10);
        bitmap.set(10);
        assert!(!bitmap.is_set(10));
        assert!(!bitmap.is_set(usize::MAX));
        assert_eq!(bitmap.count(), 0);
    }
}
