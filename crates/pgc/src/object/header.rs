//! Record Header - inline metadata in front of every allocation
//!
//! Record Header Layout (2 words):
//! ┌─────────────────────────────────────────┐
//! │           Tag Word (1 word)             │
//! │  - Bit 0: colour (GC epoch stain)       │
//! │  - Bits 1-63: type index + 1 (0 = free) │
//! ├─────────────────────────────────────────┤
//! │        Usable Words (1 word)            │
//! └─────────────────────────────────────────┘
//!
//! The data region follows the header directly. The owning page is never
//! stored: it is the page slot of the reference itself.

use serde::Serialize;

/// Size of a record header in words
pub const HEADER_WORDS: usize = 2;

/// Word offsets inside a header
pub const TAG_WORD: usize = 0;
pub const SIZE_WORD: usize = 1;

/// Colour bit position in the tag word
pub const COLOUR_MASK: usize = 1;
pub const TYPE_SHIFT: usize = 1;

/// GC epoch colour
///
/// One of two tokens flipped each collection cycle. A record or page is
/// alive this cycle iff its colour equals the current token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum Colour {
    Green = 0,
    Blue = 1,
}

impl Colour {
    /// The other colour
    #[inline]
    pub fn flipped(self) -> Self {
        match self {
            Colour::Green => Colour::Blue,
            Colour::Blue => Colour::Green,
        }
    }

    #[inline]
    pub fn bit(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn from_bit(bit: usize) -> Self {
        if bit & COLOUR_MASK == 0 {
            Colour::Green
        } else {
            Colour::Blue
        }
    }
}

/// Decoded record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Index into the owning heap's type table, `None` for a free record
    pub type_index: Option<usize>,
    /// Epoch stain
    pub colour: Colour,
    /// Payload capacity in words
    pub usable_words: usize,
}

impl RecordHeader {
    /// Header of a free record
    pub fn free(usable_words: usize, colour: Colour) -> Self {
        Self {
            type_index: None,
            colour,
            usable_words,
        }
    }

    /// Decode the header at `offset`
    ///
    /// Caller guarantees `offset + HEADER_WORDS <= words.len()`.
    #[inline]
    pub fn read(words: &[usize], offset: usize) -> Self {
        let tag = words[offset + TAG_WORD];
        Self {
            type_index: decode_type(tag),
            colour: Colour::from_bit(tag),
            usable_words: words[offset + SIZE_WORD],
        }
    }

    /// Encode this header at `offset`
    #[inline]
    pub fn write(&self, words: &mut [usize], offset: usize) {
        words[offset + TAG_WORD] = encode_tag(self.type_index, self.colour);
        words[offset + SIZE_WORD] = self.usable_words;
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.type_index.is_none()
    }

    /// Words claimed by the record, header included
    #[inline]
    pub fn span(&self) -> usize {
        HEADER_WORDS + self.usable_words
    }
}

/// Build a tag word
#[inline]
pub fn encode_tag(type_index: Option<usize>, colour: Colour) -> usize {
    let ty = type_index.map_or(0, |index| index + 1);
    (ty << TYPE_SHIFT) | colour.bit()
}

#[inline]
fn decode_type(tag: usize) -> Option<usize> {
    (tag >> TYPE_SHIFT).checked_sub(1)
}

/// Restain only the colour bit of the header at `offset`
#[inline]
pub fn set_colour(words: &mut [usize], offset: usize, colour: Colour) {
    let tag = &mut words[offset + TAG_WORD];
    *tag = (*tag & !COLOUR_MASK) | colour.bit();
}

/// Read only the colour bit of the header at `offset`
#[inline]
pub fn colour_at(words: &[usize], offset: usize) -> Colour {
    Colour::from_bit(words[offset + TAG_WORD])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_tag_is_colour_only() {
        assert_eq!(encode_tag(None, Colour::Green), 0);
        assert_eq!(encode_tag(None, Colour::Blue), 1);
        assert_eq!(encode_tag(Some(0), Colour::Green), 2);
    }

    #[test]
    fn test_header_read_write() {
        let mut words = vec![0usize; 8];
        let header = RecordHeader {
            type_index: Some(3),
            colour: Colour::Blue,
            usable_words: 6,
        };
        header.write(&mut words, 0);

        assert_eq!(RecordHeader::read(&words, 0), header);
        assert_eq!(header.span(), 8);
        assert!(!header.is_free());
    }

    #[test]
    fn test_set_colour_keeps_type() {
        let mut words = vec![0usize; 2];
        RecordHeader {
            type_index: Some(7),
            colour: Colour::Green,
            usable_words: 0,
        }
        .write(&mut words, 0);

        set_colour(&mut words, 0, Colour::Blue);

        let header = RecordHeader::read(&words, 0);
        assert_eq!(header.type_index, Some(7));
        assert_eq!(colour_at(&words, 0), Colour::Blue);
        assert_eq!(Colour::Blue.flipped(), Colour::Green);
    }
}
