//! Object Module - object model of the page heap
//!
//! This module defines how objects are described (`Type`), addressed
//! (`ObjectRef`) and laid out (`header`).

pub mod header;

pub use header::{Colour, RecordHeader, HEADER_WORDS};

use serde::Serialize;
use std::fmt;
use std::num::NonZeroUsize;

/// Bytes per heap word
pub const WORD_BYTES: usize = std::mem::size_of::<usize>();

/// Low bits of a reference holding the data offset
pub const OFFSET_BITS: u32 = 40;

/// Largest page, in words, a reference can address
pub const MAX_PAGE_WORDS: usize = 1 << OFFSET_BITS;

/// Number of page slots a reference can address
pub const MAX_PAGE_SLOTS: usize = 1 << (usize::BITS - OFFSET_BITS);

const OFFSET_MASK: usize = MAX_PAGE_WORDS - 1;

/// Number of words needed to hold `bytes`
pub const fn words_for_bytes(bytes: usize) -> usize {
    bytes.div_ceil(WORD_BYTES)
}

/// Type descriptor - static metadata shared by every object of a kind
///
/// The collector traces exactly the first `pointers_count` payload words,
/// so object layouts put every heap reference at the front.
///
/// # Examples
///
/// ```rust
/// use pgc::Type;
///
/// // next pointer + value
/// static NODE: Type = Type::new("Node", 2, 1);
/// assert_eq!(NODE.required_words(), 2);
/// ```
#[derive(Debug)]
pub struct Type {
    name: &'static str,
    required_words: usize,
    pointers_count: usize,
}

impl Type {
    /// Create a type descriptor
    ///
    /// Panics (at compile time in a `static`) when `pointers_count`
    /// exceeds `required_words`.
    pub const fn new(name: &'static str, required_words: usize, pointers_count: usize) -> Self {
        assert!(
            pointers_count <= required_words,
            "pointers_count must not exceed required_words"
        );
        Self {
            name,
            required_words,
            pointers_count,
        }
    }

    /// Descriptor sized for `T`, rounded up to whole words
    pub const fn of<T>(name: &'static str, pointers_count: usize) -> Self {
        Self::new(name, words_for_bytes(std::mem::size_of::<T>()), pointers_count)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Payload size in words
    pub fn required_words(&self) -> usize {
        self.required_words
    }

    /// Leading payload words that are heap references
    pub fn pointers_count(&self) -> usize {
        self.pointers_count
    }
}

/// Reference to an allocation record
///
/// Encodes the page slot in the upper bits and the word offset of the data
/// region in the lower `OFFSET_BITS`. A data region never starts at offset
/// zero, so the encoding is never zero and `0` stays free to mean null in
/// root slots and pointer fields.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "usize")]
pub struct ObjectRef(NonZeroUsize);

impl ObjectRef {
    /// Build a reference; `data_offset` is always past a header
    pub(crate) fn new(page_slot: usize, data_offset: usize) -> Self {
        debug_assert!(data_offset >= HEADER_WORDS);
        debug_assert!(data_offset <= OFFSET_MASK);
        debug_assert!(page_slot < MAX_PAGE_SLOTS);
        let word = (page_slot << OFFSET_BITS) | data_offset;
        match NonZeroUsize::new(word) {
            Some(raw) => Self(raw),
            None => unreachable!("data offset is never zero"),
        }
    }

    /// Interpret a root slot or pointer field; `0` is null
    #[inline]
    pub fn from_word(word: usize) -> Option<Self> {
        NonZeroUsize::new(word).map(Self)
    }

    /// Raw word for storing in a root slot or pointer field
    #[inline]
    pub fn to_word(self) -> usize {
        self.0.get()
    }

    #[inline]
    pub fn page_slot(self) -> usize {
        self.0.get() >> OFFSET_BITS
    }

    #[inline]
    pub fn data_offset(self) -> usize {
        self.0.get() & OFFSET_MASK
    }

    /// Offset of the record header, if the data offset leaves room for one
    #[inline]
    pub fn header_offset(self) -> Option<usize> {
        self.data_offset().checked_sub(HEADER_WORDS)
    }
}

/// Word form of an optional reference
#[inline]
pub fn word_of(reference: Option<ObjectRef>) -> usize {
    reference.map_or(0, ObjectRef::to_word)
}

impl From<ObjectRef> for usize {
    fn from(reference: ObjectRef) -> usize {
        reference.to_word()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({}:{})", self.page_slot(), self.data_offset())
    }
}
