//! Page Management - word buffers tiled by allocation records
//!
//! A HeapPage is a contiguous block of words. Allocation records (header +
//! data) tile it exactly: every word belongs to exactly one record and the
//! records follow each other without gaps.
//!
//! ```text
//! ┌────────┬──────────────┬────────┬──────┬────────┬─────────────────┐
//! │ header │ data (live)  │ header │ data │ header │ data (free)     │
//! └────────┴──────────────┴────────┴──────┴────────┴─────────────────┘
//!  0                                                          usable_words
//! ```
//!
//! Placement runs in place: a free record is split when it is more than one
//! header larger than the request, used as-is otherwise, and runs of
//! adjacent free records are merged on demand.

use crate::error::{GcError, Result};
use crate::heap::bitmap::RecordStartBitmap;
use crate::object::header::{self, Colour, RecordHeader, HEADER_WORDS};

/// Outcome of trying to place a request at one free record
enum Probe {
    /// Record header offset and the follow-up free hint
    Placed(usize, Option<usize>),
    /// A live record (or the page end) stopped the merge
    Blocked(Option<usize>),
}

/// HeapPage - one link of a thread's page chain
pub struct HeapPage {
    /// Record words
    words: Box<[usize]>,

    /// Record boundaries
    starts: RecordStartBitmap,

    /// Next page in the chain (page slot)
    next: Option<usize>,

    /// May name a free record, biased toward the page tail
    last_free_hint: Option<usize>,

    /// May name a free record, set by the most recent manual free
    middle_free_hint: Option<usize>,

    /// Carved for one oversized object, excluded from generic search
    single_purpose: bool,

    /// Epoch stain; live this cycle iff equal to the epoch colour
    colour: Colour,

    /// Words claimed by free records, headers included
    free_words: usize,

    /// Smallest request a full scan failed on since free records last changed
    failed_request: Option<usize>,
}

impl HeapPage {
    /// Create a page holding one free record that spans it
    ///
    /// # Errors
    /// `OutOfMemory` when the backing buffer cannot be reserved.
    pub fn new(usable_words: usize, single_purpose: bool, colour: Colour) -> Result<Self> {
        if usable_words < HEADER_WORDS {
            return Err(GcError::Internal(format!(
                "page of {} words cannot hold a record header",
                usable_words
            )));
        }

        let mut buffer: Vec<usize> = Vec::new();
        buffer
            .try_reserve_exact(usable_words)
            .map_err(|_| GcError::OutOfMemory {
                requested_words: usable_words,
            })?;
        buffer.resize(usable_words, 0);

        let mut words = buffer.into_boxed_slice();
        RecordHeader::free(usable_words - HEADER_WORDS, colour).write(&mut words, 0);

        let mut starts = RecordStartBitmap::new(usable_words);
        starts.set(0);

        Ok(Self {
            words,
            starts,
            next: None,
            last_free_hint: Some(0),
            middle_free_hint: None,
            single_purpose,
            colour,
            free_words: usable_words,
            failed_request: None,
        })
    }

    pub fn usable_words(&self) -> usize {
        self.words.len()
    }

    pub fn next(&self) -> Option<usize> {
        self.next
    }

    pub fn set_next(&mut self, next: Option<usize>) {
        self.next = next;
    }

    pub fn is_single_purpose(&self) -> bool {
        self.single_purpose
    }

    pub fn colour(&self) -> Colour {
        self.colour
    }

    pub fn set_colour(&mut self, colour: Colour) {
        self.colour = colour;
    }

    /// Words held by free records, headers included
    pub fn free_words(&self) -> usize {
        self.free_words
    }

    pub fn last_free_hint(&self) -> Option<usize> {
        self.last_free_hint
    }

    pub fn middle_free_hint(&self) -> Option<usize> {
        self.middle_free_hint
    }

    /// Check if a record header starts at `offset`
    #[inline]
    pub fn is_record_start(&self, offset: usize) -> bool {
        self.starts.is_set(offset)
    }

    /// Header at a record start
    ///
    /// Caller checks `is_record_start(offset)` first.
    #[inline]
    pub fn header(&self, offset: usize) -> RecordHeader {
        RecordHeader::read(&self.words, offset)
    }

    /// Header at `offset` if a record starts there
    pub fn record(&self, offset: usize) -> Option<RecordHeader> {
        self.is_record_start(offset).then(|| self.header(offset))
    }

    /// Data words of the record at `offset`
    pub fn data(&self, offset: usize) -> &[usize] {
        let usable = self.header(offset).usable_words;
        let start = offset + HEADER_WORDS;
        &self.words[start..start + usable]
    }

    /// Mutable data words of the record at `offset`
    pub fn data_mut(&mut self, offset: usize) -> &mut [usize] {
        let usable = self.header(offset).usable_words;
        let start = offset + HEADER_WORDS;
        &mut self.words[start..start + usable]
    }

    /// Colour of the record at `offset`
    #[inline]
    pub fn record_colour(&self, offset: usize) -> Colour {
        header::colour_at(&self.words, offset)
    }

    /// Stain the record at `offset` and, with it, the page
    #[inline]
    pub fn stain(&mut self, offset: usize, colour: Colour) {
        header::set_colour(&mut self.words, offset, colour);
        self.colour = colour;
    }

    /// Offset of the record after the one at `offset`
    pub fn next_record(&self, offset: usize) -> Option<usize> {
        let next = offset + self.header(offset).span();
        (next < self.words.len()).then_some(next)
    }

    /// Iterate over `(offset, header)` of every record in address order
    pub fn records(&self) -> Records<'_> {
        Records {
            page: self,
            offset: Some(0),
        }
    }

    /// Number of live (typed) records
    pub fn live_records(&self) -> usize {
        self.records().filter(|(_, h)| !h.is_free()).count()
    }

    /// Check the tiling invariant
    ///
    /// Records must cover the page exactly, every record must be flagged in
    /// the start bitmap and nothing else may be, and `free_words` must match.
    pub fn verify_tiling(&self) -> bool {
        let mut covered = 0;
        let mut count = 0;
        let mut free = 0;
        let mut offset = 0;

        while offset < self.words.len() {
            if !self.starts.is_set(offset) || offset + HEADER_WORDS > self.words.len() {
                return false;
            }
            let header = self.header(offset);
            covered += header.span();
            count += 1;
            if header.is_free() {
                free += header.span();
            }
            offset += header.span();
        }

        covered == self.words.len() && count == self.starts.count() && free == self.free_words
    }

    /// Try to place a request of `required` words on this page
    ///
    /// Start points, in order: the middle hint (most recent manual free),
    /// the tail hint, the first record. Returns the header offset of the new
    /// record, whose data is zeroed and whose header carries `type_index` and
    /// `colour`.
    ///
    /// A miss after a full scan is remembered: requests at least that large
    /// are refused without scanning until a record is freed.
    pub fn try_allocate(
        &mut self,
        required: usize,
        type_index: usize,
        colour: Colour,
        allow_single_purpose: bool,
    ) -> Option<usize> {
        if self.single_purpose && !allow_single_purpose {
            return None;
        }

        if self.free_words < required + HEADER_WORDS {
            return None;
        }

        if self.failed_request.is_some_and(|failed| required >= failed) {
            return None;
        }

        if let Some(start) = self.middle_free_hint.filter(|&o| self.is_free_record(o)) {
            if let Some((offset, follow)) = self.scan_from(start, required, type_index, colour) {
                self.middle_free_hint = follow;
                return Some(offset);
            }
        }

        if let Some(start) = self.last_free_hint.filter(|&o| self.is_free_record(o)) {
            if let Some((offset, follow)) = self.scan_from(start, required, type_index, colour) {
                self.last_free_hint = follow;
                return Some(offset);
            }
        }

        let Some((offset, follow)) = self.scan_from(0, required, type_index, colour) else {
            self.failed_request = Some(required);
            return None;
        };
        if self.last_free_hint.map_or(true, |o| !self.is_free_record(o)) {
            self.last_free_hint = follow;
        } else {
            self.middle_free_hint = follow;
        }
        Some(offset)
    }

    /// Mark the record at `offset` free
    ///
    /// Returns false (and changes nothing) for a non-record offset or an
    /// already-free record. The record becomes the middle hint; merging with
    /// its neighbours waits for the next placement that needs it.
    pub fn free_record(&mut self, offset: usize) -> bool {
        let Some(mut header) = self.record(offset) else {
            return false;
        };
        if header.is_free() {
            return false;
        }

        header.type_index = None;
        header.write(&mut self.words, offset);
        self.free_words += header.span();
        self.middle_free_hint = Some(offset);
        self.failed_request = None;
        true
    }

    fn is_free_record(&self, offset: usize) -> bool {
        self.record(offset).is_some_and(|h| h.is_free())
    }

    /// Scan forward from `start`, skipping live records
    fn scan_from(
        &mut self,
        start: usize,
        required: usize,
        type_index: usize,
        colour: Colour,
    ) -> Option<(usize, Option<usize>)> {
        let mut offset = start;
        loop {
            if self.header(offset).is_free() {
                match self.place_at(offset, required, type_index, colour) {
                    Probe::Placed(at, follow) => return Some((at, follow)),
                    Probe::Blocked(Some(live)) => offset = live,
                    Probe::Blocked(None) => return None,
                }
            }
            offset = self.next_record(offset)?;
        }
    }

    /// Place at the free record `offset`, merging forward if needed
    fn place_at(
        &mut self,
        offset: usize,
        required: usize,
        type_index: usize,
        colour: Colour,
    ) -> Probe {
        let first = self.header(offset);
        let mut total = first.usable_words;
        let mut end = offset + first.span();

        while total < required {
            if end >= self.words.len() {
                return Probe::Blocked(None);
            }
            let next = self.header(end);
            if !next.is_free() {
                return Probe::Blocked(Some(end));
            }
            total += next.span();
            end += next.span();
        }

        // fold the probed records into the first one
        let mut absorbed = offset + first.span();
        while absorbed < end {
            let span = self.header(absorbed).span();
            self.starts.clear(absorbed);
            absorbed += span;
        }

        let merged_span = end - offset;
        let excess = total - required;
        let (usable, follow) = if excess > HEADER_WORDS {
            let remainder = offset + HEADER_WORDS + required;
            RecordHeader::free(excess - HEADER_WORDS, colour).write(&mut self.words, remainder);
            self.starts.set(remainder);
            self.free_words -= merged_span - excess;
            (required, Some(remainder))
        } else {
            self.free_words -= merged_span;
            let follow = (end < self.words.len() && self.header(end).is_free()).then_some(end);
            (total, follow)
        };

        RecordHeader {
            type_index: Some(type_index),
            colour,
            usable_words: usable,
        }
        .write(&mut self.words, offset);

        let data = offset + HEADER_WORDS;
        self.words[data..data + usable].fill(0);
        self.colour = colour;

        Probe::Placed(offset, follow)
    }
}

/// Iterator over the records of a page
pub struct Records<'a> {
    page: &'a HeapPage,
    offset: Option<usize>,
}

impl<'a> Iterator for Records<'a> {
    type Item = (usize, RecordHeader);

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.offset?;
        if offset >= self.page.words.len() {
            self.offset = None;
            return None;
        }
        let header = self.page.header(offset);
        self.offset = self.page.next_record(offset);
        Some((offset, header))
    }
}
