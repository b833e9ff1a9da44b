//! Heap Diagnostics - dumps and summaries of one thread's heap
//!
//! Purely observational snapshots. Both forms serialize with serde and
//! print in a human-readable layout through `Display`.

use crate::heap::Heap;
use crate::object::{Colour, HEADER_WORDS};
use serde::Serialize;
use std::fmt;

/// One allocation record in a dump
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationDump {
    /// Header offset inside the page
    pub offset: usize,
    /// Type name, `None` for a free record
    pub type_name: Option<&'static str>,
    pub usable_words: usize,
    pub colour: Colour,
}

impl AllocationDump {
    pub fn is_free(&self) -> bool {
        self.type_name.is_none()
    }
}

/// One page in a dump
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageDump {
    pub slot: usize,
    pub usable_words: usize,
    pub free_words: usize,
    pub single_purpose: bool,
    pub colour: Colour,
    pub records: Vec<AllocationDump>,
}

/// Every page and record of a heap, in chain order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeapDump {
    pub pages: Vec<PageDump>,
}

impl HeapDump {
    /// Walk the chain; `type_name` maps a record's type index to a name
    pub fn capture<F>(heap: &Heap, type_name: F) -> Self
    where
        F: Fn(usize) -> Option<&'static str>,
    {
        let pages = heap
            .chain()
            .filter_map(|slot| heap.page(slot).map(|page| (slot, page)))
            .map(|(slot, page)| PageDump {
                slot,
                usable_words: page.usable_words(),
                free_words: page.free_words(),
                single_purpose: page.is_single_purpose(),
                colour: page.colour(),
                records: page
                    .records()
                    .map(|(offset, header)| AllocationDump {
                        offset,
                        type_name: header
                            .type_index
                            .map(|index| type_name(index).unwrap_or("<unknown>")),
                        usable_words: header.usable_words,
                        colour: header.colour,
                    })
                    .collect(),
            })
            .collect();

        Self { pages }
    }

    /// Live records across all pages
    pub fn live_records(&self) -> impl Iterator<Item = &AllocationDump> {
        self.pages
            .iter()
            .flat_map(|page| page.records.iter())
            .filter(|record| !record.is_free())
    }
}

impl fmt::Display for HeapDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Heap dump: {} page(s)", self.pages.len())?;
        for page in &self.pages {
            writeln!(
                f,
                "  page {} [{} words, {} free, {:?}{}]",
                page.slot,
                page.usable_words,
                page.free_words,
                page.colour,
                if page.single_purpose {
                    ", single-purpose"
                } else {
                    ""
                }
            )?;
            for record in &page.records {
                match record.type_name {
                    Some(name) => writeln!(
                        f,
                        "    @{:<8} {:<16} {:>8} words {:?}",
                        record.offset, name, record.usable_words, record.colour
                    )?,
                    None => writeln!(
                        f,
                        "    @{:<8} {:<16} {:>8} words",
                        record.offset, "<free>", record.usable_words
                    )?,
                }
            }
        }
        Ok(())
    }
}

/// Aggregate counts of a heap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeapSummary {
    pub pages: usize,
    pub single_purpose_pages: usize,
    pub live_allocations: usize,
    /// Payload words of live records
    pub live_words: usize,
    /// Words claimed by live records, headers included
    pub used_words: usize,
    /// Words across all pages
    pub total_words: usize,
}

impl HeapSummary {
    pub fn capture(heap: &Heap) -> Self {
        let mut summary = Self::default();
        for page in heap.chain().filter_map(|slot| heap.page(slot)) {
            summary.pages += 1;
            if page.is_single_purpose() {
                summary.single_purpose_pages += 1;
            }
            summary.total_words += page.usable_words();
            for (_, header) in page.records().filter(|(_, h)| !h.is_free()) {
                summary.live_allocations += 1;
                summary.live_words += header.usable_words;
                summary.used_words += header.usable_words + HEADER_WORDS;
            }
        }
        summary
    }

    /// Fraction of page words claimed by live records
    pub fn utilization(&self) -> f64 {
        if self.total_words == 0 {
            0.0
        } else {
            self.used_words as f64 / self.total_words as f64
        }
    }
}

impl fmt::Display for HeapSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} page(s) ({} single-purpose), {} live allocation(s), {} live words, {}/{} words used ({:.1}%)",
            self.pages,
            self.single_purpose_pages,
            self.live_allocations,
            self.live_words,
            self.used_words,
            self.total_words,
            self.utilization() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(index: usize) -> Option<&'static str> {
        ["Node", "Leaf"].get(index).copied()
    }

    #[test]
    fn test_dump_lists_records_in_order() {
        let mut heap = Heap::new(32, Colour::Green).unwrap();
        heap.allocate(4, 0, Colour::Green).unwrap();
        heap.allocate(2, 1, Colour::Green).unwrap();

        let dump = HeapDump::capture(&heap, names);
        assert_eq!(dump.pages.len(), 1);

        let records = &dump.pages[0].records;
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].type_name, Some("Node"));
        assert_eq!(records[1].type_name, Some("Leaf"));
        assert!(records[2].is_free());
        assert_eq!(dump.live_records().count(), 2);

        let text = dump.to_string();
        assert!(text.contains("Node"));
        assert!(text.contains("<free>"));
    }

    #[test]
    fn test_summary_counts_live_words() {
        let mut heap = Heap::new(32, Colour::Green).unwrap();
        heap.allocate(4, 0, Colour::Green).unwrap();
        heap.allocate(40, 0, Colour::Green).unwrap();

        let summary = HeapSummary::capture(&heap);
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.single_purpose_pages, 1);
        assert_eq!(summary.live_allocations, 2);
        assert_eq!(summary.live_words, 44);
        assert_eq!(summary.used_words, 44 + 2 * HEADER_WORDS);
        assert_eq!(summary.total_words, 32 + 40 + HEADER_WORDS);
    }

    #[test]
    fn test_summary_serializes() {
        let heap = Heap::new(16, Colour::Green).unwrap();
        let json = serde_json::to_value(HeapSummary::capture(&heap)).unwrap();
        assert_eq!(json["pages"], 1);
        assert_eq!(json["live_allocations"], 0);
    }
}
