//! # Kaomado
//!
//! The portrait container. A table of contents of `entry_count` entries, each holding
//! `subentry_count` little-endian `i32` pointers, followed by the portraits the positive
//! pointers refer to: a 48 byte palette and an AT4PX container each.
//!
//! The number of entries isn't stored anywhere. It is inferred from the first non-null pointer,
//! which always points right past the table of contents.

pub mod folders;
pub mod reader;
pub mod writer;

use serde::Serialize;

use crate::error::KaoError;
use crate::graphics::Portrait;

pub use folders::{
    entry_folder_name, parse_leading_index, subentry_file_stem, DirectorySource, ExportOptions,
    FsDirectorySource, ImportReport, NameTable,
};
pub use writer::WriteOptions;

/// Size in bytes of one table of contents pointer.
pub const SUBENTRY_LEN: usize = 4;
/// Pointers per entry in Explorers of Sky.
pub const DEF_KAO_TOC_ENTRY_NB_PTR: usize = 40;
/// Entries in the Explorers of Sky table of contents.
pub const DEF_KAO_TOC_NB_ENTRIES: usize = 1155;
/// Fill value for the padding at the end of the file.
pub const COMMON_PADDING_BYTE: u8 = 0xAA;

/// Format parameters that the file itself doesn't describe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KaoLayout {
    pub entry_count: usize,
    pub subentry_count: usize,
}

impl Default for KaoLayout {
    fn default() -> Self {
        KaoLayout {
            entry_count: DEF_KAO_TOC_NB_ENTRIES,
            subentry_count: DEF_KAO_TOC_ENTRY_NB_PTR,
        }
    }
}

/// A raw table of contents pointer, as stored on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TocPointer {
    /// Offset of a portrait from the start of the file.
    Valid(u32),
    /// Null pointer, nothing was ever written before this slot.
    Empty,
    /// Negated end offset of the last portrait written before this empty slot.
    LegacyEmptyMarker(u32),
}

impl TocPointer {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => TocPointer::Empty,
            r if r > 0 => TocPointer::Valid(r as u32),
            r => TocPointer::LegacyEmptyMarker(r.unsigned_abs()),
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            TocPointer::Valid(offset) => offset as i32,
            TocPointer::Empty => 0,
            TocPointer::LegacyEmptyMarker(end) => (end as i32).wrapping_neg(),
        }
    }

    pub fn is_valid(self) -> bool {
        matches!(self, TocPointer::Valid(_))
    }
}

/// A table of contents slot in memory: either empty, or the index of a portrait in the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SubEntry {
    #[default]
    Empty,
    Resolved(usize),
}

impl SubEntry {
    /// Raw value reported for empty slots.
    pub const INVALID_SENTINEL: i32 = i32::MIN;

    pub fn is_valid(self) -> bool {
        matches!(self, SubEntry::Resolved(idx) if idx != ImageStore::RESERVED_SLOT)
    }

    pub fn index(self) -> Option<usize> {
        match self {
            SubEntry::Resolved(idx) if idx != ImageStore::RESERVED_SLOT => Some(idx),
            _ => None,
        }
    }

    /// Store index as a signed value, `INVALID_SENTINEL` when empty.
    pub fn raw(self) -> i32 {
        self.index()
            .and_then(|idx| i32::try_from(idx).ok())
            .unwrap_or(Self::INVALID_SENTINEL)
    }
}

/// One character's row in the table of contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TocEntry {
    subentries: Vec<SubEntry>,
}

impl TocEntry {
    pub fn new(subentry_count: usize) -> Self {
        TocEntry {
            subentries: vec![SubEntry::Empty; subentry_count],
        }
    }

    pub fn subentries(&self) -> &[SubEntry] {
        &self.subentries
    }

    pub fn get(&self, subentry: usize) -> Option<SubEntry> {
        self.subentries.get(subentry).copied()
    }

    pub fn has_portraits(&self) -> bool {
        self.subentries.iter().any(|s| s.is_valid())
    }
}

/// Append-only storage for decoded portraits.
///
/// Slot 0 always holds a blank placeholder and is never addressable, so that a resolved index
/// of 0 can't be mistaken for a real portrait.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageStore {
    images: Vec<Portrait>,
}

impl ImageStore {
    pub const RESERVED_SLOT: usize = 0;

    pub fn with_capacity(capacity: usize) -> Self {
        let mut images = Vec::with_capacity(capacity + 1);
        images.push(Portrait::blank());
        ImageStore { images }
    }

    /// Appends a portrait and returns its index.
    pub fn push(&mut self, portrait: Portrait) -> usize {
        self.images.push(portrait);
        self.images.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&Portrait> {
        if index == Self::RESERVED_SLOT {
            return None;
        }
        self.images.get(index)
    }

    /// Number of slots, the reserved one included.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// True when no real portrait was ever stored.
    pub fn is_empty(&self) -> bool {
        self.images.len() <= 1
    }
}

impl Default for ImageStore {
    fn default() -> Self {
        ImageStore::with_capacity(0)
    }
}

/// Summary counts for a container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct KaoStats {
    pub entries: usize,
    pub subentries_per_entry: usize,
    pub populated_entries: usize,
    pub portraits: usize,
}

/// A kaomado file in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Kaomado {
    subentry_count: usize,
    toc: Vec<TocEntry>,
    store: ImageStore,
}

impl Kaomado {
    /// An empty container with a fixed table of contents size.
    pub fn new(entry_count: usize, subentry_count: usize) -> Self {
        Kaomado {
            subentry_count,
            toc: vec![TocEntry::new(subentry_count); entry_count],
            store: ImageStore::with_capacity(entry_count * subentry_count),
        }
    }

    pub fn with_layout(layout: KaoLayout) -> Self {
        Self::new(layout.entry_count, layout.subentry_count)
    }

    pub fn entry_count(&self) -> usize {
        self.toc.len()
    }

    pub fn subentry_count(&self) -> usize {
        self.subentry_count
    }

    pub fn layout(&self) -> KaoLayout {
        KaoLayout {
            entry_count: self.entry_count(),
            subentry_count: self.subentry_count,
        }
    }

    pub fn toc(&self) -> &[TocEntry] {
        &self.toc
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    pub fn subentry(&self, entry: usize, subentry: usize) -> Option<SubEntry> {
        self.toc.get(entry)?.get(subentry)
    }

    /// The portrait at (`entry`, `subentry`), if that slot holds one.
    pub fn portrait(&self, entry: usize, subentry: usize) -> Option<&Portrait> {
        let index = self.subentry(entry, subentry)?.index()?;
        self.store.get(index)
    }

    /// Iterates over every populated slot in ascending (entry, sub-entry) order.
    pub fn portraits(&self) -> impl Iterator<Item = (usize, usize, &Portrait)> + '_ {
        self.toc.iter().enumerate().flat_map(move |(entry, toc_entry)| {
            toc_entry
                .subentries
                .iter()
                .enumerate()
                .filter_map(move |(subentry, slot)| {
                    let portrait = self.store.get(slot.index()?)?;
                    Some((entry, subentry, portrait))
                })
        })
    }

    /// Points a slot at an already stored portrait.
    pub fn register_toc_entry(
        &mut self,
        entry: usize,
        subentry: usize,
        store_index: usize,
    ) -> Result<(), KaoError> {
        let entries = self.entry_count();
        let subentries = self.subentry_count;
        let slot = self
            .toc
            .get_mut(entry)
            .and_then(|e| e.subentries.get_mut(subentry))
            .ok_or(KaoError::SlotOutOfRange {
                entry,
                subentry,
                entries,
                subentries,
            })?;

        *slot = if self.store.get(store_index).is_some() {
            SubEntry::Resolved(store_index)
        } else {
            SubEntry::Empty
        };
        Ok(())
    }

    /// Stores a portrait and points (`entry`, `subentry`) at it.
    pub fn insert_portrait(
        &mut self,
        entry: usize,
        subentry: usize,
        portrait: Portrait,
    ) -> Result<usize, KaoError> {
        if entry >= self.entry_count() || subentry >= self.subentry_count {
            return Err(KaoError::SlotOutOfRange {
                entry,
                subentry,
                entries: self.entry_count(),
                subentries: self.subentry_count,
            });
        }
        let index = self.store.push(portrait);
        self.register_toc_entry(entry, subentry, index)?;
        Ok(index)
    }

    /// Empties a slot. The portrait stays in the store, unreferenced.
    pub fn clear_subentry(&mut self, entry: usize, subentry: usize) {
        if let Some(slot) = self
            .toc
            .get_mut(entry)
            .and_then(|e| e.subentries.get_mut(subentry))
        {
            *slot = SubEntry::Empty;
        }
    }

    pub fn stats(&self) -> KaoStats {
        KaoStats {
            entries: self.entry_count(),
            subentries_per_entry: self.subentry_count,
            populated_entries: self.toc.iter().filter(|e| e.has_portraits()).count(),
            portraits: self.portraits().count(),
        }
    }

    fn toc_len_bytes(&self) -> usize {
        self.entry_count() * self.subentry_count * SUBENTRY_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toc_pointer_raw_conversion() {
        assert_eq!(TocPointer::from_raw(0), TocPointer::Empty);
        assert_eq!(TocPointer::from_raw(640), TocPointer::Valid(640));
        assert_eq!(TocPointer::from_raw(-500), TocPointer::LegacyEmptyMarker(500));
        assert_eq!(TocPointer::LegacyEmptyMarker(500).to_raw(), -500);
        assert_eq!(TocPointer::Valid(640).to_raw(), 640);
        assert!(!TocPointer::from_raw(i32::MIN).is_valid());
    }

    #[test]
    fn reserved_slot_is_never_addressable() {
        let mut kao = Kaomado::new(3, 2);
        assert!(kao.store().is_empty());
        assert_eq!(kao.store().get(ImageStore::RESERVED_SLOT), None);

        kao.register_toc_entry(1, 0, ImageStore::RESERVED_SLOT).unwrap();
        assert_eq!(kao.subentry(1, 0), Some(SubEntry::Empty));
        assert_eq!(SubEntry::Resolved(0).raw(), SubEntry::INVALID_SENTINEL);
        assert!(!SubEntry::Resolved(0).is_valid());
    }

    #[test]
    fn insert_and_iterate_in_order() {
        let mut kao = Kaomado::new(3, 2);
        let second = kao.insert_portrait(2, 1, Portrait::blank()).unwrap();
        let first = kao.insert_portrait(1, 0, Portrait::blank()).unwrap();
        assert_eq!((second, first), (1, 2));

        let coords: Vec<_> = kao.portraits().map(|(e, s, _)| (e, s)).collect();
        assert_eq!(coords, vec![(1, 0), (2, 1)]);
        assert_eq!(kao.subentry(2, 1), Some(SubEntry::Resolved(1)));

        let stats = kao.stats();
        assert_eq!(stats.populated_entries, 2);
        assert_eq!(stats.portraits, 2);

        kao.clear_subentry(2, 1);
        assert_eq!(kao.portrait(2, 1), None);
        assert_eq!(kao.stats().portraits, 1);
    }

    #[test]
    fn out_of_range_slot_is_rejected() {
        let mut kao = Kaomado::new(2, 2);
        assert!(matches!(
            kao.insert_portrait(2, 0, Portrait::blank()),
            Err(KaoError::SlotOutOfRange { entry: 2, .. })
        ));
        assert!(matches!(
            kao.insert_portrait(1, 2, Portrait::blank()),
            Err(KaoError::SlotOutOfRange { subentry: 2, .. })
        ));
        assert_eq!(kao.store().len(), 1);
    }
}
