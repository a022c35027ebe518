//! Interned string storage.
//!
//! Thread names, sync-object names, annotation messages and I/O descriptors
//! are stored once and referenced everywhere else by [`StringOffset`], the
//! byte position of the entry inside the table.
//!
//! ```text
//! offset 0        offset 4+len(a)
//! ┌─────┬───────┬─────┬───────┬──
//! │ len │ a ... │ len │ b ... │ ...
//! └─────┴───────┴─────┴───────┴──
//!   u32           u32
//! ```
//!
//! [`StringTableBuilder`] is the append-only side used while capturing;
//! [`StringTable`] is the frozen, bounds-checked side used after decode.

use std::collections::HashMap;

use tview_common::STRING_LEN_PREFIX;

use crate::domain::{FormatError, StringOffset};

/// Append-only string table with deduplication.
#[derive(Debug, Default)]
pub struct StringTableBuilder {
    bytes: Vec<u8>,
    index: HashMap<String, StringOffset>,
}

impl StringTableBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `text` once and return its offset.
    ///
    /// Interning identical content again returns the offset of the first copy.
    pub fn intern(&mut self, text: &str) -> Result<StringOffset, FormatError> {
        if let Some(&offset) = self.index.get(text) {
            return Ok(offset);
        }

        let offset = u32::try_from(self.bytes.len()).map_err(|_| FormatError::TooLarge("string table"))?;
        let len = u32::try_from(text.len()).map_err(|_| FormatError::TooLarge("string entry"))?;
        if u32::try_from(self.bytes.len() + STRING_LEN_PREFIX + text.len()).is_err() {
            return Err(FormatError::TooLarge("string table"));
        }

        self.bytes.extend_from_slice(&len.to_le_bytes());
        self.bytes.extend_from_slice(text.as_bytes());

        let offset = StringOffset(offset);
        self.index.insert(text.to_owned(), offset);
        Ok(offset)
    }

    /// Current table size in bytes
    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Number of distinct strings stored
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Freeze the table. No further interning is possible.
    #[must_use]
    pub fn finish(self) -> StringTable {
        let mut entries: Vec<u32> = self.index.into_values().map(|o| o.0).collect();
        entries.sort_unstable();
        StringTable { bytes: self.bytes, entries }
    }
}

/// Immutable string table with validated entry boundaries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringTable {
    bytes: Vec<u8>,
    /// Start offset of every entry, ascending
    entries: Vec<u32>,
}

impl StringTable {
    /// Parse a raw table, checking every entry is in bounds and valid UTF-8.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, FormatError> {
        let mut entries = Vec::new();
        let mut pos = 0usize;

        while pos < bytes.len() {
            let Some(prefix) = bytes.get(pos..pos + STRING_LEN_PREFIX) else {
                return Err(FormatError::malformed(format!(
                    "string table truncated inside length prefix at offset {pos}"
                )));
            };
            let len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
            let start = pos + STRING_LEN_PREFIX;
            let Some(text) = bytes.get(start..start + len) else {
                return Err(FormatError::malformed(format!(
                    "string entry at offset {pos} runs past the end of the table"
                )));
            };
            if std::str::from_utf8(text).is_err() {
                return Err(FormatError::malformed(format!("string entry at offset {pos} is not UTF-8")));
            }

            let offset = u32::try_from(pos).map_err(|_| FormatError::TooLarge("string table"))?;
            entries.push(offset);
            pos = start + len;
        }

        Ok(Self { bytes, entries })
    }

    /// Look up the text stored at `offset`.
    ///
    /// Fails with `MalformedTrace` unless `offset` is the start of an entry.
    pub fn resolve(&self, offset: StringOffset) -> Result<&str, FormatError> {
        if self.entries.binary_search(&offset.0).is_err() {
            return Err(FormatError::malformed(format!(
                "string offset {offset} does not point at a table entry (table is {} bytes)",
                self.bytes.len()
            )));
        }

        let pos = offset.0 as usize;
        let prefix = &self.bytes[pos..pos + STRING_LEN_PREFIX];
        let len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        let start = pos + STRING_LEN_PREFIX;
        std::str::from_utf8(&self.bytes[start..start + len])
            .map_err(|_| FormatError::malformed(format!("string entry {offset} is not UTF-8")))
    }

    #[must_use]
    pub fn contains(&self, offset: StringOffset) -> bool {
        self.entries.binary_search(&offset.0).is_ok()
    }

    /// Raw encoded bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Encoded size in bytes
    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in table order
    pub fn iter(&self) -> impl Iterator<Item = (StringOffset, &str)> + '_ {
        self.entries
            .iter()
            .filter_map(|&o| self.resolve(StringOffset(o)).ok().map(|s| (StringOffset(o), s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_idempotent() {
        let mut builder = StringTableBuilder::new();
        let a = builder.intern("mutexA").unwrap();
        let b = builder.intern("worker-1").unwrap();
        let again = builder.intern("mutexA").unwrap();

        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_eq!(builder.len(), 2);
        assert_eq!(builder.size(), 4 + 6 + 4 + 8);
    }

    #[test]
    fn test_resolve_round_trips_including_empty() {
        let mut builder = StringTableBuilder::new();
        let inputs = ["", "render-lock", "read /etc/hosts", "ünïcödé"];
        let offsets: Vec<_> = inputs.iter().map(|s| builder.intern(s).unwrap()).collect();
        let table = builder.finish();

        for (text, offset) in inputs.iter().zip(&offsets) {
            assert_eq!(table.resolve(*offset).unwrap(), *text);
        }
        assert_eq!(table.len(), inputs.len());
    }

    #[test]
    fn test_resolve_rejects_offsets_inside_or_past_entries() {
        let mut builder = StringTableBuilder::new();
        builder.intern("abc").unwrap();
        let table = builder.finish();

        assert!(matches!(table.resolve(StringOffset(2)), Err(FormatError::MalformedTrace { .. })));
        assert!(matches!(table.resolve(StringOffset(500)), Err(FormatError::MalformedTrace { .. })));
    }

    #[test]
    fn test_from_bytes_matches_builder_output() {
        let mut builder = StringTableBuilder::new();
        builder.intern("one").unwrap();
        builder.intern("").unwrap();
        builder.intern("three").unwrap();
        let built = builder.finish();

        let parsed = StringTable::from_bytes(built.as_bytes().to_vec()).unwrap();
        assert_eq!(parsed, built);
        let texts: Vec<&str> = parsed.iter().map(|(_, s)| s).collect();
        assert_eq!(texts, vec!["one", "", "three"]);
    }

    #[test]
    fn test_from_bytes_rejects_truncated_entry() {
        let mut bytes = 10u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"short");
        assert!(matches!(StringTable::from_bytes(bytes), Err(FormatError::MalformedTrace { .. })));

        // Dangling half of a length prefix
        assert!(StringTable::from_bytes(vec![1, 0]).is_err());
    }

    #[test]
    fn test_from_bytes_rejects_invalid_utf8() {
        let mut bytes = 2u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        assert!(StringTable::from_bytes(bytes).is_err());
    }
}
