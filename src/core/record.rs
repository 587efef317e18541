// Splits a decompressed deck document into its index list and card table.
use bstr::ByteSlice;

use crate::core::error::DecodeError;
use crate::core::format::{
    EMPTY_LIST, ENTRY_SEPARATOR, FIELD_SEPARATOR, INDEX_SEPARATOR, SECTION_SEPARATOR,
};

/// Borrowed halves of a decompressed document.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DeckBody<'a> {
    pub indices: &'a [u8],
    pub table: &'a [u8],
}

impl<'a> DeckBody<'a> {
    pub fn split(document: &'a [u8]) -> Result<Self, DecodeError> {
        let at = document
            .find(SECTION_SEPARATOR)
            .ok_or_else(|| DecodeError::malformed("missing `;;;` index/table separator"))?;
        Ok(Self {
            indices: &document[..at],
            table: &document[at + SECTION_SEPARATOR.len()..],
        })
    }

    pub fn indices(&self) -> Result<Vec<i64>, DecodeError> {
        parse_indices(self.indices)
    }

    /// Display names borrow from the document; they cannot outlive it.
    pub fn names(&self) -> Vec<&'a [u8]> {
        parse_names(self.table)
    }
}

pub fn parse_indices(text: &[u8]) -> Result<Vec<i64>, DecodeError> {
    delimited(text, INDEX_SEPARATOR)
        .enumerate()
        .map(|(position, field)| {
            field
                .to_str()
                .ok()
                .and_then(|digits| digits.parse::<i64>().ok())
                .ok_or_else(|| DecodeError::InvalidIndex {
                    field: field.to_str_lossy().into_owned(),
                    position,
                })
        })
        .collect()
}

pub fn parse_names(text: &[u8]) -> Vec<&[u8]> {
    delimited(text, ENTRY_SEPARATOR).map(entry_name).collect()
}

/// First `;`-delimited field of a table entry; the rest is opaque metadata.
pub fn entry_name(entry: &[u8]) -> &[u8] {
    match entry.find_byte(FIELD_SEPARATOR) {
        Some(end) => &entry[..end],
        None => entry,
    }
}

// Empty text and `-` mean an empty list; a single trailing delimiter adds no field.
fn delimited<'a>(text: &'a [u8], delim: &'a str) -> impl Iterator<Item = &'a [u8]> + 'a {
    let fields = if text.is_empty() || text == EMPTY_LIST.as_bytes() {
        None
    } else {
        Some(
            text.strip_suffix(delim.as_bytes())
                .unwrap_or(text)
                .split_str(delim),
        )
    };
    fields.into_iter().flatten()
}
