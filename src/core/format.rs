//! Purpose: Centralize the deck string wire format constants.
//! Exports: separator constants, `PLACEHOLDER_ALPHABET`, `placeholder_symbol`.
//! Role: Shared by the decompressor and the record splitter.
//! Invariants: Values must match existing encoded documents byte for byte.
//! Invariants: Alphabet position is the dictionary index; symbols are distinct ASCII.

pub const PLACEHOLDER_ESCAPE: u8 = b'&';
pub const DICTIONARY_SEPARATOR: &str = "|";
pub const DOCUMENT_SEPARATOR: &str = "||";
pub const SECTION_SEPARATOR: &str = ";;;";
pub const ENTRY_SEPARATOR: &str = ";;";
pub const FIELD_SEPARATOR: u8 = b';';
pub const INDEX_SEPARATOR: &str = ",";
pub const EMPTY_LIST: &str = "-";

/// Substitution symbols in dictionary order. `u` and `U` are not part of the set.
pub const PLACEHOLDER_ALPHABET: &str =
    "0123456789abcdefghijklmnopqrstvwxyzABCDEFGHIJKLMNOPQRSTVWXYZ_`[]/^%?@><=-+*:;,.()#$!'{}~";

/// Largest dictionary that can still be addressed by placeholders.
pub const MAX_DICTIONARY_LEN: usize = PLACEHOLDER_ALPHABET.len();

pub fn placeholder_symbol(index: usize) -> Option<u8> {
    PLACEHOLDER_ALPHABET.as_bytes().get(index).copied()
}
