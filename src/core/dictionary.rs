// Dictionary substitution decompressor for encoded deck documents.
use bstr::ByteSlice;

use crate::core::error::DecodeError;
use crate::core::format::{
    DICTIONARY_SEPARATOR, DOCUMENT_SEPARATOR, MAX_DICTIONARY_LEN, PLACEHOLDER_ESCAPE,
    placeholder_symbol,
};

/// Recovers the flat document from `DICT||BODY`.
///
/// Words are substituted from the highest index down, so a word may reference
/// lower-indexed words and those placeholders are expanded by a later pass.
/// Placeholders for higher indices are never revisited and stay literal.
/// Bytes outside the wire syntax are copied through untouched; no text
/// encoding is assumed.
pub fn decompress(encoded: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let (dictionary, body) = split_document(encoded)?;
    Ok(expand(body, &dictionary))
}

pub fn split_document(encoded: &[u8]) -> Result<(Vec<&[u8]>, &[u8]), DecodeError> {
    let at = encoded
        .find(DOCUMENT_SEPARATOR)
        .ok_or_else(|| DecodeError::malformed("missing `||` document separator"))?;
    let dict_part = &encoded[..at];
    let body = &encoded[at + DOCUMENT_SEPARATOR.len()..];
    let dictionary: Vec<&[u8]> = dict_part.split_str(DICTIONARY_SEPARATOR).collect();
    if dictionary.len() > MAX_DICTIONARY_LEN {
        return Err(DecodeError::malformed(
            "dictionary has more words than placeholder symbols",
        ));
    }
    Ok((dictionary, body))
}

/// Runs one find-and-replace pass per dictionary word, highest index first.
/// A pass is skipped when its placeholder does not occur in the text.
pub fn expand(body: &[u8], dictionary: &[&[u8]]) -> Vec<u8> {
    let mut text = body.to_vec();
    for (index, word) in dictionary.iter().enumerate().rev() {
        let Some(symbol) = placeholder_symbol(index) else {
            continue;
        };
        let placeholder = [PLACEHOLDER_ESCAPE, symbol];
        if text.find(placeholder).is_some() {
            text = text.replace(placeholder, word);
        }
    }
    text
}
