use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    NotFound,
    Busy,
    Corrupt,
    Io,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    deck: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            deck: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn deck(&self) -> Option<&str> {
        self.deck.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_deck(mut self, deck: impl Into<String>) -> Self {
        self.deck = Some(deck.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(deck) = &self.deck {
            write!(f, " (deck: {deck})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

/// Failure of a single decode attempt.
///
/// Cloneable so a deck can hand the same frozen outcome to every reader.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DecodeError {
    /// A required separator is missing or the dictionary cannot be addressed.
    MalformedDocument { reason: &'static str },
    /// A field of the index list is not an integer.
    InvalidIndex { field: String, position: usize },
    /// An index does not address an entry of the card table.
    IndexOutOfRange { index: i64, table_len: usize },
    /// The decoding thread unwound before it stored an outcome.
    Aborted,
}

impl DecodeError {
    pub(crate) fn malformed(reason: &'static str) -> Self {
        DecodeError::MalformedDocument { reason }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DecodeError::MalformedDocument { .. } => "malformed-document",
            DecodeError::InvalidIndex { .. } => "invalid-index",
            DecodeError::IndexOutOfRange { .. } => "index-out-of-range",
            DecodeError::Aborted => "decode-aborted",
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::MalformedDocument { reason } => write!(f, "malformed deck: {reason}"),
            DecodeError::InvalidIndex { field, position } => {
                write!(f, "invalid card index {field:?} at position {position}")
            }
            DecodeError::IndexOutOfRange { index, table_len } => write!(
                f,
                "card index {index} out of bounds for table of {table_len} cards"
            ),
            DecodeError::Aborted => f.write_str("deck decode aborted before completion"),
        }
    }
}

impl StdError for DecodeError {}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        let kind = match err {
            DecodeError::Aborted => ErrorKind::Internal,
            _ => ErrorKind::Corrupt,
        };
        Error::new(kind)
            .with_message(err.to_string())
            .with_source(err)
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::Busy => 5,
        ErrorKind::Corrupt => 7,
        ErrorKind::Io => 8,
    }
}

#[cfg(test)]
mod tests {
    use super::{DecodeError, Error, ErrorKind, to_exit_code};

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (ErrorKind::Internal, 1),
            (ErrorKind::Usage, 2),
            (ErrorKind::NotFound, 3),
            (ErrorKind::Busy, 5),
            (ErrorKind::Corrupt, 7),
            (ErrorKind::Io, 8),
        ];

        for (kind, code) in cases {
            assert_eq!(to_exit_code(kind), code);
        }
    }

    #[test]
    fn decode_errors_convert_to_corrupt() {
        let err: Error = DecodeError::IndexOutOfRange {
            index: 3,
            table_len: 3,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
        assert_eq!(
            err.message(),
            Some("card index 3 out of bounds for table of 3 cards")
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn aborted_decode_is_internal() {
        let err: Error = DecodeError::Aborted.into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(to_exit_code(err.kind()), 1);
    }

    #[test]
    fn display_includes_deck_name() {
        let err = Error::new(ErrorKind::NotFound)
            .with_message("deck not found")
            .with_deck("ironclad");
        assert_eq!(err.to_string(), "NotFound: deck not found (deck: ironclad)");
    }
}
