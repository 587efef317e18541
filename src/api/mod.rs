//! Purpose: Define the stable public Rust API boundary for deckstring.
//! Exports: Deck decoding types, the deck registry, and error types.
//! Role: Public, additive-only surface used by the CLI and server.
//! Invariants: Callers go through `Deck`/`DeckRegistry`; pipeline stages stay in `core`.

mod registry;

pub use crate::core::deck::{Deck, decode_report};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{DecodeError, Error, ErrorKind};
pub use crate::core::tally::ASCENDERS_BANE;
pub use registry::{DECK_FILE_EXTENSION, DeckRegistry};
