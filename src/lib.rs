//! Purpose: Deck string codec shared by the `deckstring` CLI, server, and tests.
//! Exports: `core` (wire format, decompressor, splitter, tally, memoized deck), `api`.
//! Role: Library backing the binary; `api` is the stable surface.
//! Invariants: Core modules are pure apart from the deck's one-shot state.
pub mod api;
pub mod core;
