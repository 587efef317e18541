//! Purpose: Map deck names to memoized decks for lookup by the CLI and server.
//! Exports: `DeckRegistry`, `DECK_FILE_EXTENSION`.
//! Role: Concurrent name → `Deck` table; the only writer path is `insert`/`remove`.
//! Invariants: Names are case-insensitive (stored lowercased).
//! Invariants: Re-inserting a name installs a fresh, undecoded deck; readers holding
//! the previous `Arc<Deck>` keep its frozen outcome.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use bytes::Bytes;

use crate::core::deck::Deck;
use crate::core::error::{Error, ErrorKind};

pub const DECK_FILE_EXTENSION: &str = "deck";

#[derive(Debug, Default)]
pub struct DeckRegistry {
    decks: RwLock<HashMap<String, Arc<Deck>>>,
}

impl DeckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: &str, raw: impl Into<Bytes>) -> Arc<Deck> {
        let deck = Arc::new(Deck::new(raw));
        self.write()
            .insert(normalize_name(name), Arc::clone(&deck));
        deck
    }

    pub fn get(&self, name: &str) -> Option<Arc<Deck>> {
        self.read().get(&normalize_name(name)).cloned()
    }

    pub fn remove(&self, name: &str) -> bool {
        self.write().remove(&normalize_name(name)).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Rendered report for `name`, decoding it on first request.
    pub fn report(&self, name: &str) -> Result<Bytes, Error> {
        let deck = self.lookup(name)?;
        deck.resolve()
            .map_err(|err| Error::from(err).with_deck(normalize_name(name)))
    }

    /// Like `report`, but fails with `Busy` when another request's decode
    /// does not settle within `wait`.
    pub fn report_timeout(&self, name: &str, wait: Duration) -> Result<Bytes, Error> {
        let deck = self.lookup(name)?;
        match deck.resolve_timeout(wait) {
            Some(outcome) => {
                outcome.map_err(|err| Error::from(err).with_deck(normalize_name(name)))
            }
            None => Err(Error::new(ErrorKind::Busy)
                .with_message("deck is still being decoded")
                .with_deck(normalize_name(name))
                .with_hint("Retry the request shortly.")),
        }
    }

    /// Registers every `*.deck` file in `dir`, named by file stem. Returns the count.
    pub fn load_dir(&self, dir: &Path) -> Result<usize, Error> {
        let entries = fs::read_dir(dir).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("failed to read deck directory {}", dir.display()))
                .with_hint("Check that --deck-dir points at an existing directory.")
                .with_source(err)
        })?;

        let mut loaded = 0;
        for entry in entries {
            let path = entry
                .map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to list deck directory")
                        .with_source(err)
                })?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(DECK_FILE_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let raw = fs::read(&path).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message(format!("failed to read deck file {}", path.display()))
                    .with_deck(name)
                    .with_source(err)
            })?;
            self.insert(name, raw.trim_ascii_end().to_vec());
            tracing::debug!(deck = name, "registered deck from file");
            loaded += 1;
        }
        Ok(loaded)
    }

    fn lookup(&self, name: &str) -> Result<Arc<Deck>, Error> {
        self.get(name).ok_or_else(|| {
            Error::new(ErrorKind::NotFound)
                .with_message("deck not found")
                .with_deck(normalize_name(name))
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Deck>>> {
        self.decks
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Deck>>> {
        self.decks
            .write()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

fn normalize_name(name: &str) -> String {
    name.to_lowercase()
}
