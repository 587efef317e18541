//! Purpose: Decode a deck string exactly once and share the outcome with every reader.
//! Exports: `Deck`, `decode_report`.
//! Role: Memoizing wrapper around the decompress → split → tally pipeline.
//! Invariants: At most one caller runs the decode; the outcome (report or error) is frozen.
//! Invariants: Raw bytes are dropped once decoding starts; only the report is retained.
//! Invariants: Waiters block on a condvar and never observe a partial report.
//! Invariants: A decode that unwinds still settles the deck, as `DecodeError::Aborted`.
//! Notes: Lock poisoning is tolerated because state transitions are single assignments.

use std::mem;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::core::dictionary::decompress;
use crate::core::error::DecodeError;
use crate::core::record::DeckBody;
use crate::core::tally::Tally;

#[derive(Debug)]
enum DeckState {
    Pending(Bytes),
    Decoding,
    Done(Result<Bytes, DecodeError>),
}

#[derive(Debug)]
pub struct Deck {
    state: Mutex<DeckState>,
    settled: Condvar,
    attempts: AtomicU32,
}

impl Deck {
    pub fn new(raw: impl Into<Bytes>) -> Self {
        Self {
            state: Mutex::new(DeckState::Pending(raw.into())),
            settled: Condvar::new(),
            attempts: AtomicU32::new(0),
        }
    }

    /// Returns the rendered report, decoding on first use.
    pub fn resolve(&self) -> Result<Bytes, DecodeError> {
        let mut state = self.lock();
        loop {
            match &mut *state {
                DeckState::Done(outcome) => return outcome.clone(),
                DeckState::Pending(raw) => {
                    let raw = mem::take(raw);
                    *state = DeckState::Decoding;
                    drop(state);
                    return self.run_decode(raw);
                }
                DeckState::Decoding => {}
            }
            state = self
                .settled
                .wait(state)
                .unwrap_or_else(|poison| poison.into_inner());
        }
    }

    /// Like `resolve`, but gives up waiting on another caller's decode after `timeout`.
    ///
    /// Returns `None` on timeout. The in-flight decode is unaffected and later
    /// calls still observe its outcome.
    pub fn resolve_timeout(&self, timeout: Duration) -> Option<Result<Bytes, DecodeError>> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Some(self.resolve());
        };
        let mut state = self.lock();
        loop {
            match &mut *state {
                DeckState::Done(outcome) => return Some(outcome.clone()),
                DeckState::Pending(raw) => {
                    let raw = mem::take(raw);
                    *state = DeckState::Decoding;
                    drop(state);
                    return Some(self.run_decode(raw));
                }
                DeckState::Decoding => {}
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            state = self
                .settled
                .wait_timeout(state, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poison| poison.into_inner().0);
        }
    }

    /// Number of decodes started for this deck; never exceeds one.
    pub fn decode_attempts(&self) -> u32 {
        self.attempts.load(Ordering::Acquire)
    }

    pub fn is_settled(&self) -> bool {
        matches!(&*self.lock(), DeckState::Done(_))
    }

    fn lock(&self) -> MutexGuard<'_, DeckState> {
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn run_decode(&self, raw: Bytes) -> Result<Bytes, DecodeError> {
        self.decode_with(raw, decode_report)
    }

    // Runs outside the lock; the deck is already marked `Decoding`.
    fn decode_with<F>(&self, raw: Bytes, decode: F) -> Result<Bytes, DecodeError>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>, DecodeError>,
    {
        self.attempts.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(raw_len = raw.len(), "decoding deck");

        let mut guard = AbortGuard {
            deck: self,
            armed: true,
        };
        let outcome = decode(&raw[..]).map(Bytes::from);
        guard.armed = false;
        drop(raw);
        match &outcome {
            Ok(report) => tracing::debug!(report_len = report.len(), "deck decoded"),
            Err(err) => tracing::warn!(kind = err.label(), error = %err, "deck decode failed"),
        }

        self.settle(outcome.clone());
        outcome
    }

    fn settle(&self, outcome: Result<Bytes, DecodeError>) {
        let mut state = self.lock();
        *state = DeckState::Done(outcome);
        drop(state);
        self.settled.notify_all();
    }
}

// Settles the deck as `Aborted` if dropped while still armed.
struct AbortGuard<'a> {
    deck: &'a Deck,
    armed: bool,
}

impl Drop for AbortGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::error!(kind = DecodeError::Aborted.label(), "deck decode unwound");
            self.deck.settle(Err(DecodeError::Aborted));
        }
    }
}

/// Runs the full pipeline over raw deck bytes and renders the report.
///
/// Card names borrow from the decompressed document, which lives until the
/// report is rendered. Name bytes are reproduced exactly; no text encoding
/// is required of the input.
pub fn decode_report(raw: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let document = decompress(raw)?;
    let body = DeckBody::split(&document)?;
    let indices = body.indices()?;
    let names = body.names();
    let tally = Tally::aggregate(&indices, &names)?;
    Ok(tally.render())
}

#[cfg(test)]
mod tests {
    use super::{Deck, DeckState, decode_report};
    use crate::core::error::DecodeError;
    use bytes::Bytes;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    const SMALL_DECK: &str = "card|junk||0,1,1,0,2,0;;;&01;&1;x;;&02;&1;y;;&03;&1;z";

    #[test]
    fn resolve_renders_sorted_report() {
        let deck = Deck::new(SMALL_DECK);
        assert!(!deck.is_settled());
        let report = deck.resolve().expect("resolve");
        assert_eq!(&report[..], b"card1 x3\ncard2 x2\ncard3 x1\n");
        assert!(deck.is_settled());
        assert_eq!(deck.decode_attempts(), 1);
    }

    #[test]
    fn repeated_resolve_reuses_report() {
        let deck = Deck::new(SMALL_DECK);
        let first = deck.resolve().expect("first");
        let second = deck.resolve().expect("second");
        assert_eq!(first, second);
        assert_eq!(first.as_ptr(), second.as_ptr());
        assert_eq!(deck.decode_attempts(), 1);
    }

    #[test]
    fn failures_are_sticky() {
        let cases = [
            ("empty", ""),
            ("no section separator", "||I love love slay the relics and slay the spire"),
            ("invalid index", "card|junk||};;;&01;&1;x;;&02;&1;y;;&03;&1;z"),
            ("negative index", "card|junk||-1;;;&01;&1;x;;&02;&1;y;;&03;&1;z"),
            ("out of bounds", "card|junk||3;;;&01;&1;x;;&02;&1;y;;&03;&1;z"),
        ];
        for (desc, input) in cases {
            let deck = Deck::new(input);
            let first = deck.resolve().expect_err(desc);
            let second = deck.resolve().expect_err(desc);
            assert_eq!(first, second, "{desc}");
            assert_eq!(deck.decode_attempts(), 1, "{desc}");
        }
    }

    #[test]
    fn error_kinds_match_failure() {
        assert!(matches!(
            decode_report(b""),
            Err(DecodeError::MalformedDocument { .. })
        ));
        assert!(matches!(
            decode_report(b"||-"),
            Err(DecodeError::MalformedDocument { .. })
        ));
        assert!(matches!(
            decode_report(b"card||};;;&0"),
            Err(DecodeError::InvalidIndex { .. })
        ));
        assert_eq!(
            decode_report(b"||0;;;-"),
            Err(DecodeError::IndexOutOfRange {
                index: 0,
                table_len: 0,
            })
        );
        assert!(matches!(
            decode_report(b"||\xff;;;x"),
            Err(DecodeError::InvalidIndex { .. })
        ));
    }

    #[test]
    fn latin1_names_decode_verbatim() {
        // "Épée" in Latin-1, once as a dictionary word and once inline
        let raw: &[u8] = b"\xc9p\xe9e||0,1,0;;;&0;1;x;;Bash;2;y";
        assert_eq!(
            decode_report(raw).expect("decode"),
            b"Bash x1\n\xc9p\xe9e x2\n"
        );
        assert_eq!(
            decode_report(b"||0;;;\xc9p\xe9e;1;x").expect("decode"),
            b"\xc9p\xe9e x1\n"
        );

        let deck = Deck::new(Bytes::from_static(raw));
        let report = deck.resolve().expect("resolve");
        assert_eq!(&report[..], b"Bash x1\n\xc9p\xe9e x2\n");
    }

    #[test]
    fn empty_deck_renders_empty_report() {
        assert!(decode_report(b"||-;;;-").expect("decode").is_empty());
        assert!(decode_report(b"||;;;").expect("decode").is_empty());
    }

    #[test]
    fn concurrent_readers_share_one_decode() {
        let deck = Arc::new(Deck::new(big_deck_string()));
        let readers = 16;
        let barrier = Arc::new(Barrier::new(readers));
        let handles: Vec<_> = (0..readers)
            .map(|_| {
                let deck = Arc::clone(&deck);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    deck.resolve().expect("resolve")
                })
            })
            .collect();

        let reports: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().expect("join"))
            .collect();
        assert_eq!(deck.decode_attempts(), 1);
        for report in &reports {
            assert_eq!(report, &reports[0]);
        }
    }

    #[test]
    fn timed_out_wait_leaves_decode_in_flight() {
        let deck = Deck::new(SMALL_DECK);
        *deck.lock() = DeckState::Decoding;
        assert!(deck.resolve_timeout(Duration::from_millis(20)).is_none());
        assert!(!deck.is_settled());

        *deck.lock() = DeckState::Done(Ok("Bash x1\n".into()));
        deck.settled.notify_all();
        let report = deck
            .resolve_timeout(Duration::from_millis(20))
            .expect("settled")
            .expect("report");
        assert_eq!(&report[..], b"Bash x1\n");
    }

    #[test]
    fn waiters_wake_when_decode_settles() {
        let deck = Arc::new(Deck::new(SMALL_DECK));
        *deck.lock() = DeckState::Decoding;
        let waiter = {
            let deck = Arc::clone(&deck);
            thread::spawn(move || deck.resolve())
        };
        thread::sleep(Duration::from_millis(20));
        *deck.lock() = DeckState::Done(Err(DecodeError::malformed("test")));
        deck.settled.notify_all();
        let outcome = waiter.join().expect("join");
        assert_eq!(outcome, Err(DecodeError::malformed("test")));
        assert_eq!(deck.decode_attempts(), 0);
    }

    #[test]
    fn unwinding_decode_settles_as_aborted() {
        let deck = Arc::new(Deck::new(SMALL_DECK));
        *deck.lock() = DeckState::Decoding;
        let waiter = {
            let deck = Arc::clone(&deck);
            thread::spawn(move || deck.resolve())
        };

        let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
            deck.decode_with(Bytes::from_static(b"||"), |_| panic!("decoder bug"))
        }));
        assert!(unwound.is_err());

        assert_eq!(waiter.join().expect("join"), Err(DecodeError::Aborted));
        assert!(deck.is_settled());
        assert_eq!(deck.resolve(), Err(DecodeError::Aborted));
        assert_eq!(deck.decode_attempts(), 1);
    }

    #[test]
    fn big_deck_counts_repeated_card() {
        let deck = Deck::new(big_deck_string());
        let report = deck.resolve().expect("resolve");
        let text = std::str::from_utf8(&report).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 52);
        assert_eq!(lines[0], "Card Name 0 x1");
        assert_eq!(lines[1], "Card Name 1 x1");
        assert_eq!(lines[2], "Card Name 10 x1");
        assert!(lines.contains(&"Card Name 17 x49"));
        assert_eq!(lines.iter().filter(|line| line.ends_with(" x1")).count(), 51);
    }

    // 52 dictionary-compressed cards; card 17 appears 49 times.
    fn big_deck_string() -> String {
        let alphabet = crate::core::format::PLACEHOLDER_ALPHABET.as_bytes();
        let dictionary: Vec<String> = (0..52)
            .map(|i| format!("Card Name {i};other details;junk"))
            .collect();
        let cards: Vec<String> = (0..52)
            .map(|i| format!("&{}", char::from(alphabet[i])))
            .collect();
        let mut indices: Vec<String> = (0..52).map(|i| i.to_string()).collect();
        indices.extend((0..48).map(|_| "17".to_string()));
        format!(
            "{}||{};;;{}",
            dictionary.join("|"),
            indices.join(","),
            cards.join(";;")
        )
    }
}
