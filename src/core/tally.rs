//! Purpose: Resolve card indices to names, count them, and render the report.
//! Exports: `Tally`, `card_order`, `ASCENDERS_BANE`.
//! Role: Final stage of the decode pipeline; pure, no I/O.
//! Invariants: Any out-of-range index aborts aggregation with no partial counts.
//! Invariants: Report order is total and deterministic: byte order, Ascender's Bane last.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::Write as _;

use crate::core::error::DecodeError;

/// Always rendered after every other card.
pub const ASCENDERS_BANE: &str = "Ascender's Bane";

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Tally<'a> {
    counts: HashMap<&'a [u8], usize>,
}

impl<'a> Tally<'a> {
    pub fn aggregate(indices: &[i64], names: &[&'a [u8]]) -> Result<Self, DecodeError> {
        let mut counts: HashMap<&'a [u8], usize> = HashMap::with_capacity(names.len());
        for &index in indices {
            let name = usize::try_from(index)
                .ok()
                .and_then(|slot| names.get(slot))
                .ok_or(DecodeError::IndexOutOfRange {
                    index,
                    table_len: names.len(),
                })?;
            *counts.entry(*name).or_insert(0) += 1;
        }
        Ok(Self { counts })
    }

    pub fn count(&self, name: &[u8]) -> Option<usize> {
        self.counts.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn sorted_names(&self) -> Vec<&'a [u8]> {
        let mut names: Vec<&'a [u8]> = self.counts.keys().copied().collect();
        names.sort_unstable_by(|a, b| card_order(a, b));
        names
    }

    /// One `"<name> x<count>\n"` line per distinct card, name bytes verbatim.
    pub fn render(&self) -> Vec<u8> {
        let capacity = self.counts.keys().map(|name| name.len() + 8).sum();
        let mut out = Vec::with_capacity(capacity);
        for name in self.sorted_names() {
            let count = self.counts.get(name).copied().unwrap_or(0);
            out.extend_from_slice(name);
            // every aggregated card has count >= 1; zero only arises from a hand-built tally
            if count > 0 {
                let _ = write!(out, " x{count}");
            }
            out.push(b'\n');
        }
        out
    }
}

pub fn card_order(a: &[u8], b: &[u8]) -> Ordering {
    let bane = ASCENDERS_BANE.as_bytes();
    match (a == bane, b == bane) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::{ASCENDERS_BANE, Tally, card_order};
    use crate::core::error::DecodeError;
    use std::cmp::Ordering;
    use std::collections::HashMap;

    #[test]
    fn aggregate_counts_in_index_order() {
        let names: [&[u8]; 3] = [b"card1", b"card2", b"card3"];
        let tally = Tally::aggregate(&[0, 1, 1, 0, 2, 0], &names).expect("aggregate");
        assert_eq!(tally.len(), 3);
        assert_eq!(tally.count(b"card1"), Some(3));
        assert_eq!(tally.count(b"card2"), Some(2));
        assert_eq!(tally.count(b"card3"), Some(1));
        assert_eq!(tally.render(), b"card1 x3\ncard2 x2\ncard3 x1\n");
    }

    #[test]
    fn unreferenced_names_are_absent() {
        let names: [&[u8]; 3] = [b"Strike", b"Defend", b"Bash"];
        let tally = Tally::aggregate(&[2, 2], &names).expect("aggregate");
        assert_eq!(tally.count(b"Strike"), None);
        assert_eq!(tally.render(), b"Bash x2\n");
    }

    #[test]
    fn out_of_range_indices_abort() {
        let names: [&[u8]; 3] = [b"card1", b"card2", b"card3"];
        let err = Tally::aggregate(&[0, 1, 3], &names).expect_err("expected out of range");
        assert_eq!(
            err,
            DecodeError::IndexOutOfRange {
                index: 3,
                table_len: 3,
            }
        );

        let err = Tally::aggregate(&[-1], &names).expect_err("expected out of range");
        assert_eq!(
            err,
            DecodeError::IndexOutOfRange {
                index: -1,
                table_len: 3,
            }
        );
    }

    #[test]
    fn empty_table_rejects_any_index() {
        let err = Tally::aggregate(&[0], &[]).expect_err("expected out of range");
        assert_eq!(
            err,
            DecodeError::IndexOutOfRange {
                index: 0,
                table_len: 0,
            }
        );
        let tally = Tally::aggregate(&[], &[]).expect("aggregate");
        assert!(tally.is_empty());
        assert!(tally.render().is_empty());
    }

    #[test]
    fn ascenders_bane_sorts_last_regardless_of_count() {
        let names: [&[u8]; 3] = [b"Zebra", b"Apple", ASCENDERS_BANE.as_bytes()];
        let tally = Tally::aggregate(&[2, 2, 2, 0, 1], &names).expect("aggregate");
        assert_eq!(
            tally.render(),
            b"Apple x1\nZebra x1\nAscender's Bane x3\n"
        );
        let bane = ASCENDERS_BANE.as_bytes();
        assert_eq!(card_order(bane, b"Zzz"), Ordering::Greater);
        assert_eq!(card_order(b"Aaa", bane), Ordering::Less);
        assert_eq!(card_order(bane, bane), Ordering::Equal);
    }

    #[test]
    fn ordering_is_by_byte_value() {
        let names: [&[u8]; 5] = [b"b", b"B", b"a", b"A", b"\xc9p\xe9e"];
        let tally = Tally::aggregate(&[0, 1, 2, 3, 4], &names).expect("aggregate");
        let sorted: [&[u8]; 5] = [b"A", b"B", b"a", b"b", b"\xc9p\xe9e"];
        assert_eq!(tally.sorted_names(), sorted);
    }

    #[test]
    fn zero_count_renders_bare_name() {
        // unreachable through aggregate; kept for report compatibility
        let tally = Tally {
            counts: HashMap::from([(b"Wound".as_slice(), 0), (b"Bash".as_slice(), 1)]),
        };
        assert_eq!(tally.render(), b"Bash x1\nWound\n");
    }
}
