// Core modules implementing the deck string codec and error modeling.
pub mod deck;
pub mod dictionary;
pub mod error;
pub mod format;
pub mod record;
pub mod tally;
