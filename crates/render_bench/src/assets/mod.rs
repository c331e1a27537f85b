//! Asset management system
//!
//! Material cards are the only on-disk assets the workbench reads.

pub mod cards;

pub use cards::{CardData, CardError, CardParser, CardStore};
