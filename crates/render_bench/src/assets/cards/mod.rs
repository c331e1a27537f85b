//! Material card catalog
//!
//! Cards are named parameter presets stored as `*.FCMat` files. The parser
//! flattens a card into a [`RawParams`](crate::material::RawParams) bag and the
//! store indexes the search directories and caches parsed cards.

pub mod card_parser;
pub mod card_store;

pub use card_parser::{CardData, CardParser};
pub use card_store::CardStore;

use std::path::PathBuf;

use thiserror::Error;

/// Card loading errors
#[derive(Error, Debug)]
pub enum CardError {
    /// No card of that name in any search directory
    #[error("Card not found: {0}")]
    NotFound(String),

    /// The card file does not parse
    #[error("Malformed card '{name}': {reason}")]
    Malformed {
        /// Card name
        name: String,
        /// Parser message
        reason: String,
    },

    /// The card file could not be read
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        /// Card file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}
