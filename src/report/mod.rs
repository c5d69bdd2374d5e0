//! Report rendering.
//!
//! - `xml`: line-per-element writer and number formatting
//! - `builder`: the results document, its failure counterpart and `dump`

pub mod builder;
pub mod xml;

pub use builder::*;
