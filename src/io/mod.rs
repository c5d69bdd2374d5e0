//! Input/output helpers.
//!
//! - host wrapper resolution (`filepath`)
//! - base64 numeric payloads (`binary`)
//! - instrument document decoding (`table`, `meta`) and ingestion (`ingest`)
//! - JSON result exports (`export`)

pub mod binary;
pub mod export;
pub mod filepath;
pub mod ingest;
pub mod meta;
pub mod table;

pub use export::*;
pub use ingest::*;
pub use table::{DecodeOptions, PLUGIN_SECTION, decode_tables};
