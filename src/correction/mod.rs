//! Correction workflow.
//!
//! - `protocol`: requests/replies between the orchestrator and a surface
//! - `orchestrator`: the per-column fit session
//! - `compare`: recorded vs. predicted intensity tables
//! - `headless`: a surface that commits the initial fits

pub mod compare;
pub mod headless;
pub mod orchestrator;
pub mod protocol;

pub use compare::*;
pub use headless::*;
pub use orchestrator::*;
pub use protocol::*;
