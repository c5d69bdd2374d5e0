//! Data sources.
//!
//! Real runs read the instrument export named by the host; `synthetic`
//! renders documents of the same shape for demos and tests.

pub mod synthetic;
