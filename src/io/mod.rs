//! Output helpers.
//!
//! - fit result export for external plotting (`export`)

pub mod export;

pub use export::*;
