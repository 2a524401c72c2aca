//! Built-in and synthetic observation sets.

pub mod sample;

pub use sample::*;
