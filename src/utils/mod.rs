//! Protocol constants and small helpers for building wire values.

pub mod constants;
pub mod message;

pub use constants::*;
pub use message::*;
