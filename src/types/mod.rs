//! Core types for Atlas.

pub mod conversation;
pub mod generation;
pub mod message;
pub mod raw;
pub mod usage;
pub mod wire;

pub use conversation::*;
pub use generation::*;
pub use message::*;
pub use raw::*;
pub use usage::*;
pub use wire::*;
