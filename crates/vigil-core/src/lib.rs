//! Foundational file utilities shared across Vigil crates.
//!
//! Every artifact Vigil persists is replaced through a temp file and a rename,
//! so a crash never leaves a half-written document, script, or counter.

pub mod atomic_io;

pub use atomic_io::{append_text_atomic, write_text_atomic};
