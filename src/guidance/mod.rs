//! Guidance policy: how much help a student gets on this turn and the system
//! prompt that enforces it.
//!
//! Everything here is pure. Same inputs, same level, same prompt bytes.

pub mod hint;
pub mod phrases;
pub mod prompt;

pub use hint::{compute_hint_level, HintContext};
pub use phrases::extract_recent_phrases;
pub use prompt::{build_socratic_prompt, PromptContext};
