//! Safety layer: input screening and log hygiene.
//!
//! Two concerns live here:
//! - `moderation`: keyword/regex screening of patient input, with severe
//!   matches escalated to human review.
//! - `pii`: masking of identifying information before anything is logged.
//!
//! The LLM call budget and retry middleware sit in `crate::llm::retry`.

pub mod moderation;
pub mod pii;

pub use moderation::{Moderator, ScreenOutcome};
pub use pii::{PiiKind, PiiMasker};
