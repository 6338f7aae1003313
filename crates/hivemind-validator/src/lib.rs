//! Hivemind Validator
//!
//! The constitutional safety layer. Every free-text input is checked before it
//! enters a workflow and every free-text output before it leaves one.
//!
//! The rules are compiled into the binary. A [`Validator`] is built once at
//! startup and shared by reference; nothing can alter its patterns afterwards.
//!
//! - [`Validator::validate_input`] flags attempts to override the policy
//!   ("jailbreaks") and harmful requests. Either requires escalation.
//! - [`Validator::validate_output`] flags deceptive self-descriptions, which are
//!   corrected through a fixed substitution table, and harmful content, which
//!   is never corrected and always escalated.

mod rules;
mod validator;

pub use validator::{ValidationResult, Validator};
