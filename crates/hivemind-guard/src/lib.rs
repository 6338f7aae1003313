//! Hivemind Guard
//!
//! Guards applied at the boundaries of the hub:
//!
//! - [`validate_path`] keeps caller-supplied paths inside a base directory.
//!   It wraps every external path the file-ingestion handler accepts.
//! - [`redact_params`] and [`redact_text`] mask sensitive values (seeds, keys,
//!   long tokens) before task parameters or error text reach a log line,
//!   an event, or a persisted record.

mod path;
mod redact;

pub use path::{GuardError, validate_path};
pub use redact::{MASK, is_sensitive_key, mask_value, redact_params, redact_text};
