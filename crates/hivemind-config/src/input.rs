//! Input references for workflow nodes.
//!
//! A node declares its inputs as a map of local names to producer references.
//! A reference is either the key of an initial input supplied when the run is
//! started, or the output of an earlier node in the form `<node_id>.<key>`.
//!
//! # Examples
//!
//! ```json
//! {
//!   "text": "read.content",
//!   "query": "question"
//! }
//! ```
//!
//! Here `text` is bound to the `content` output of node `read`, and `query`
//! to the initial input named `question`.

/// A reference to a value in the run's result store.
pub type InputRef = String;
