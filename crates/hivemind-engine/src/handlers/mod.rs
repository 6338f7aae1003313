//! Built-in node handlers.
//!
//! | type           | handler                   |
//! |----------------|---------------------------|
//! | `output`       | [`OutputHandler`]         |
//! | `file_reader`  | [`FileReaderHandler`]     |
//! | `text_chunker` | [`TextChunkerHandler`]    |
//! | `neuron`       | [`CapabilityHandler`]     |
//! | `llm`          | [`LlmHandler`]            |

mod capability;
mod file_reader;
mod llm;
mod output;
mod text_chunker;

pub use capability::CapabilityHandler;
pub use file_reader::FileReaderHandler;
pub use llm::LlmHandler;
pub use output::OutputHandler;
pub use text_chunker::{TextChunkerHandler, chunk_text};

use std::collections::HashMap;

use crate::handler::{Values, value_text};

/// Stringify handler inputs into task parameters.
pub(crate) fn inputs_to_params(inputs: &Values) -> HashMap<String, String> {
  inputs
    .iter()
    .map(|(k, v)| (k.clone(), value_text(v)))
    .collect()
}
