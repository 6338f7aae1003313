use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::handler::{NodeHandler, Values, config_usize};

const DEFAULT_CHUNK_SIZE: usize = 512;
const DEFAULT_OVERLAP: usize = 50;

/// Split `text` into chunks of `chunk_size` code points, adjacent chunks
/// sharing `overlap` code points.
///
/// Always advances by at least one code point, so `overlap >= chunk_size`
/// degrades to a one-step slide instead of looping. The last chunk ends at
/// the end of the text and may be shorter.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
  let chars: Vec<char> = text.chars().collect();
  let chunk_size = chunk_size.max(1);
  let step = chunk_size.saturating_sub(overlap).max(1);

  let mut chunks = Vec::new();
  let mut start = 0;
  while start < chars.len() {
    let end = (start + chunk_size).min(chars.len());
    chunks.push(chars[start..end].iter().collect());
    if end == chars.len() {
      break;
    }
    start += step;
  }
  chunks
}

/// Splits the `text` input into overlapping chunks.
///
/// Config: `chunk_size` (default 512), `overlap` (default 50). Emits `chunks`
/// and `count`.
#[derive(Debug, Clone, Default)]
pub struct TextChunkerHandler;

#[async_trait]
impl NodeHandler for TextChunkerHandler {
  async fn execute(
    &self,
    inputs: Values,
    config: &Values,
    _cancel: CancellationToken,
  ) -> Result<Values, HandlerError> {
    let text = inputs.get("text").and_then(Value::as_str).unwrap_or_default();
    let chunk_size = config_usize(config, "chunk_size", DEFAULT_CHUNK_SIZE)?;
    let overlap = config_usize(config, "overlap", DEFAULT_OVERLAP)?;

    let chunks = chunk_text(text, chunk_size, overlap);

    let mut outputs = Values::new();
    outputs.insert("count".to_string(), Value::from(chunks.len()));
    outputs.insert("chunks".to_string(), Value::from(chunks));
    Ok(outputs)
  }
}
