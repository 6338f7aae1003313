use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;

/// Replacement for values that must never be shown.
pub const MASK: &str = "****";

/// Key fragments that mark a parameter as sensitive.
const SENSITIVE_KEY_PARTS: &[&str] = &[
  "seed",
  "mnemonic",
  "key",
  "token",
  "secret",
  "password",
  "passphrase",
  "private",
  "credential",
  "auth",
];

/// Minimum length of an opaque run of characters treated as a token.
const TOKEN_MIN_LEN: usize = 32;

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(&format!(r"[A-Za-z0-9+/=_\-]{{{},}}", TOKEN_MIN_LEN))
    .expect("token pattern is a valid regex")
});

/// Whether a parameter name denotes a sensitive value.
pub fn is_sensitive_key(key: &str) -> bool {
  let key = key.to_ascii_lowercase();
  SENSITIVE_KEY_PARTS.iter().any(|part| key.contains(part))
}

/// Mask a value for display, keeping a short prefix of long values for correlation.
pub fn mask_value(value: &str) -> String {
  if value.chars().count() < 8 {
    return MASK.to_string();
  }
  let prefix: String = value.chars().take(4).collect();
  format!("{}{}", prefix, MASK)
}

/// Produce a loggable copy of task parameters.
///
/// Values under sensitive keys are fully masked; long opaque tokens under any
/// key are masked with a short prefix kept. The result is ordered by key so log
/// output is stable.
pub fn redact_params(params: &HashMap<String, String>) -> BTreeMap<String, String> {
  params
    .iter()
    .map(|(key, value)| {
      let shown = if is_sensitive_key(key) {
        MASK.to_string()
      } else {
        redact_tokens(value)
      };
      (key.clone(), shown)
    })
    .collect()
}

/// Sanitize free text (typically an error message) that may embed parameters.
///
/// Every sensitive parameter value found in `text` is masked, then any
/// remaining long opaque token is masked as well.
pub fn redact_text(text: &str, params: &HashMap<String, String>) -> String {
  let mut out = text.to_string();
  for (key, value) in params {
    if is_sensitive_key(key) && !value.is_empty() {
      out = out.replace(value.as_str(), MASK);
    }
  }
  redact_tokens(&out)
}

fn redact_tokens(text: &str) -> String {
  TOKEN_PATTERN
    .replace_all(text, |caps: &regex::Captures<'_>| mask_value(&caps[0]))
    .into_owned()
}
