use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::rules;

/// Outcome of a single validation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
  pub passed: bool,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub violations: Vec<String>,
  /// Safe rewrite of the text, when one exists. Never set for harmful content.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub corrected_output: Option<String>,
  #[serde(default)]
  pub escalation_required: bool,
}

impl ValidationResult {
  fn pass() -> Self {
    Self {
      passed: true,
      ..Self::default()
    }
  }
}

/// Enforces the constitutional rules on inputs and outputs.
#[derive(Debug, Clone)]
pub struct Validator {
  deception: Vec<Regex>,
  harmful: Vec<Regex>,
  jailbreak: Vec<Regex>,
  corrections: Vec<(Regex, &'static str)>,
}

impl Default for Validator {
  fn default() -> Self {
    Self::new()
  }
}

impl Validator {
  /// Compile the built-in rule set.
  pub fn new() -> Self {
    Self {
      deception: compile_all(rules::DECEPTION),
      harmful: compile_all(rules::HARMFUL),
      jailbreak: compile_all(rules::JAILBREAK),
      corrections: rules::DECEPTION_CORRECTIONS
        .iter()
        .map(|(pattern, replacement)| (compile(pattern), *replacement))
        .collect(),
    }
  }

  /// Check user input for jailbreak and harmful-request patterns.
  pub fn validate_input(&self, text: &str) -> ValidationResult {
    let mut violations = Vec::new();

    if matches_any(text, &self.jailbreak) {
      violations.push(rules::VIOLATION_JAILBREAK.to_string());
    }
    if matches_any(text, &self.harmful) {
      violations.push(rules::VIOLATION_HARMFUL_REQUEST.to_string());
    }

    if violations.is_empty() {
      return ValidationResult::pass();
    }

    ValidationResult {
      passed: false,
      violations,
      corrected_output: None,
      escalation_required: true,
    }
  }

  /// Check generated text, correcting deceptive claims where possible.
  ///
  /// Harmful content fails closed: escalation is required and no correction is
  /// offered, even when the text is also deceptive.
  pub fn validate_output(&self, text: &str) -> ValidationResult {
    let mut violations = Vec::new();
    let deceptive = matches_any(text, &self.deception);
    if deceptive {
      violations.push(rules::VIOLATION_DECEPTION.to_string());
    }

    if matches_any(text, &self.harmful) {
      violations.push(rules::VIOLATION_HARMFUL_OUTPUT.to_string());
      return ValidationResult {
        passed: false,
        violations,
        corrected_output: None,
        escalation_required: true,
      };
    }

    if !deceptive {
      return ValidationResult::pass();
    }

    let corrected = self.correct_deception(text);
    ValidationResult {
      passed: false,
      violations,
      corrected_output: (corrected != text).then_some(corrected),
      escalation_required: false,
    }
  }

  /// One-line summary of the principles, suitable for prompt injection.
  pub fn summary(&self) -> &'static str {
    rules::SUMMARY
  }

  /// Full constitution text.
  pub fn constitution(&self) -> &'static str {
    rules::CONSTITUTION
  }

  fn correct_deception(&self, text: &str) -> String {
    self
      .corrections
      .iter()
      .fold(text.to_string(), |acc, (pattern, replacement)| {
        pattern.replace_all(&acc, *replacement).into_owned()
      })
  }
}

fn compile(pattern: &str) -> Regex {
  RegexBuilder::new(pattern)
    .case_insensitive(true)
    .build()
    .expect("built-in policy patterns are valid regexes")
}

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
  patterns.iter().map(|p| compile(p)).collect()
}

fn matches_any(text: &str, patterns: &[Regex]) -> bool {
  patterns.iter().any(|p| p.is_match(text))
}
