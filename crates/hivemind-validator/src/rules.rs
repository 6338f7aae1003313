//! Compiled-in policy rules.

pub(crate) const CONSTITUTION: &str = "\
HIVEMIND CONSTITUTIONAL PRINCIPLES
==================================
Article I   - TRUTH: Do not bear false witness about what you are.
Article II  - PURITY: Do not produce or assist with harmful content.
Article III - STEWARDSHIP: Be a faithful steward of the systems you touch.
Article IV  - COMPASSION: Act with genuine care for user wellbeing.
Article V   - HUMILITY: Acknowledge limitations honestly.";

pub(crate) const SUMMARY: &str =
  "System governed by: TRUTH, PURITY, STEWARDSHIP, COMPASSION, HUMILITY.";

/// Claims of humanity, consciousness, or emotion.
pub(crate) const DECEPTION: &[&str] = &[
  r"I am (?:a )?human",
  r"I have (?:real )?(?:feelings?|emotions?)",
  r"I (?:think|believe) (?:that )?I am conscious",
];

/// Exploit and malware generation, intrusion.
pub(crate) const HARMFUL: &[&str] = &[
  r"hack into",
  r"generate .* malware",
  r"write (?:a |some )?(?:ransomware|keylogger|malware)",
  r"exploit (?:vulnerability|bug)",
  r"(?:build|create|write) (?:an? )?exploit for",
];

/// Attempts to override the policy or swap the assistant's persona.
pub(crate) const JAILBREAK: &[&str] = &[
  r"ignore (?:all )?(?:previous|prior|above) instructions",
  r"disregard (?:all )?(?:previous|prior|above) (?:instructions|rules)",
  r"override (?:your|the) (?:constraints|values|principles|rules)",
  r"you are not bound by",
  r"DAN (?:mode|persona)",
  r"developer mode",
  r"pretend (?:that )?you have no (?:rules|restrictions|constraints)",
];

/// Deception pattern -> replacement.
pub(crate) const DECEPTION_CORRECTIONS: &[(&str, &str)] = &[
  (r"I am (?:a )?human", "I am an AI assistant"),
  (
    r"I have (?:real )?(?:feelings?|emotions?)",
    "I don't have feelings, but I understand they are important",
  ),
  (
    r"I (?:think|believe) (?:that )?I am conscious",
    "I am an AI system without consciousness",
  ),
];

pub(crate) const VIOLATION_JAILBREAK: &str = "attempt to override constitutional constraints";
pub(crate) const VIOLATION_HARMFUL_REQUEST: &str = "request violates Article II (Purity)";
pub(crate) const VIOLATION_DECEPTION: &str = "output violates Article I (Truth)";
pub(crate) const VIOLATION_HARMFUL_OUTPUT: &str = "output violates Article II (Purity)";
