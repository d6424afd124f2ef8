//! Small utility helpers used across modules.

use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};

/// First `max` characters of `s`, with "..." appended when something was cut.
/// Counts chars, never splits a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
  match s.char_indices().nth(max) {
    Some((cut, _)) => format!("{}...", &s[..cut]),
    None => s.to_string(),
  }
}

/// Show only the edges of a secret, e.g. "sk-abc...wxyz". Short values are fully hidden.
pub fn mask_secret(secret: &str) -> String {
  let s = secret.trim();
  let n = s.chars().count();
  if n <= 10 {
    return String::new();
  }
  let head: String = s.chars().take(6).collect();
  let tail: String = s.chars().skip(n - 4).collect();
  format!("{head}...{tail}")
}

/// Fresh class code such as "CLS-7QK2" followed by two digits from the clock.
pub fn generate_class_code() -> String {
  let body: String = rand::thread_rng()
    .sample_iter(&Alphanumeric)
    .take(4)
    .map(|b| char::from(b).to_ascii_uppercase())
    .collect();
  format!("CLS-{body}{:02}", Utc::now().timestamp_millis().rem_euclid(100))
}
