//! Recent-phrase extraction feeding the prompt's avoid list.
//!
//! Best-effort sentence splitting, not linguistic analysis. The order is fixed:
//! split → trim → drop short fragments → drop noise → keep the last 12.

use std::sync::OnceLock;

use regex::Regex;

pub const MIN_PHRASE_CHARS: usize = 4;
pub const MAX_RECENT_PHRASES: usize = 12;

fn noise_regex() -> Option<&'static Regex> {
  static NOISE: OnceLock<Option<Regex>> = OnceLock::new();
  NOISE.get_or_init(|| Regex::new(r"(?i)interesting question").ok()).as_ref()
}

fn is_noise(fragment: &str) -> bool {
  noise_regex().is_some_and(|re| re.is_match(fragment))
}

/// Sentence fragments from the given message contents, oldest first.
/// The caller decides how many trailing messages to pass in.
pub fn extract_recent_phrases<S: AsRef<str>>(contents: &[S]) -> Vec<String> {
  let fragments: Vec<String> = contents
    .iter()
    .flat_map(|c| c.as_ref().split(['.', '!', '?']))
    .map(str::trim)
    .filter(|s| s.chars().count() >= MIN_PHRASE_CHARS)
    .filter(|s| !is_noise(s))
    .map(str::to_string)
    .collect();

  let start = fragments.len().saturating_sub(MAX_RECENT_PHRASES);
  fragments[start..].to_vec()
}
