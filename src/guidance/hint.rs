//! Hint level calculator: maps attempt count (plus optional signals) to 1..=5.

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 5;

/// Idle time after which the student gets one extra level of help.
pub const STUCK_THRESHOLD_MS: u64 = 5 * 60 * 1000;

#[derive(Clone, Copy, Debug, Default)]
pub struct HintContext<'a> {
  /// Prior turns in the conversation.
  pub attempts: u32,
  /// Absolute override; wins over everything else once clamped.
  pub override_level: Option<i64>,
  /// Time since the student last made progress.
  pub stuck_since_ms: Option<u64>,
  /// Reserved for subject-specific tuning. Currently has no effect.
  pub subject: Option<&'a str>,
}

impl<'a> HintContext<'a> {
  pub fn from_attempts(attempts: u32) -> Self {
    Self { attempts, ..Self::default() }
  }
}

/// Attempts 1-2 → 1, 3-4 → 2, 5-6 → 3, 7-8 → 4, 9+ → 5.
/// Stuck for more than five minutes bumps the level by one.
pub fn compute_hint_level(ctx: &HintContext<'_>) -> u8 {
  if let Some(level) = ctx.override_level {
    return clamp_level(level);
  }

  let base = (i64::from(ctx.attempts) + 1) / 2;
  let mut level = clamp_level(base);

  if ctx.stuck_since_ms.is_some_and(|ms| ms > STUCK_THRESHOLD_MS) {
    level = clamp_level(i64::from(level) + 1);
  }

  subject_adjustment(ctx.subject, level)
}

// Hook for per-subject pacing; identity until a subject needs it.
fn subject_adjustment(_subject: Option<&str>, level: u8) -> u8 {
  level
}

pub fn clamp_level(level: i64) -> u8 {
  level.clamp(i64::from(MIN_LEVEL), i64::from(MAX_LEVEL)) as u8
}

#[cfg(test)]
mod tests {
  use super::*;

  fn level(attempts: u32) -> u8 {
    compute_hint_level(&HintContext::from_attempts(attempts))
  }

  #[test]
  fn escalates_every_two_attempts() {
    let expected = [(0, 1), (1, 1), (2, 1), (3, 2), (4, 2), (5, 3), (6, 3), (7, 4), (8, 4), (9, 5), (10, 5), (250, 5)];
    for (attempts, want) in expected {
      assert_eq!(level(attempts), want, "attempts={attempts}");
    }
  }

  #[test]
  fn override_wins_and_is_clamped() {
    for attempts in [0, 3, 9, 40] {
      let ctx = HintContext { attempts, override_level: Some(3), ..Default::default() };
      assert_eq!(compute_hint_level(&ctx), 3);
    }
    let high = HintContext { attempts: 1, override_level: Some(9), ..Default::default() };
    assert_eq!(compute_hint_level(&high), 5);
    let low = HintContext { attempts: 9, override_level: Some(-2), ..Default::default() };
    assert_eq!(compute_hint_level(&low), 1);
    let stuck = HintContext { attempts: 1, override_level: Some(2), stuck_since_ms: Some(900_000), ..Default::default() };
    assert_eq!(compute_hint_level(&stuck), 2);
  }

  #[test]
  fn stuck_students_get_one_more_level() {
    let ctx = HintContext { attempts: 1, stuck_since_ms: Some(400_000), ..Default::default() };
    assert_eq!(compute_hint_level(&ctx), 2);

    let at_threshold = HintContext { attempts: 1, stuck_since_ms: Some(STUCK_THRESHOLD_MS), ..Default::default() };
    assert_eq!(compute_hint_level(&at_threshold), 1);

    let capped = HintContext { attempts: 12, stuck_since_ms: Some(400_000), ..Default::default() };
    assert_eq!(compute_hint_level(&capped), 5);
  }

  #[test]
  fn subject_does_not_change_the_level_yet() {
    let ctx = HintContext { attempts: 5, subject: Some("math"), ..Default::default() };
    assert_eq!(compute_hint_level(&ctx), 3);
  }
}
