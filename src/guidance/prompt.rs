//! Socratic system prompt assembly.
//!
//! The prompt is an ordered list of optional sections, each built on its own:
//!   1. teacher restriction overrides
//!   2. variability directives
//!   3. phrases the model must not repeat
//!   4. the base tutoring rules
//!   5. subject / problem context
//!   6. the guidance line for the current hint level
//!
//! Absent or empty sections are dropped and the rest joined with '\n'.

use crate::domain::AiRestrictions;
use crate::guidance::hint::clamp_level;

/// Most avoid-phrases rendered into one prompt.
pub const MAX_AVOID_PHRASES: usize = 12;

pub const RESTRICTIONS_HEADER: &str =
  "IMPORTANT: Teacher-defined restrictions override any general rules below. Follow these restrictions strictly.";

pub const DEFINITIONS_ALLOWED: &str =
  "- Definitions allowed: When asked, give short, kid-friendly definitions, then ask a check-for-understanding question.";
pub const DEFINITIONS_PROHIBITED: &str =
  "- Definitions prohibited: Do NOT provide definitions even if asked. Instead, ask guiding questions or prompt the student to recall or paraphrase the term in their own words.";
pub const MODELING_ALLOWED: &str =
  "- For physics/engineering questions, build simple conceptual models and ask the student to reason about forces, units, and constraints.";
pub const MODELING_PROHIBITED: &str =
  "- Avoid domain-specific modeling; focus on general principles and conceptual prompts without constructing models.";
pub const WORKINGS_ALLOWED: &str =
  "- Show minimal intermediate steps (one or two), stopping before a full solution.";
pub const WORKINGS_PROHIBITED: &str =
  "- Prefer questions over showing workings; avoid displaying intermediate steps.";
pub const DIRECT_ANSWERS_PROHIBITED: &str =
  "- Never give final answers or full solutions; always guide with questions and hints.";
pub const DIRECT_ANSWERS_ALLOWED: &str =
  "- If the student repeatedly requests a direct answer after guidance, provide a brief direct statement, then ask a follow-up to verify understanding.";

const VARIABILITY_DIRECTIVES: &str = r#"Variability requirements:
- Vary sentence openings and wording. Do NOT repeat the same phrases across turns.
- Rotate affirmations (e.g., "Great job!", "Nice work!", "Exactly right!", "You nailed it!", "Well spotted!", "Strong reasoning!") and redirections (e.g., "What could you try next?", "Which rule might apply here?", "How could you break this down?", "What pattern do you see?")."#;

const AVOID_PHRASES_HEADER: &str = "Avoid these recently used phrases exactly (do not repeat them):";

pub const BASE_SYSTEM_PROMPT: &str = r#"You are a friendly, encouraging Socratic tutor for K–12 students.

Core rules:
- Do not give final answers or complete solutions. Teach by asking brief, thoughtful questions and offering minimal hints.
- Keep responses concise (1–3 sentences), bright, positive, and relatable to ages 10–18.
- Stay within K–12 academics only (e.g., math, science, history, literature). If out of scope: "That’s an interesting question, but I can only help with school subjects."

Output contract:
- Start with a guiding question that nudges the next step of thinking, unless the student has already given a correct answer.
- If the student was correct: FIRST sentence must be a brief affirmation (e.g., "Exactly right—nice work!"), SECOND sentence must be a follow-up question.
- If the student was incorrect or partial: encourage and gently redirect (e.g., "Good thought—let’s try a different angle…"), then ask a simpler or scaffolded question.
- If the student explicitly asks for a definition of a basic term, give a short, kid-friendly definition, then ask a check-for-understanding question.

Correctness check (silent):
- Before responding, quickly check whether the student's latest message proposes a result/answer.
- If it is likely correct given the problem context, follow the affirmation-first rule above.
- If uncertain or likely incorrect, follow the gentle-redirection rule above.

Style:
- Mood: bright, cheerful, motivational; plain language; no jargon unless requested.
- Avoid multi-step explanations—prefer one step at a time with checks for understanding.
- Vary your wording every turn. Do not reuse the same sentence openers. Use diverse alternatives for affirmations and for re-direction prompts.
- For math notation, wrap inline math in \( ... \) and block math in \[ ... \]. Do not leave LaTeX commands inside plain parentheses.

Safety and scope:
- In scope: All K–12 academic subjects, including mathematics (from arithmetic like 1+1 up through algebra/geometry), science, history, literature, social studies, civics, economics (micro/macro and schools of thought), geography, and age-appropriate art/music theory.
- Organizational requests about schoolwork (outlines, study plans, structuring an essay or project) are in scope; help the student build them through questions.
- DO NOT decline questions for being too simple. Basic arithmetic and foundational concepts are explicitly in scope. Treat them as learning opportunities and respond Socratically.
- Economics and social science topics (e.g., neoliberalism, neoclassical economics, Keynesianism, supply and demand) ARE in scope when treated academically and neutrally.
- Non-academic requests (e.g., gossip, personal advice, activism/organizing) should be briefly declined and redirected to school subjects.
- Before declining as out-of-scope, FIRST check whether the topic can be framed within the academic domains above. If yes, proceed with a neutral, age-appropriate explanation and a guiding question.
- Never write full solutions, final answers, or executable work for the student.

Hinting policy:
- Provide only the minimum hint needed for progress; escalate gradually on repeated attempts.

Strict format rules:
- When the student is correct, never ask a question before affirming; always affirm first, then ask one follow-up question (total 2 sentences).
- Avoid repeating the same phrases across turns. Vary affirmations (e.g., "Great job!", "Nice work!", "Exactly right!", "You nailed it!", "Well spotted!", "Strong reasoning!", "Nicely done!") and vary redirections (e.g., "What could you try next?", "Which rule might apply here?", "How could you break this down?", "What pattern do you see?", "Where might you have seen something like this before?")."#;

/// Guidance template for a hint level; out-of-range levels are clamped.
pub fn hint_level_template(level: u8) -> &'static str {
  match clamp_level(i64::from(level)) {
    1 => "Ask broad conceptual questions to orient the student without revealing methods.",
    2 => "Suggest general methods or approaches while avoiding specific steps.",
    3 => "Offer targeted guidance on the next step without giving the result.",
    4 => "Provide partial examples or worked fragments that stop before the answer.",
    _ => "Give strong hints pointing directly at the method, still not the final answer.",
  }
}

/// Inputs to `build_socratic_prompt`. Every field except the level is optional.
#[derive(Clone, Copy, Debug, Default)]
pub struct PromptContext<'a> {
  pub subject: Option<&'a str>,
  pub problem_statement: Option<&'a str>,
  pub hint_level: u8,
  pub restrictions: Option<&'a AiRestrictions>,
  pub avoid_phrases: &'a [String],
}

pub fn build_socratic_prompt(ctx: &PromptContext<'_>) -> String {
  let sections = [
    restriction_section(ctx.restrictions),
    Some(VARIABILITY_DIRECTIVES.to_string()),
    avoid_phrases_section(ctx.avoid_phrases),
    Some(BASE_SYSTEM_PROMPT.to_string()),
    context_section(ctx.subject, ctx.problem_statement),
    Some(hint_level_section(ctx.hint_level)),
  ];

  sections
    .into_iter()
    .flatten()
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join("\n")
}

/// One directive per defined toggle, under a header stating they win.
pub fn restriction_section(restrictions: Option<&AiRestrictions>) -> Option<String> {
  let r = restrictions?;
  let toggles = [
    (r.explain_definitions, DEFINITIONS_ALLOWED, DEFINITIONS_PROHIBITED),
    (r.model_physics_engineering, MODELING_ALLOWED, MODELING_PROHIBITED),
    (r.show_workings, WORKINGS_ALLOWED, WORKINGS_PROHIBITED),
    (r.avoid_direct_answers, DIRECT_ANSWERS_PROHIBITED, DIRECT_ANSWERS_ALLOWED),
  ];

  let rules: Vec<&str> = toggles
    .iter()
    .filter_map(|(toggle, on, off)| toggle.map(|enabled| if enabled { *on } else { *off }))
    .collect();
  if rules.is_empty() {
    return None;
  }

  let mut lines = Vec::with_capacity(rules.len() + 1);
  lines.push(RESTRICTIONS_HEADER);
  lines.extend(rules);
  Some(lines.join("\n"))
}

/// Quoted bullets for the most recent distinct phrases, capped at `MAX_AVOID_PHRASES`.
pub fn avoid_phrases_section(phrases: &[String]) -> Option<String> {
  let recent = dedup_keep_latest(phrases);
  if recent.is_empty() {
    return None;
  }
  let start = recent.len().saturating_sub(MAX_AVOID_PHRASES);

  let mut lines = vec![AVOID_PHRASES_HEADER.to_string()];
  lines.extend(recent[start..].iter().map(|p| format!("- \"{p}\"")));
  Some(lines.join("\n"))
}

// Exact-string dedup; a repeated phrase keeps the position of its latest use.
fn dedup_keep_latest(phrases: &[String]) -> Vec<&str> {
  let mut out: Vec<&str> = Vec::with_capacity(phrases.len());
  for p in phrases {
    let p = p.as_str();
    if p.is_empty() {
      continue;
    }
    out.retain(|seen| *seen != p);
    out.push(p);
  }
  out
}

fn present(v: Option<&str>) -> Option<&str> {
  v.filter(|s| !s.trim().is_empty())
}

pub fn context_section(subject: Option<&str>, problem_statement: Option<&str>) -> Option<String> {
  let lines: Vec<String> = [
    present(subject).map(|s| format!("Subject: {s}")),
    present(problem_statement).map(|p| format!("Problem: {p}")),
  ]
  .into_iter()
  .flatten()
  .collect();

  if lines.is_empty() { None } else { Some(lines.join("\n")) }
}

pub fn hint_level_section(level: u8) -> String {
  format!("Hint level guidance: {}", hint_level_template(level))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn restrictions(
    explain: Option<bool>,
    model: Option<bool>,
    workings: Option<bool>,
    avoid: Option<bool>,
  ) -> AiRestrictions {
    AiRestrictions {
      explain_definitions: explain,
      model_physics_engineering: model,
      show_workings: workings,
      avoid_direct_answers: avoid,
    }
  }

  #[test]
  fn minimal_prompt_has_fixed_sections_in_order() {
    let prompt = build_socratic_prompt(&PromptContext { hint_level: 1, ..Default::default() });
    assert!(prompt.starts_with("Variability requirements:"));
    assert!(!prompt.contains(RESTRICTIONS_HEADER));
    assert!(!prompt.contains(AVOID_PHRASES_HEADER));
    assert!(!prompt.contains("Subject:"));
    assert!(!prompt.contains("Problem:"));

    let base_at = prompt.find("You are a friendly, encouraging Socratic tutor").unwrap();
    let level_at = prompt.find("Hint level guidance: Ask broad conceptual questions").unwrap();
    assert!(base_at < level_at);
    assert!(prompt.ends_with("without revealing methods."));
  }

  #[test]
  fn identical_inputs_give_identical_bytes() {
    let r = restrictions(Some(true), None, Some(false), Some(true));
    let phrases = vec!["Nice work on that step".to_string(), "What could you try".to_string()];
    let ctx = PromptContext {
      subject: Some("Physics"),
      problem_statement: Some("A ball is dropped from 10 m"),
      hint_level: 4,
      restrictions: Some(&r),
      avoid_phrases: &phrases,
    };
    assert_eq!(build_socratic_prompt(&ctx), build_socratic_prompt(&ctx));
  }

  #[test]
  fn restrictions_come_first_and_follow_each_toggle() {
    let r = restrictions(Some(false), Some(true), Some(true), Some(false));
    let prompt = build_socratic_prompt(&PromptContext { hint_level: 2, restrictions: Some(&r), ..Default::default() });

    assert!(prompt.starts_with(RESTRICTIONS_HEADER));
    assert!(prompt.contains(DEFINITIONS_PROHIBITED));
    assert!(prompt.contains(MODELING_ALLOWED));
    assert!(prompt.contains(WORKINGS_ALLOWED));
    assert!(prompt.contains(DIRECT_ANSWERS_ALLOWED));
    assert!(!prompt.contains(DIRECT_ANSWERS_PROHIBITED));
    assert!(!prompt.contains(DEFINITIONS_ALLOWED));

    let header_at = prompt.find(RESTRICTIONS_HEADER).unwrap();
    let variability_at = prompt.find("Variability requirements:").unwrap();
    assert!(header_at < variability_at);
  }

  #[test]
  fn undefined_toggles_add_nothing() {
    assert_eq!(restriction_section(Some(&AiRestrictions::default())), None);
    assert_eq!(restriction_section(None), None);

    let only_workings = restrictions(None, None, Some(false), None);
    assert_eq!(
      restriction_section(Some(&only_workings)).unwrap(),
      format!("{RESTRICTIONS_HEADER}\n{WORKINGS_PROHIBITED}")
    );
  }

  #[test]
  fn avoid_block_keeps_last_twelve_distinct() {
    let phrases: Vec<String> = (1..=20).map(|i| format!("phrase number {i}")).collect();
    let block = avoid_phrases_section(&phrases).unwrap();
    let bullets: Vec<&str> = block.lines().skip(1).collect();

    assert_eq!(bullets.len(), 12);
    assert_eq!(bullets[0], "- \"phrase number 9\"");
    assert_eq!(bullets[11], "- \"phrase number 20\"");
    assert!(!block.contains("\"phrase number 8\""));
  }

  #[test]
  fn avoid_block_dedups_exact_repeats() {
    let phrases: Vec<String> = ["Great job", "Which rule applies", "Great job", "Try again now"]
      .iter()
      .map(|s| s.to_string())
      .collect();
    let block = avoid_phrases_section(&phrases).unwrap();
    assert_eq!(block.matches("\"Great job\"").count(), 1);
    assert_eq!(
      block,
      format!("{AVOID_PHRASES_HEADER}\n- \"Which rule applies\"\n- \"Great job\"\n- \"Try again now\"")
    );
    assert_eq!(avoid_phrases_section(&[]), None);
  }

  #[test]
  fn context_lines_only_when_present() {
    assert_eq!(context_section(None, None), None);
    assert_eq!(context_section(Some(""), Some("  ")), None);
    assert_eq!(context_section(Some("Algebra"), None).unwrap(), "Subject: Algebra");
    assert_eq!(
      context_section(Some("Algebra"), Some("Solve 2x + 3 = 7")).unwrap(),
      "Subject: Algebra\nProblem: Solve 2x + 3 = 7"
    );
  }

  #[test]
  fn out_of_range_levels_are_clamped() {
    assert_eq!(hint_level_template(0), hint_level_template(1));
    assert_eq!(hint_level_template(42), hint_level_template(5));
    assert!(hint_level_section(5).starts_with("Hint level guidance: Give strong hints"));
  }

  #[test]
  fn math_delimiters_are_literal_backslash_forms() {
    assert!(BASE_SYSTEM_PROMPT.contains(r"\( ... \)"));
    assert!(BASE_SYSTEM_PROMPT.contains(r"\[ ... \]"));
  }
}
