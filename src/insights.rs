//! Teacher/student analytics: usage time series, per-student counters, and
//! daily insight reports (model-assisted, with a keyword-frequency fallback).

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveTime, SecondsFormat, Timelike, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::domain::{Conversation, ConversationStatus};
use crate::error::LlmError;
use crate::openai::{ChatMessage, ChatModel, ChatOptions};
use crate::util::truncate_chars;

pub const DEFAULT_DAYS: i64 = 7;
pub const MAX_DAYS: i64 = 90;
pub const SAMPLE_QUESTIONS_PER_DAY: usize = 3;
pub const SAMPLE_QUESTION_CHARS: usize = 100;

const MAX_TOPICS: usize = 5;
const MAX_RECOMMENDATIONS: usize = 5;
const MAX_MISCONCEPTIONS: usize = 3;

const STOP_WORDS: [&str; 11] = ["what", "when", "where", "which", "that", "this", "with", "from", "they", "have", "been"];

const ANALYSIS_SYSTEM_PROMPT: &str = r#"You are an expert educational analyst helping teachers understand their students' learning patterns.

Analyze the following student questions and provide actionable insights for the teacher.

Your response must be in valid JSON format with this exact structure:
{
  "summary": "A brief 1-2 sentence overview of student activity and engagement",
  "strugglingTopics": ["topic1", "topic2", "topic3"],
  "teachingRecommendations": ["recommendation1", "recommendation2", "recommendation3"],
  "commonMisconceptions": ["misconception1", "misconception2"],
  "engagementLevel": "low|medium|high"
}

Guidelines:
- Be specific and actionable in recommendations
- Focus on patterns, not individual questions
- Identify subject areas where students need more support
- Suggest concrete teaching strategies
- Keep each item concise (1 sentence max)
- Engagement: low (< 5 questions), medium (5-15), high (> 15)"#;

/// Clamp a `days` query value into 1..=MAX_DAYS (missing → DEFAULT_DAYS).
pub fn clamp_days(days: Option<i64>) -> i64 {
  days.unwrap_or(DEFAULT_DAYS).clamp(1, MAX_DAYS)
}

// ---------- usage series ----------

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct UsagePoint {
  pub date: String,
  pub count: usize,
}

/// Start and end of the reporting window ending at `now`.
pub fn usage_window(days: i64, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
  let span = if days == 1 { Duration::hours(24) } else { Duration::days(days) };
  (now - span, now)
}

fn bucket_start(at: DateTime<Utc>, hourly: bool) -> DateTime<Utc> {
  let day = at.date_naive();
  let time = if hourly { NaiveTime::from_hms_opt(at.hour(), 0, 0).unwrap_or(NaiveTime::MIN) } else { NaiveTime::MIN };
  day.and_time(time).and_utc()
}

fn iso_key(at: DateTime<Utc>) -> String {
  at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Zero-filled message counts per hour (days == 1) or per UTC day.
pub fn usage_series(timestamps: &[DateTime<Utc>], days: i64, now: DateTime<Utc>) -> Vec<UsagePoint> {
  let hourly = days == 1;
  let (start, end) = usage_window(days, now);

  let mut counts: HashMap<DateTime<Utc>, usize> = HashMap::new();
  for at in timestamps.iter().filter(|t| **t >= start && **t <= end) {
    *counts.entry(bucket_start(*at, hourly)).or_default() += 1;
  }

  let (step, steps) = if hourly { (Duration::hours(1), 24) } else { (Duration::days(1), days) };
  (0..=steps)
    .map(|i| bucket_start(start + step * i as i32, hourly))
    .map(|key| UsagePoint { date: iso_key(key), count: counts.get(&key).copied().unwrap_or(0) })
    .collect()
}

// ---------- student stats ----------

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
  pub total_conversations: usize,
  pub active_conversations: usize,
  pub total_messages: usize,
}

pub fn student_stats(conversations: &[Conversation], user_messages: usize) -> StudentStats {
  StudentStats {
    total_conversations: conversations.len(),
    active_conversations: conversations.iter().filter(|c| c.status == ConversationStatus::Active).count(),
    total_messages: user_messages,
  }
}

// ---------- daily insights ----------

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Engagement {
  Low,
  Medium,
  High,
}

impl Engagement {
  fn parse(s: &str) -> Option<Self> {
    match s {
      "low" => Some(Engagement::Low),
      "medium" => Some(Engagement::Medium),
      "high" => Some(Engagement::High),
      _ => None,
    }
  }

  fn from_volume(questions: usize) -> Self {
    if questions > 10 {
      Engagement::High
    } else if questions > 5 {
      Engagement::Medium
    } else {
      Engagement::Low
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Analysis {
  pub summary: String,
  pub struggling_topics: Vec<String>,
  pub teaching_recommendations: Vec<String>,
  pub common_misconceptions: Vec<String>,
  pub engagement: Engagement,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct TopicCount {
  pub topic: String,
  pub count: usize,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailyInsight {
  pub date: String,
  pub total_questions: usize,
  pub unique_students: usize,
  pub sample_questions: Vec<String>,
  pub summary: String,
  pub struggling_topics: Vec<String>,
  pub teaching_recommendations: Vec<String>,
  pub common_misconceptions: Vec<String>,
  pub engagement: Engagement,
  pub top_topics: Vec<TopicCount>,
}

/// One student question, tagged with who asked it.
#[derive(Clone, Debug)]
pub struct QuestionRecord {
  pub student_id: String,
  pub content: String,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct DayBucket {
  total: usize,
  students: HashSet<String>,
  samples: Vec<String>,
}

fn group_by_day(records: &[QuestionRecord]) -> BTreeMap<String, DayBucket> {
  let mut days: BTreeMap<String, DayBucket> = BTreeMap::new();
  for r in records {
    let day = days.entry(r.created_at.format("%Y-%m-%d").to_string()).or_default();
    day.total += 1;
    day.students.insert(r.student_id.clone());
    if day.samples.len() < SAMPLE_QUESTIONS_PER_DAY {
      day.samples.push(truncate_chars(&r.content, SAMPLE_QUESTION_CHARS));
    }
  }
  days
}

/// Per-day reports, most recent day first. Days are analyzed one after another.
#[instrument(level = "info", target = "socratic_tutor", skip(llm, opts, records), fields(records = records.len(), llm = llm.is_some()))]
pub async fn daily_insights(llm: Option<&dyn ChatModel>, opts: ChatOptions, records: &[QuestionRecord]) -> Vec<DailyInsight> {
  let mut out = Vec::new();
  for (date, day) in group_by_day(records).into_iter().rev() {
    let analysis = match llm {
      Some(model) => match analyze_questions(model, opts, &day.samples).await {
        Ok(a) => a,
        Err(e) => {
          warn!(target: "socratic_tutor", %date, error = %e, "Question analysis failed; using keyword fallback");
          fallback_analysis(&day)
        }
      },
      None => fallback_analysis(&day),
    };

    let sample_count = day.samples.len();
    let top_topics = analysis
      .struggling_topics
      .iter()
      .enumerate()
      .map(|(i, topic)| TopicCount { topic: topic.clone(), count: sample_count.saturating_sub(i) })
      .collect();

    out.push(DailyInsight {
      date,
      total_questions: day.total,
      unique_students: day.students.len(),
      sample_questions: day.samples,
      summary: analysis.summary,
      struggling_topics: analysis.struggling_topics,
      teaching_recommendations: analysis.teaching_recommendations,
      common_misconceptions: analysis.common_misconceptions,
      engagement: analysis.engagement,
      top_topics,
    });
  }
  out
}

fn fallback_analysis(day: &DayBucket) -> Analysis {
  Analysis {
    summary: format!("{} questions from {} students", day.total, day.students.len()),
    struggling_topics: extract_topics(&day.samples).into_iter().map(|t| t.topic).collect(),
    teaching_recommendations: Vec::new(),
    common_misconceptions: Vec::new(),
    engagement: Engagement::from_volume(day.total),
  }
}

/// Ask the model for a structured read of a batch of student questions.
pub async fn analyze_questions(llm: &dyn ChatModel, opts: ChatOptions, questions: &[String]) -> Result<Analysis, LlmError> {
  if questions.is_empty() {
    return Ok(Analysis {
      summary: "No student activity to analyze.".into(),
      struggling_topics: Vec::new(),
      teaching_recommendations: Vec::new(),
      common_misconceptions: Vec::new(),
      engagement: Engagement::Low,
    });
  }

  let numbered: Vec<String> = questions.iter().enumerate().map(|(i, q)| format!("{}. {}", i + 1, q)).collect();
  let user = format!("Student Questions:\n{}\n\nProvide your analysis in JSON format.", numbered.join("\n"));
  let messages = [ChatMessage::system(ANALYSIS_SYSTEM_PROMPT), ChatMessage::user(user)];

  let raw = llm.complete(&messages, opts).await?;
  parse_analysis(&raw)
}

/// Parse the outermost `{...}` of a model reply, bounding every list.
pub fn parse_analysis(raw: &str) -> Result<Analysis, LlmError> {
  let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) else {
    return Err(LlmError::InvalidResponse("no JSON object in analysis reply".into()));
  };
  if end < start {
    return Err(LlmError::InvalidResponse("no JSON object in analysis reply".into()));
  }
  let v: Value = serde_json::from_str(&raw[start..=end]).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

  let strings = |key: &str, max: usize| -> Vec<String> {
    v.get(key)
      .and_then(Value::as_array)
      .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).take(max).collect())
      .unwrap_or_default()
  };

  Ok(Analysis {
    summary: v
      .get("summary")
      .and_then(Value::as_str)
      .filter(|s| !s.trim().is_empty())
      .unwrap_or("Analysis completed.")
      .to_string(),
    struggling_topics: strings("strugglingTopics", MAX_TOPICS),
    teaching_recommendations: strings("teachingRecommendations", MAX_RECOMMENDATIONS),
    common_misconceptions: strings("commonMisconceptions", MAX_MISCONCEPTIONS),
    engagement: v
      .get("engagementLevel")
      .and_then(Value::as_str)
      .and_then(Engagement::parse)
      .unwrap_or(Engagement::Medium),
  })
}

/// Most frequent content words (> 3 chars, minus question words), top five.
/// Ties keep first-seen order.
pub fn extract_topics(questions: &[String]) -> Vec<TopicCount> {
  let mut order: Vec<String> = Vec::new();
  let mut counts: HashMap<String, usize> = HashMap::new();

  for q in questions {
    let cleaned: String = q
      .to_lowercase()
      .chars()
      .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c.is_whitespace() { c } else { ' ' })
      .collect();
    for word in cleaned.split_whitespace().filter(|w| w.chars().count() > 3 && !STOP_WORDS.contains(w)) {
      let n = counts.entry(word.to_string()).or_insert(0);
      if *n == 0 {
        order.push(word.to_string());
      }
      *n += 1;
    }
  }

  let mut topics: Vec<TopicCount> = order
    .into_iter()
    .map(|topic| {
      let count = counts.get(&topic).copied().unwrap_or(0);
      TopicCount { topic, count }
    })
    .collect();
  topics.sort_by(|a, b| b.count.cmp(&a.count));
  topics.truncate(MAX_TOPICS);
  topics
}
