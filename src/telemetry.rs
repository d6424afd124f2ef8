//! Log setup for the tutor service.
//!
//! Targets: `tutor` (chat turns), `llm` (OpenAI calls and token usage),
//! `store` (persistence), `socratic_tutor` (startup, handlers, analytics).
//!
//! Behavior:
//! - LOG_LEVEL controls the filter (e.g. "debug" or detailed directives like
//!   "info,tutor=debug,socratic_tutor=debug,tower_http=info,axum=info").
//! - LOG_FORMAT selects "pretty" (default) or "json" structured logs.
//!
//! Student text never reaches the logs; handlers record lengths only.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,tutor=debug,llm=info,store=info,socratic_tutor=debug,tower_http=info,axum=info";

/// Filter directives from a LOG_LEVEL value; unset or unparsable falls back to the service default.
fn filter_from(level: Option<&str>) -> EnvFilter {
    level
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .and_then(|l| EnvFilter::try_new(l).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

fn wants_json(format: Option<&str>) -> bool {
    format.is_some_and(|f| f.trim().eq_ignore_ascii_case("json"))
}

pub fn init_tracing() {
    let level = std::env::var("LOG_LEVEL").ok();
    let format = std::env::var("LOG_FORMAT").ok();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter_from(level.as_deref()))
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    if wants_json(format.as_deref()) {
        builder.json().init();
    } else {
        builder.init();
    }
}
