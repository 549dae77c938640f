//! Plain-text rendering of command results.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use swatch_core::models::Snapshot;
use swatch_core::qa::QaReport;
use swatch_core::surface::{SurfaceAnalysis, SurfaceHealth};
use swatch_core::tokens::TokenMap;

pub const LOCAL_MODE: &str = "not configured, running in local mode";

/// Stderr notice for commands backed by the remote store, when none is
/// configured. Suppressed in JSON mode.
pub fn local_mode_note(remote: Option<&str>, json: bool) -> Option<String> {
    (remote.is_none() && !json).then(|| format!("note: remote store {LOCAL_MODE}"))
}

/// Format a UTC timestamp relative to `now`.
pub fn relative_time(dt: &DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - *dt).num_seconds().max(0);

    if secs < 60 {
        "just now".into()
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86400)
    }
}

pub fn percent(score: f64) -> String {
    format!("{:.0}%", score * 100.0)
}

pub fn tokens(map: &TokenMap) -> String {
    let width = map.keys().map(String::len).max().unwrap_or(0);
    let mut out = String::new();
    for (name, value) in map {
        let _ = writeln!(out, "{name:<width$}  {value}");
    }
    out
}

pub fn qa_report(report: &QaReport) -> String {
    let width = report.items.iter().map(|i| i.name.len()).max().unwrap_or(0);
    let mut out = String::new();
    for item in &report.items {
        let mark = match (item.ok, item.advisory) {
            (_, true) => "info",
            (true, false) => "ok",
            (false, false) => "FAIL",
        };
        let note = item.note.as_deref().unwrap_or("");
        let line = format!("{mark:>4}  {:<width$}  {note}", item.name);
        let _ = writeln!(out, "{}", line.trim_end());
    }
    let _ = writeln!(out, "{}", report.summary());
    out
}

pub fn analysis(a: &SurfaceAnalysis) -> String {
    let mut out = format!(
        "{}: {} token(s), {} violation(s), {} clean\n",
        a.component,
        a.used_tokens.len(),
        a.violations.len(),
        percent(a.cleanliness_score)
    );
    for token in &a.violations {
        let _ = writeln!(out, "  {token}");
        for s in a.suggestions.iter().filter(|s| &s.token == token) {
            let _ = writeln!(
                out,
                "    -> {} ({}, {})",
                s.replacement, s.confidence, s.reason
            );
        }
    }
    out
}

pub fn health(h: &SurfaceHealth) -> String {
    let mut out = format!(
        "{} component(s), {} token use(s), {} violation(s), average {} clean\n",
        h.components,
        h.used_tokens,
        h.violations,
        percent(h.average_score)
    );
    for (component, score) in &h.worst {
        let _ = writeln!(out, "  {component}: {}", percent(*score));
    }
    out
}

pub fn snapshot(s: &Snapshot, now: DateTime<Utc>) -> String {
    let label = s.label.as_deref().unwrap_or("-");
    format!(
        "{}  {}  {}  {}",
        s.id,
        s.kind,
        label,
        relative_time(&s.created_at, now)
    )
}
