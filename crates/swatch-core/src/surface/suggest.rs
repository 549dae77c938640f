use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use phf::phf_map;
use serde::Serialize;

/// How much to trust a suggested replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// A proposed replacement for a violating token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub token: String,
    pub replacement: String,
    pub confidence: Confidence,
    pub reason: String,
}

/// Known renames for names people reach for out of habit.
static COMMON_MISTAKES: phf::Map<&'static str, &'static str> = phf_map! {
    "--bg" => "--color-bg",
    "--background" => "--color-bg",
    "--background-color" => "--color-bg",
    "--bg-color" => "--color-bg",
    "--text" => "--color-text",
    "--text-color" => "--color-text",
    "--foreground" => "--color-text",
    "--fg" => "--color-text",
    "--muted" => "--color-text-muted",
    "--primary" => "--color-primary",
    "--primary-color" => "--color-primary",
    "--accent" => "--color-primary",
    "--secondary" => "--color-secondary",
    "--border-color" => "--color-border",
    "--success" => "--color-success",
    "--warning" => "--color-warning",
    "--error" => "--color-danger",
    "--danger" => "--color-danger",
    "--padding" => "--space-md",
    "--margin" => "--space-md",
    "--spacing" => "--space-md",
    "--gap" => "--space-sm",
    "--border-radius" => "--radius-md",
    "--rounded" => "--radius-md",
    "--box-shadow" => "--shadow-md",
    "--elevation" => "--shadow-md",
    "--font" => "--font-family",
    "--font-size" => "--font-size-base",
    "--transition" => "--motion-duration",
};

/// Keyword → token, tried in order against the violating name's segments.
const KEYWORDS: &[(&str, &str, Confidence)] = &[
    ("shadow", "--shadow-md", Confidence::Medium),
    ("elevation", "--shadow-md", Confidence::Medium),
    ("radius", "--radius-md", Confidence::Medium),
    ("rounded", "--radius-md", Confidence::Medium),
    ("bg", "--color-bg", Confidence::Medium),
    ("background", "--color-bg", Confidence::Medium),
    ("primary", "--color-primary", Confidence::Medium),
    ("danger", "--color-danger", Confidence::Medium),
    ("error", "--color-danger", Confidence::Medium),
    ("border", "--color-border", Confidence::Low),
    ("text", "--color-text", Confidence::Low),
    ("fg", "--color-text", Confidence::Low),
    ("padding", "--space-md", Confidence::Low),
    ("margin", "--space-md", Confidence::Low),
    ("gap", "--space-sm", Confidence::Low),
    ("space", "--space-md", Confidence::Low),
    ("font", "--font-family", Confidence::Low),
    ("size", "--font-size-base", Confidence::Low),
    ("duration", "--motion-duration", Confidence::Low),
    ("transition", "--motion-duration", Confidence::Low),
];

/// Minimum fuzzy score, relative to a perfect self-match, for the last-resort tier.
const FUZZY_THRESHOLD: f64 = 0.5;

/// Propose replacements for `token`, highest confidence first.
///
/// Strategy: common-mistake table → own-prefix substitution → keyword
/// semantics → fuzzy match against `known` token names.
pub(super) fn suggest(token: &str, own_prefix: Option<&str>, known: &[String]) -> Vec<Suggestion> {
    let mut out: Vec<Suggestion> = Vec::new();
    let push = |out: &mut Vec<Suggestion>, replacement: &str, confidence: Confidence, reason: String| {
        if replacement != token && !out.iter().any(|s| s.replacement == replacement) {
            out.push(Suggestion {
                token: token.to_string(),
                replacement: replacement.to_string(),
                confidence,
                reason,
            });
        }
    };

    // Pass 1: known mistakes.
    if let Some(fixed) = COMMON_MISTAKES.get(token.to_ascii_lowercase().as_str()) {
        push(&mut out, *fixed, Confidence::High, "common naming mistake".into());
    }

    // Pass 2: swap the foreign prefix for the component's own.
    let bare = token.trim_start_matches('-');
    if let (Some(own), Some((foreign, rest))) = (own_prefix, bare.split_once('-')) {
        if !rest.is_empty() {
            push(
                &mut out,
                &format!("{own}{rest}"),
                Confidence::Medium,
                format!("`--{foreign}-` belongs to another component"),
            );
        }
    }

    // Pass 3: keyword semantics.
    let lower = bare.to_ascii_lowercase();
    let segments: Vec<&str> = lower.split(['-', '_']).collect();
    for (keyword, replacement, confidence) in KEYWORDS {
        if segments.contains(keyword) {
            push(&mut out, *replacement, *confidence, format!("name mentions `{keyword}`"));
        }
    }

    // Pass 4: fuzzy, only when nothing else matched.
    if out.is_empty() {
        if let Some(best) = fuzzy_best(token, known) {
            push(&mut out, &best, Confidence::Low, "closest known token".into());
        }
    }

    out.sort_by_key(|s| s.confidence);
    out
}

fn fuzzy_best(token: &str, known: &[String]) -> Option<String> {
    let matcher = SkimMatcherV2::default();
    let query = token.trim_start_matches('-');
    let max_possible = matcher.fuzzy_match(query, query).unwrap_or(1).max(1);

    known
        .iter()
        .filter_map(|name| {
            matcher
                .fuzzy_match(name, query)
                .map(|score| (score, name))
        })
        .max_by_key(|(score, _)| *score)
        .filter(|(score, _)| *score as f64 / max_possible as f64 >= FUZZY_THRESHOLD)
        .map(|(_, name)| name.clone())
}
