//! Design tokens: the token map, default values, and per-kind value rules.
//!
//! A token is a CSS custom property (`--color-bg: #ffffff`). The rule a value
//! must satisfy is inferred from the token's name; see [`TokenKind::infer`].

mod store;

pub use store::{SetOutcome, SharedTokenStore, TokenChange, TokenStore};

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

/// Mapping from token name to value.
pub type TokenMap = BTreeMap<String, String>;

/// Embedded default token set.
const DEFAULT_TOKENS_TOML: &str = include_str!("../../../../config/tokens.toml");

static RE_DIMENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?(\d+\.?\d*|\.\d+)(px|rem|em|%|vh|vw|ch|ex|cm|mm|in|pt|pc)$").unwrap()
});

static RE_HEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").unwrap());

static RE_RGB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^rgba?\(\s*[\d.]+%?(\s*,\s*|\s+)[\d.]+%?(\s*,\s*|\s+)[\d.]+%?(\s*[,/]\s*[\d.]+%?)?\s*\)$",
    )
    .unwrap()
});

static RE_HSL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^hsla?\(\s*[\d.]+(deg)?(\s*,\s*|\s+)[\d.]+%(\s*,\s*|\s+)[\d.]+%(\s*[,/]\s*[\d.]+%?)?\s*\)$",
    )
    .unwrap()
});

#[derive(Deserialize)]
struct DefaultTokensFile {
    tokens: TokenMap,
}

/// The fixed default token map.
pub fn default_tokens() -> TokenMap {
    let file: DefaultTokensFile =
        toml::from_str(DEFAULT_TOKENS_TOML).expect("embedded default tokens are valid TOML");
    file.tokens
}

/// Value rule family, inferred from a token name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Spacing, radius, font-size: `<number><unit>`.
    Dimension,
    /// Color, background, text, border: hex / rgb / hsl / `transparent`.
    Color,
    /// Anything non-empty.
    Free,
}

const DIMENSION_SEGMENTS: &[&str] = &["space", "spacing", "gap", "radius", "size", "width"];
const COLOR_SEGMENTS: &[&str] = &["color", "colour", "bg", "text", "border"];

impl TokenKind {
    /// Infer the value rule from the name.
    ///
    /// Dimension segments win over color segments, so `--border-radius` is a
    /// dimension.
    pub fn infer(name: &str) -> Self {
        let bare = name.trim_start_matches('-').to_ascii_lowercase();
        let segments: Vec<&str> = bare.split(['-', '_']).collect();

        if bare.contains("font-size") || segments.iter().any(|s| DIMENSION_SEGMENTS.contains(s)) {
            Self::Dimension
        } else if segments.iter().any(|s| COLOR_SEGMENTS.contains(s)) {
            Self::Color
        } else {
            Self::Free
        }
    }
}

/// Why a token write was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("token name is empty")]
    EmptyName,
    #[error("`{0}` is not a <number><unit> dimension")]
    InvalidDimension(String),
    #[error("`{0}` is not a hex, rgb(), hsl() or transparent color")]
    InvalidColor(String),
    #[error("value is empty")]
    Empty,
    #[error("could not persist tokens: {0}")]
    Persistence(String),
}

/// Validate and normalize a raw value for the given token name.
///
/// Returns the value that should be stored.
pub fn normalize_value(name: &str, raw: &str) -> Result<String, Rejection> {
    if name.trim().is_empty() {
        return Err(Rejection::EmptyName);
    }
    let cleaned: String = raw.chars().filter(|c| !c.is_control()).collect();
    let value = cleaned.trim();

    match TokenKind::infer(name) {
        TokenKind::Dimension => {
            if RE_DIMENSION.is_match(value) {
                Ok(value.to_string())
            } else {
                Err(Rejection::InvalidDimension(value.to_string()))
            }
        }
        TokenKind::Color => {
            if is_color(value) {
                Ok(value.to_string())
            } else {
                Err(Rejection::InvalidColor(value.to_string()))
            }
        }
        TokenKind::Free => {
            if value.is_empty() {
                Err(Rejection::Empty)
            } else {
                Ok(value.to_string())
            }
        }
    }
}

fn is_color(value: &str) -> bool {
    value.eq_ignore_ascii_case("transparent")
        || RE_HEX.is_match(value)
        || RE_RGB.is_match(value)
        || RE_HSL.is_match(value)
}

/// Render a token map as a `selector { --name: value; }` block.
pub fn to_css(selector: &str, tokens: &TokenMap) -> String {
    let mut css = format!("{selector} {{\n");
    for (name, value) in tokens {
        css.push_str(&format!("  {name}: {value};\n"));
    }
    css.push_str("}\n");
    css
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_known_tokens() {
        let defaults = default_tokens();
        for name in ["--color-bg", "--color-primary", "--space-md", "--radius-md", "--font-size-base"] {
            assert!(defaults.contains_key(name), "missing default {name}");
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        for (name, value) in default_tokens() {
            assert_eq!(
                normalize_value(&name, &value).as_deref(),
                Ok(value.as_str()),
                "default {name} fails its own rule"
            );
        }
    }

    #[test]
    fn test_kind_inference() {
        assert_eq!(TokenKind::infer("--space-md"), TokenKind::Dimension);
        assert_eq!(TokenKind::infer("--radius-lg"), TokenKind::Dimension);
        assert_eq!(TokenKind::infer("--font-size-base"), TokenKind::Dimension);
        assert_eq!(TokenKind::infer("--border-radius"), TokenKind::Dimension);
        assert_eq!(TokenKind::infer("--color-bg"), TokenKind::Color);
        assert_eq!(TokenKind::infer("--button-bg"), TokenKind::Color);
        assert_eq!(TokenKind::infer("--card-text"), TokenKind::Color);
        assert_eq!(TokenKind::infer("--input-border"), TokenKind::Color);
        assert_eq!(TokenKind::infer("--font-family"), TokenKind::Free);
        assert_eq!(TokenKind::infer("--shadow-md"), TokenKind::Free);
    }

    #[test]
    fn test_dimension_values() {
        for ok in ["4px", "1.5rem", "0.875em", "50%", "100vh", "-2px", ".5rem", "12pt"] {
            assert!(normalize_value("--space-md", ok).is_ok(), "{ok} should pass");
        }
        for bad in ["4", "px", "4 px", "calc(1px + 2px)", "red", "", "4px;"] {
            assert_eq!(
                normalize_value("--space-md", bad),
                Err(Rejection::InvalidDimension(bad.trim().to_string())),
                "{bad} should fail"
            );
        }
    }

    #[test]
    fn test_color_values() {
        for ok in [
            "#fff",
            "#1A2b3C",
            "rgb(0, 0, 0)",
            "rgba(37, 99, 235, 0.4)",
            "rgb(0 0 0 / 50%)",
            "hsl(210, 50%, 40%)",
            "hsla(210deg, 50%, 40%, 0.5)",
            "transparent",
            "  #abcdef  ",
        ] {
            assert!(normalize_value("--color-bg", ok).is_ok(), "{ok} should pass");
        }
        for bad in ["#ffff", "#12345", "red", "rgb(0,0)", "hsl(1, 2, 3)", "url(x.png)"] {
            assert!(normalize_value("--color-bg", bad).is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        assert_eq!(normalize_value("--color-bg", " #111111 ").unwrap(), "#111111");
    }

    #[test]
    fn test_free_values_strip_control_chars() {
        assert_eq!(
            normalize_value("--font-family", "Inter,\u{0007} sans-serif\n").unwrap(),
            "Inter, sans-serif"
        );
        assert_eq!(normalize_value("--font-family", "\n\t "), Err(Rejection::Empty));
    }

    #[test]
    fn test_empty_name_rejected() {
        assert_eq!(normalize_value("  ", "#fff"), Err(Rejection::EmptyName));
    }

    #[test]
    fn test_to_css() {
        let mut tokens = TokenMap::new();
        tokens.insert("--color-bg".into(), "#fff".into());
        tokens.insert("--space-md".into(), "16px".into());
        assert_eq!(
            to_css(":root", &tokens),
            ":root {\n  --color-bg: #fff;\n  --space-md: 16px;\n}\n"
        );
    }
}
