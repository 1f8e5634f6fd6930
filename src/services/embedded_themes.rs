use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::models::{ColorTokenSet, ThemeFile, ThemePreference};

use super::chart_renderer::CHART_TOKENS;

// Embed theme files at compile time so the first paint never waits on disk
const LIGHT_THEME_JSON: &str = include_str!("../../themes/light.jsonc");
const DARK_THEME_JSON: &str = include_str!("../../themes/dark.jsonc");
const TOKENS_CSS: &str = include_str!("../../styles/tokens.css");

const COLOR_PATTERN: &str =
    r"^(#([0-9a-fA-F]{3}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})|rgba?\(\s*[0-9.]+\s*,\s*[0-9.]+\s*,\s*[0-9.]+\s*(,\s*[0-9.]+\s*)?\))$";

static REQUIRED_TOKENS: OnceLock<Vec<String>> = OnceLock::new();
static COLOR_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static EMBEDDED_THEMES: OnceLock<HashMap<ThemePreference, ColorTokenSet>> = OnceLock::new();

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ThemeError {
    #[error("Invalid theme JSON: {0}")]
    Parse(String),

    #[error("Theme declares mode '{found}' but was loaded as '{expected}'")]
    ModeMismatch {
        expected: ThemePreference,
        found: ThemePreference,
    },

    #[error("Missing {mode} tokens: {preview}")]
    MissingTokens { mode: ThemePreference, preview: String },

    #[error("Invalid {mode} token '{token}': {reason}")]
    InvalidToken {
        mode: ThemePreference,
        token: String,
        reason: String,
    },
}

/// Token set for a theme mode. Always defined for both modes.
pub fn embedded_token_set(mode: ThemePreference) -> &'static ColorTokenSet {
    let themes = EMBEDDED_THEMES.get_or_init(|| {
        let mut map = HashMap::new();
        for (mode, source) in [
            (ThemePreference::Light, LIGHT_THEME_JSON),
            (ThemePreference::Dark, DARK_THEME_JSON),
        ] {
            let tokens = match load_theme(mode, source) {
                Ok(tokens) => tokens,
                Err(e) => {
                    log::error!("Embedded {mode} theme rejected: {e}");
                    ColorTokenSet::default()
                }
            };
            map.insert(mode, tokens);
        }
        map
    });

    static EMPTY: OnceLock<ColorTokenSet> = OnceLock::new();
    themes
        .get(&mode)
        .unwrap_or_else(|| EMPTY.get_or_init(ColorTokenSet::default))
}

/// Tokens every theme must define: the custom properties of tokens.css plus
/// the tokens the chart renderer reads.
pub fn required_tokens() -> &'static [String] {
    REQUIRED_TOKENS.get_or_init(|| {
        let mut tokens = BTreeSet::new();
        if let Ok(token_regex) = Regex::new(r"--[A-Za-z0-9_-]+") {
            for matched in token_regex.find_iter(TOKENS_CSS) {
                tokens.insert(matched.as_str().trim_start_matches("--").to_string());
            }
        }
        for token in CHART_TOKENS {
            tokens.insert((*token).to_string());
        }
        tokens.into_iter().collect()
    })
}

fn load_theme(mode: ThemePreference, source: &str) -> Result<ColorTokenSet, ThemeError> {
    let sanitized = strip_jsonc_comments(source);
    let theme: ThemeFile =
        serde_json::from_str(&sanitized).map_err(|e| ThemeError::Parse(e.to_string()))?;

    if theme.mode != mode {
        return Err(ThemeError::ModeMismatch {
            expected: mode,
            found: theme.mode,
        });
    }

    let tokens = ColorTokenSet::new(theme.tokens);
    validate_token_set(mode, &tokens, required_tokens())?;
    log::debug!("Loaded embedded theme '{}' ({} tokens)", theme.id, tokens.len());
    Ok(tokens)
}

pub fn validate_token_set(
    mode: ThemePreference,
    tokens: &ColorTokenSet,
    required: &[String],
) -> Result<(), ThemeError> {
    let missing: Vec<&String> = required.iter().filter(|key| !tokens.contains(key)).collect();
    if !missing.is_empty() {
        let preview = missing.iter().take(5).map(|k| k.as_str()).collect::<Vec<_>>();
        let remaining = missing.len().saturating_sub(preview.len());
        let suffix = if remaining > 0 {
            format!(" (and {remaining} more)")
        } else {
            String::new()
        };
        return Err(ThemeError::MissingTokens {
            mode,
            preview: format!("{}{suffix}", preview.join(", ")),
        });
    }

    let color_regex = COLOR_REGEX.get_or_init(|| Regex::new(COLOR_PATTERN).ok());
    for (key, value) in tokens.iter() {
        let invalid = |reason: &str| ThemeError::InvalidToken {
            mode,
            token: key.to_string(),
            reason: reason.to_string(),
        };
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(invalid("value cannot be empty"));
        }
        if trimmed.contains("</style>") || trimmed.contains("<script") {
            return Err(invalid("value contains dangerous content"));
        }
        if let Some(regex) = color_regex {
            if !regex.is_match(trimmed) {
                return Err(invalid("value is not a hex or rgb() color"));
            }
        }
    }

    Ok(())
}

fn strip_jsonc_comments(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape = false;

    while let Some(ch) = chars.next() {
        if in_string {
            output.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match (ch, chars.peek().copied()) {
            ('"', _) => {
                in_string = true;
                output.push(ch);
            }
            ('/', Some('/')) => {
                // Line comment: skip to end of line, keep the newline
                for next in chars.by_ref() {
                    if next == '\n' {
                        output.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    if next == '\n' {
                        output.push('\n');
                    }
                    prev = next;
                }
            }
            _ => output.push(ch),
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_embedded_themes_define_every_required_token() {
        for mode in ThemePreference::all() {
            let tokens = embedded_token_set(*mode);
            for token in required_tokens() {
                assert!(
                    tokens.get(token).is_some(),
                    "token '{token}' missing from {mode} theme"
                );
            }
        }
    }

    #[test]
    fn test_embedded_themes_share_the_same_token_names() {
        let light: Vec<&str> = embedded_token_set(ThemePreference::Light).iter().map(|(k, _)| k).collect();
        let dark: Vec<&str> = embedded_token_set(ThemePreference::Dark).iter().map(|(k, _)| k).collect();
        assert_eq!(light, dark);
    }

    #[test]
    fn test_required_tokens_include_css_and_chart_tokens() {
        let required = required_tokens();
        assert!(required.iter().any(|t| t == "background"));
        assert!(required.iter().any(|t| t == "text-primary"));
        assert!(required.iter().any(|t| t == "grid-line"));
        assert!(required.iter().any(|t| t == "tooltip-background"));
    }

    #[test]
    fn test_validate_rejects_missing_and_malformed_tokens() {
        let required = vec!["background".to_string(), "grid-line".to_string()];

        let mut partial = std::collections::BTreeMap::new();
        partial.insert("background".to_string(), "#fff".to_string());
        let err = validate_token_set(ThemePreference::Dark, &ColorTokenSet::new(partial.clone()), &required)
            .unwrap_err();
        assert!(matches!(err, ThemeError::MissingTokens { .. }));

        partial.insert("grid-line".to_string(), "blue-ish".to_string());
        let err = validate_token_set(ThemePreference::Dark, &ColorTokenSet::new(partial), &required)
            .unwrap_err();
        assert!(matches!(err, ThemeError::InvalidToken { ref token, .. } if token == "grid-line"));
    }

    #[test]
    fn test_load_theme_rejects_mode_mismatch() {
        let err = load_theme(ThemePreference::Light, DARK_THEME_JSON).unwrap_err();
        assert!(matches!(err, ThemeError::ModeMismatch { .. }));
    }

    #[test]
    fn test_strip_jsonc_comments_keeps_strings() {
        let input = "{\n  // comment\n  \"url\": \"http://x//y\", /* block */ \"a\": 1\n}";
        let value: serde_json::Value = serde_json::from_str(&strip_jsonc_comments(input)).unwrap();
        assert_eq!(value["url"], "http://x//y");
        assert_eq!(value["a"], 1);
    }
}
