//! Redis-style glob patterns over cache keys.
//!
//! Supported syntax: `*` (any run), `?` (any single char), `[abc]`,
//! `[a-z]`, `[^a]` / `[!a]` classes, and `\x` to match `x` literally.

use bazaar_core::CacheError;
use regex::Regex;

use super::store::CacheResult;

/// Compiled key pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn compile(pattern: &str) -> CacheResult<Self> {
        let translated = translate(pattern)?;
        let regex = Regex::new(&translated).map_err(|e| CacheError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Escape glob metacharacters so `literal` only matches itself.
pub fn escape(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn translate(pattern: &str) -> CacheResult<String> {
    let invalid = |reason: &str| CacheError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    let mut out = String::from("(?s)^");
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => {
                let escaped = chars.next().ok_or_else(|| invalid("trailing backslash"))?;
                out.push_str(&regex::escape(&escaped.to_string()));
            }
            '[' => {
                out.push('[');
                if matches!(chars.peek(), Some('^') | Some('!')) {
                    chars.next();
                    out.push('^');
                }
                let mut closed = false;
                let mut empty = true;
                while let Some(inner) = chars.next() {
                    match inner {
                        ']' if !empty => {
                            closed = true;
                            break;
                        }
                        '\\' => {
                            let escaped =
                                chars.next().ok_or_else(|| invalid("trailing backslash"))?;
                            push_class_literal(&mut out, escaped);
                        }
                        '-' if !empty && chars.peek().is_some_and(|n| *n != ']') => out.push('-'),
                        other => push_class_literal(&mut out, other),
                    }
                    empty = false;
                }
                if !closed {
                    return Err(invalid("unterminated character class"));
                }
                out.push(']');
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    out.push('$');
    Ok(out)
}

fn push_class_literal(out: &mut String, c: char) {
    if matches!(c, '\\' | '[' | ']' | '^' | '-' | '&' | '~') {
        out.push('\\');
    }
    out.push(c);
}
