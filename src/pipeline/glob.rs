//! Glob patterns compiled to anchored regular expressions.
//!
//! Supported syntax (case-sensitive, `/` separated):
//!
//! | Syntax    | Matches                                         |
//! |-----------|-------------------------------------------------|
//! | `**`      | any run of characters, including `/`            |
//! | `**/`     | zero or more whole directories                  |
//! | `*`       | any run of characters except `/`                |
//! | `?`       | one character except `/`                        |
//! | `{a,b}`   | alternation (nestable)                          |
//! | `[a-z]`   | character class, `[!x]` negates                 |
//! | `\x`      | literal `x`                                     |

use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GlobError {
    #[error("empty pattern")]
    Empty,
    #[error("unbalanced braces in `{0}`")]
    UnbalancedBraces(String),
    #[error("unterminated character class in `{0}`")]
    UnterminatedClass(String),
    #[error("dangling escape in `{0}`")]
    DanglingEscape(String),
    #[error("invalid pattern `{0}`: {1}")]
    Regex(String, String),
}

/// A compiled glob.
#[derive(Clone)]
pub struct Glob {
    pattern: String,
    regex: Regex,
    base: PathBuf,
}

impl Glob {
    pub fn new(pattern: &str) -> Result<Self, GlobError> {
        let pattern = pattern.trim_start_matches("./");
        if pattern.is_empty() {
            return Err(GlobError::Empty);
        }
        let source = translate(pattern)?;
        let regex =
            Regex::new(&source).map_err(|e| GlobError::Regex(pattern.into(), e.to_string()))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            base: literal_base(pattern),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Leading directory components that contain no glob syntax.
    ///
    /// `app/scss/**/*.scss` has base `app/scss`; outputs keep their path
    /// relative to this directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Match a `/` separated relative path.
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Match a filesystem path (separators normalized to `/`).
    pub fn matches_path(&self, path: &Path) -> bool {
        self.is_match(&to_slash(path))
    }
}

impl fmt::Debug for Glob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Glob").field(&self.pattern).finish()
    }
}

impl PartialEq for Glob {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

/// Render a path with `/` separators.
pub fn to_slash(path: &Path) -> String {
    let s = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.into_owned()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

fn is_meta(c: char) -> bool {
    matches!(c, '*' | '?' | '[' | '{' | '\\')
}

fn literal_base(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    let mut segments = pattern.split('/').peekable();
    while let Some(segment) = segments.next() {
        // The final segment names files, never part of the base
        if segments.peek().is_none() || segment.chars().any(is_meta) {
            break;
        }
        base.push(segment);
    }
    base
}

fn translate(pattern: &str) -> Result<String, GlobError> {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let chars: Vec<char> = pattern.chars().collect();
    let mut depth = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' if chars.get(i + 1) == Some(&'*') => {
                let at_segment_start = i == 0 || chars[i - 1] == '/';
                if at_segment_start && chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:[^/]*/)*");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '{' => {
                depth += 1;
                out.push_str("(?:");
            }
            '}' if depth > 0 => {
                depth -= 1;
                out.push(')');
            }
            '}' => return Err(GlobError::UnbalancedBraces(pattern.into())),
            ',' if depth > 0 => out.push('|'),
            '[' => {
                let close = chars[i + 1..]
                    .iter()
                    .skip(1)
                    .position(|&c| c == ']')
                    .map(|p| i + 2 + p)
                    .ok_or_else(|| GlobError::UnterminatedClass(pattern.into()))?;
                out.push('[');
                let mut j = i + 1;
                if chars[j] == '!' || chars[j] == '^' {
                    out.push('^');
                    j += 1;
                }
                for &c in &chars[j..close] {
                    if matches!(c, '\\' | '[' | ']' | '&' | '~' | '|') {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push(']');
                i = close + 1;
                continue;
            }
            '\\' => {
                let next = chars
                    .get(i + 1)
                    .ok_or_else(|| GlobError::DanglingEscape(pattern.into()))?;
                out.push_str(&regex::escape(&next.to_string()));
                i += 2;
                continue;
            }
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    if depth != 0 {
        return Err(GlobError::UnbalancedBraces(pattern.into()));
    }

    out.push('$');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(p: &str) -> Glob {
        Glob::new(p).unwrap()
    }

    #[test]
    fn test_double_star_spans_directories() {
        let g = glob("app/scss/**/*.scss");
        assert!(g.is_match("app/scss/main.scss"));
        assert!(g.is_match("app/scss/parts/deep/_grid.scss"));
        assert!(!g.is_match("app/css/main.scss"));
    }

    #[test]
    fn test_leading_double_star_matches_root_files() {
        let g = glob("**/*.scss");
        assert!(g.is_match("main.scss"));
        assert!(g.is_match("a/b/c.scss"));
        assert!(!g.is_match("a/b/c.css"));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let g = glob("app/fonts/src/*.ttf");
        assert!(g.is_match("app/fonts/src/inter.ttf"));
        assert!(!g.is_match("app/fonts/src/sub/inter.ttf"));
    }

    #[test]
    fn test_alternation() {
        let g = glob("app/images/src/**/*.{jpg,jpeg,png,svg,webp}");
        assert!(g.is_match("app/images/src/hero.jpeg"));
        assert!(g.is_match("app/images/src/icons/logo.svg"));
        assert!(!g.is_match("app/images/src/notes.txt"));
    }

    #[test]
    fn test_nested_alternation() {
        let g = glob("{a,b/{c,d}}/x.js");
        assert!(g.is_match("a/x.js"));
        assert!(g.is_match("b/d/x.js"));
        assert!(!g.is_match("b/x.js"));
    }

    #[test]
    fn test_case_sensitive() {
        let g = glob("*.scss");
        assert!(!g.is_match("MAIN.SCSS"));
    }

    #[test]
    fn test_question_mark_and_class() {
        assert!(glob("v?.js").is_match("v2.js"));
        assert!(!glob("v?.js").is_match("v/.js"));
        assert!(glob("[a-c].txt").is_match("b.txt"));
        assert!(!glob("[!a-c].txt").is_match("b.txt"));
    }

    #[test]
    fn test_dots_are_literal() {
        let g = glob("main.min.js");
        assert!(g.is_match("main.min.js"));
        assert!(!g.is_match("mainXminXjs"));
    }

    #[test]
    fn test_trailing_double_star() {
        let g = glob("**/node_modules/**");
        assert!(g.is_match("node_modules/pkg/index.js"));
        assert!(g.is_match("app/node_modules/x"));
    }

    #[test]
    fn test_errors() {
        assert_eq!(Glob::new("").unwrap_err(), GlobError::Empty);
        assert!(matches!(
            Glob::new("{a,b").unwrap_err(),
            GlobError::UnbalancedBraces(_)
        ));
        assert!(matches!(
            Glob::new("a}").unwrap_err(),
            GlobError::UnbalancedBraces(_)
        ));
        assert!(matches!(
            Glob::new("[ab").unwrap_err(),
            GlobError::UnterminatedClass(_)
        ));
    }

    #[test]
    fn test_base() {
        assert_eq!(glob("app/scss/**/*.scss").base(), Path::new("app/scss"));
        assert_eq!(glob("app/js/main.js").base(), Path::new("app/js"));
        assert_eq!(glob("**/*.scss").base(), Path::new(""));
        assert_eq!(glob("app/{a,b}/x.js").base(), Path::new("app"));
    }

    #[test]
    fn test_leading_dot_slash_stripped() {
        assert!(glob("./app/*.html").is_match("app/index.html"));
    }
}
