//! Pattern matching for process name filtering
//!
//! A filter is either an exact process name or a wildcard pattern using `*`
//! (any run of characters) and `?` (exactly one character). Kind is
//! auto-detected from the pattern characters. Matching is anchored and
//! case-insensitive; every other character, regex metacharacters included,
//! is a literal.

use crate::models::MonitorError;
use regex::{Regex, RegexBuilder};
use std::fmt;

/// Check if a filter string contains wildcard characters
pub fn is_wildcard_pattern(filter: &str) -> bool {
    filter.contains('*') || filter.contains('?')
}

/// Translate a wildcard pattern into an anchored regular expression.
///
/// Literal runs are escaped with `regex::escape`, so `.`, `+`, `(`, `[` and
/// friends in a process name match themselves.
pub fn wildcard_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 8);
    let mut literal = String::new();

    regex.push('^');
    for c in pattern.chars() {
        match c {
            '*' | '?' => {
                regex.push_str(&regex::escape(&literal));
                literal.clear();
                regex.push_str(if c == '*' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }
    regex.push_str(&regex::escape(&literal));
    regex.push('$');
    regex
}

/// Case-insensitive string equality without allocating
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact,
    Wildcard(Regex),
}

/// A compiled process name filter
#[derive(Debug, Clone)]
pub struct FilterPattern {
    raw: String,
    matcher: Matcher,
}

impl FilterPattern {
    /// Compile a filter. Surrounding whitespace is ignored; blank filters are rejected.
    pub fn parse(pattern: &str) -> Result<Self, MonitorError> {
        let raw = pattern.trim();
        if raw.is_empty() {
            return Err(MonitorError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern is empty".to_string(),
            });
        }

        let matcher = if is_wildcard_pattern(raw) {
            let regex = RegexBuilder::new(&wildcard_to_regex(raw))
                .case_insensitive(true)
                .dot_matches_new_line(true)
                .build()
                .map_err(|e| MonitorError::InvalidPattern {
                    pattern: raw.to_string(),
                    reason: e.to_string(),
                })?;
            Matcher::Wildcard(regex)
        } else {
            Matcher::Exact
        };

        Ok(Self {
            raw: raw.to_string(),
            matcher,
        })
    }

    /// The pattern as configured (trimmed)
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self.matcher, Matcher::Wildcard(_))
    }

    /// Match a process name against this filter
    pub fn matches(&self, name: &str) -> bool {
        match &self.matcher {
            Matcher::Exact => eq_ignore_case(name, &self.raw),
            Matcher::Wildcard(regex) => regex.is_match(name),
        }
    }
}

impl fmt::Display for FilterPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Check if a process name matches any of the provided filters (logical OR)
pub fn matches_any(name: &str, filters: &[FilterPattern]) -> bool {
    filters.iter().any(|filter| filter.matches(name))
}

/// Validate that all filters compile
pub fn validate_filters<S: AsRef<str>>(filters: &[S]) -> Result<(), MonitorError> {
    for filter in filters {
        FilterPattern::parse(filter.as_ref())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(p: &str) -> FilterPattern {
        FilterPattern::parse(p).unwrap()
    }

    #[test]
    fn test_is_wildcard_pattern() {
        assert!(!is_wildcard_pattern("notepad.exe"));
        assert!(!is_wildcard_pattern("[svc].exe"));
        assert!(is_wildcard_pattern("note*"));
        assert!(is_wildcard_pattern("cmd?.exe"));
    }

    #[test]
    fn test_wildcard_to_regex_escapes_literals() {
        assert_eq!(wildcard_to_regex("note*"), "^note.*$");
        assert_eq!(wildcard_to_regex("a?c"), "^a.c$");
        assert_eq!(wildcard_to_regex("*.exe"), "^.*\\.exe$");
        assert_eq!(wildcard_to_regex("c++*"), "^c\\+\\+.*$");
    }

    #[test]
    fn test_exact_matching_is_case_insensitive() {
        let filter = pattern("Calc.EXE");
        assert!(filter.matches("calc.exe"));
        assert!(filter.matches("CALC.exe"));
        assert!(!filter.matches("calc.exe2"));
        assert!(!filter.matches("calc"));
        assert!(!filter.is_wildcard());
    }

    #[test]
    fn test_star_matches_zero_or_more() {
        let filter = pattern("note*");
        assert!(filter.matches("notepad.exe"));
        assert!(filter.matches("note"));
        assert!(filter.matches("NOTEPAD++.EXE"));
        assert!(!filter.matches("wordpad.exe"));
    }

    #[test]
    fn test_question_mark_matches_exactly_one() {
        let filter = pattern("cmd?.exe");
        assert!(filter.matches("cmd1.exe"));
        assert!(!filter.matches("cmd.exe"));
        assert!(!filter.matches("cmd12.exe"));
    }

    #[test]
    fn test_wildcard_is_anchored() {
        let filter = pattern("*pad");
        assert!(filter.matches("notepad"));
        assert!(!filter.matches("notepad.exe"));

        let filter = pattern("svc?");
        assert!(!filter.matches("xsvc1"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let filter = pattern("app(1).*");
        assert!(filter.matches("app(1).exe"));
        assert!(!filter.matches("app1.exe"));

        let filter = pattern("a.c*");
        assert!(!filter.matches("abc.exe"));
        assert!(filter.matches("a.c.exe"));

        let filter = pattern("[x]*");
        assert!(filter.matches("[x]tool"));
        assert!(!filter.matches("xtool"));

        let filter = pattern("$^|*");
        assert!(filter.matches("$^|anything"));
    }

    #[test]
    fn test_mixed_literal_and_wildcards() {
        let filter = pattern("*host?.e*e");
        assert!(filter.matches("svchost1.exe"));
        assert!(filter.matches("host2.ee"));
        assert!(!filter.matches("svchost.exe"));
    }

    #[test]
    fn test_blank_pattern_rejected() {
        assert!(FilterPattern::parse("").is_err());
        assert!(FilterPattern::parse("   ").is_err());
        assert_eq!(pattern("  calc.exe ").as_str(), "calc.exe");
    }

    #[test]
    fn test_matches_any() {
        let filters = vec![pattern("calc.exe"), pattern("note*")];
        assert!(matches_any("notepad.exe", &filters));
        assert!(matches_any("CALC.EXE", &filters));
        assert!(!matches_any("svchost.exe", &filters));
        assert!(!matches_any("calc.exe", &[]));
    }

    #[test]
    fn test_validate_filters() {
        assert!(validate_filters(&["calc.exe", "note*"]).is_ok());
        assert!(validate_filters(&["calc.exe", " "]).is_err());
    }
}
