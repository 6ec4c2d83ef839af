//! Full-match regular expressions for string conditions and free-text search
//!
//! Patterns follow the usual syntax plus `\Q...\E` quoting, so callers can
//! search for an exact string containing metacharacters. A pattern matches a
//! value only if it matches the whole value.

use super::types::QueryError;
use regex_lite::Regex;

/// Quote a literal so it matches exactly when used as a pattern
pub fn exact_match(literal: &str) -> String {
    format!("\\Q{}\\E", literal)
}

/// Rewrite `\Q...\E` sections into escaped literals
fn expand_quotes(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(start) = rest.find("\\Q") {
        out.push_str(&rest[..start]);
        let quoted = &rest[start + 2..];
        match quoted.find("\\E") {
            Some(end) => {
                out.push_str(&regex_lite::escape(&quoted[..end]));
                rest = &quoted[end + 2..];
            }
            None => {
                // Unterminated quote runs to the end
                out.push_str(&regex_lite::escape(quoted));
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Compile a pattern anchored at both ends
pub fn full_match_regex(pattern: &str) -> Result<Regex, QueryError> {
    let anchored = format!("^(?:{})$", expand_quotes(pattern));
    Regex::new(&anchored).map_err(|e| QueryError::Pattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_must_match_whole_value() {
        let re = full_match_regex("cust.*").unwrap();
        assert!(re.is_match("customer"));
        assert!(!re.is_match("my customer"));
    }

    #[test]
    fn quoted_section_is_literal() {
        let re = full_match_regex(&exact_match("a.b (x)")).unwrap();
        assert!(re.is_match("a.b (x)"));
        assert!(!re.is_match("aXb (x)"));

        let mixed = full_match_regex("\\Q1+1\\E=.*").unwrap();
        assert!(mixed.is_match("1+1=2"));
        assert!(!mixed.is_match("11=2"));
    }

    #[test]
    fn unterminated_quote_runs_to_end() {
        let re = full_match_regex("\\Q*star").unwrap();
        assert!(re.is_match("*star"));
    }

    #[test]
    fn bad_pattern_is_reported() {
        let err = full_match_regex("(unclosed").unwrap_err();
        assert!(matches!(err, QueryError::Pattern { .. }));
    }
}
