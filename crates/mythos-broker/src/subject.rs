//! Subject grammar and wildcard matching.

use mythos_common::BrokerError;
use std::fmt;

/// A validated, dot-separated subject such as `chat.say.room.42` or a
/// subscription pattern such as `chat.say.room.*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subject {
    tokens: Vec<String>,
}

impl Subject {
    /// Builds a `Subject` from raw tokens without grammar validation, for
    /// callers that have disabled subject validation entirely.
    pub(crate) fn from_unchecked_tokens(raw: &str) -> Self {
        Self {
            tokens: raw.split('.').map(str::to_string).collect(),
        }
    }
}

impl Subject {
    /// Validates and parses a subject or subscription pattern.
    ///
    /// Rejects: empty subjects, more than two wildcards, all-wildcard
    /// subjects, subjects starting with a wildcard, and tokens that are not
    /// alphanumeric/`-`/`_` (wildcard tokens `*` and `>` excepted).
    pub fn parse(raw: &str) -> Result<Self, BrokerError> {
        if raw.is_empty() {
            return Err(BrokerError::InvalidSubject(
                "subject must not be empty".into(),
            ));
        }

        let tokens: Vec<String> = raw.split('.').map(str::to_string).collect();

        if tokens.iter().any(String::is_empty) {
            return Err(BrokerError::InvalidSubject(
                "subject must not contain empty tokens".into(),
            ));
        }

        let wildcard_count = tokens.iter().filter(|t| t.as_str() == "*" || t.as_str() == ">").count();
        if wildcard_count > 2 {
            return Err(BrokerError::InvalidSubject(
                "subject must not contain more than two wildcards".into(),
            ));
        }

        if wildcard_count == tokens.len() {
            return Err(BrokerError::InvalidSubject(
                "subject must not be entirely wildcards".into(),
            ));
        }

        if matches!(tokens[0].as_str(), "*" | ">") {
            return Err(BrokerError::InvalidSubject(
                "subject must not start with a wildcard".into(),
            ));
        }

        for (i, token) in tokens.iter().enumerate() {
            if token == "*" {
                continue;
            }
            if token == ">" {
                if i != tokens.len() - 1 {
                    return Err(BrokerError::InvalidSubject(
                        "'>' wildcard must be the terminal token".into(),
                    ));
                }
                continue;
            }
            if !token.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
                return Err(BrokerError::InvalidSubject(format!(
                    "invalid token '{token}': must be alphanumeric, '-', or '_'"
                )));
            }
        }

        Ok(Self { tokens })
    }

    /// `true` if a concrete subject matches a subscription pattern.
    /// `*` matches exactly one token; `>` matches one-or-more trailing
    /// tokens and must be terminal.
    pub fn matches(&self, pattern: &Subject) -> bool {
        let mut s = self.tokens.iter();
        let mut p = pattern.tokens.iter();

        loop {
            match (p.next(), s.next()) {
                (Some(pt), Some(st)) if pt == ">" => {
                    let _ = st;
                    return true;
                }
                (Some(pt), Some(_)) if pt == "*" => continue,
                (Some(pt), Some(st)) => {
                    if pt != st {
                        return false;
                    }
                }
                (None, None) => return true,
                _ => return false,
            }
        }
    }

    pub fn as_str(&self) -> String {
        self.tokens.join(".")
    }

    pub fn prefix(&self, depth: usize) -> String {
        self.tokens
            .iter()
            .take(depth.max(1))
            .cloned()
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_subjects() {
        for s in [
            "chat.say.room.42",
            "events.player.hp_changed",
            "admin.broadcast",
            "chat.global",
        ] {
            assert!(Subject::parse(s).is_ok(), "expected {s} to be valid");
        }
    }

    #[test]
    fn accepts_well_formed_patterns() {
        for s in ["chat.say.room.*", "events.>", "chat.*.room.42"] {
            assert!(Subject::parse(s).is_ok(), "expected {s} to be valid");
        }
    }

    #[test]
    fn rejects_empty_subject() {
        assert!(Subject::parse("").is_err());
    }

    #[test]
    fn rejects_more_than_two_wildcards() {
        assert!(Subject::parse("a.*.b.*.c.*").is_err());
    }

    #[test]
    fn rejects_all_wildcard_subjects() {
        for s in ["*", "*.*", "*.*.*"] {
            assert!(Subject::parse(s).is_err(), "expected {s} to be rejected");
        }
    }

    #[test]
    fn rejects_leading_wildcard() {
        assert!(Subject::parse("*.chat.say").is_err());
    }

    #[test]
    fn rejects_non_alphanumeric_tokens() {
        assert!(Subject::parse("chat.say!.room").is_err());
    }

    #[test]
    fn star_matches_single_token() {
        let subject = Subject::parse("chat.say.room.42").unwrap();
        let pattern = Subject::parse("chat.say.room.*").unwrap();
        assert!(subject.matches(&pattern));

        let too_deep = Subject::parse("chat.say.room.42.extra").unwrap();
        assert!(!too_deep.matches(&pattern));
    }

    #[test]
    fn terminal_gt_matches_one_or_more_trailing_tokens() {
        let pattern = Subject::parse("events.>").unwrap();
        assert!(Subject::parse("events.player.hp_changed").unwrap().matches(&pattern));
        assert!(Subject::parse("events.room.42.xp_changed").unwrap().matches(&pattern));
        assert!(!Subject::parse("chat.say.room.1").unwrap().matches(&pattern));
    }

    proptest::proptest! {
        #[test]
        fn any_wildcard_free_subject_matches_itself_as_a_pattern(
            tokens in proptest::collection::vec("[a-zA-Z][a-zA-Z0-9_-]{0,7}", 1..6),
        ) {
            let raw = tokens.join(".");
            let subject = Subject::parse(&raw).unwrap();
            proptest::prop_assert!(subject.matches(&subject));
        }

        #[test]
        fn a_trailing_gt_pattern_matches_any_subject_sharing_its_prefix(
            prefix in proptest::collection::vec("[a-zA-Z][a-zA-Z0-9_-]{0,7}", 1..4),
            suffix in proptest::collection::vec("[a-zA-Z][a-zA-Z0-9_-]{0,7}", 1..4),
        ) {
            let pattern = Subject::parse(&format!("{}.>", prefix.join("."))).unwrap();
            let subject = Subject::parse(&format!("{}.{}", prefix.join("."), suffix.join("."))).unwrap();
            proptest::prop_assert!(subject.matches(&pattern));
        }
    }
}
