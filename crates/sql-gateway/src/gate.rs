//! Statement gating.
//!
//! This is a surface-level keyword filter, not a SQL parser. It blocks
//! statement stacking, requires an allow-listed leading verb and rejects
//! deny-listed keywords. Values must still travel as bound parameters; the
//! filter does not make interpolated SQL safe.

/// How deny-listed keywords are matched inside the statement body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DenyMatch {
    /// Keyword must appear as a whole word (`truncated_at` does not match `truncate`).
    #[default]
    WholeWord,
    /// Any occurrence matches, including inside identifiers.
    Substring,
}

impl std::str::FromStr for DenyMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "word" | "whole-word" | "whole_word" => Ok(DenyMatch::WholeWord),
            "substring" | "contains" => Ok(DenyMatch::Substring),
            other => Err(format!("unknown deny match mode '{}'", other)),
        }
    }
}

/// The rule a rejected statement broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    MultipleStatements,
    VerbNotAllowed,
    DeniedKeyword(String),
}

impl Violation {
    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Violation::MultipleStatements => "multiple_statements",
            Violation::VerbNotAllowed => "verb_not_allowed",
            Violation::DeniedKeyword(_) => "denied_keyword",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    Rejected(Violation),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allowed)
    }
}

/// Allow-list / deny-list policy applied to every statement before execution.
#[derive(Debug, Clone)]
pub struct GatePolicy {
    allowed_verbs: Vec<String>,
    denied_keywords: Vec<String>,
    deny_match: DenyMatch,
}

impl GatePolicy {
    /// Build a policy. Entries are trimmed and lower-cased; empty entries are dropped.
    pub fn new<V, D>(allowed_verbs: V, denied_keywords: D, deny_match: DenyMatch) -> Self
    where
        V: IntoIterator,
        V::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        Self {
            allowed_verbs: clean_list(allowed_verbs),
            denied_keywords: clean_list(denied_keywords),
            deny_match,
        }
    }

    pub fn allowed_verbs(&self) -> &[String] {
        &self.allowed_verbs
    }

    pub fn denied_keywords(&self) -> &[String] {
        &self.denied_keywords
    }

    pub fn deny_match(&self) -> DenyMatch {
        self.deny_match
    }

    /// Decide whether `statement` may reach the database.
    ///
    /// Rules run in a fixed order and the first one violated wins:
    /// separator, then leading verb, then denied keywords.
    pub fn evaluate(&self, statement: &str) -> GateDecision {
        let normalized = normalize(statement);

        if normalized.contains(';') {
            return GateDecision::Rejected(Violation::MultipleStatements);
        }

        if !self
            .allowed_verbs
            .iter()
            .any(|verb| normalized.starts_with(verb.as_str()))
        {
            return GateDecision::Rejected(Violation::VerbNotAllowed);
        }

        if let Some(keyword) = self
            .denied_keywords
            .iter()
            .find(|kw| normalized.starts_with(kw.as_str()) || self.body_contains(&normalized, kw))
        {
            return GateDecision::Rejected(Violation::DeniedKeyword(keyword.clone()));
        }

        GateDecision::Allowed
    }

    /// Caller-facing message for a violation.
    pub fn message(&self, violation: &Violation) -> String {
        match violation {
            Violation::MultipleStatements => {
                "Forbidden: Multiple SQL statements are not allowed.".to_string()
            }
            Violation::VerbNotAllowed => format!(
                "Forbidden: Operation not allowed. Only {} are permitted.",
                self.allowed_verbs
                    .iter()
                    .map(|v| v.to_uppercase())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Violation::DeniedKeyword(kw) => format!(
                "Forbidden: Destructive operation '{}' is not allowed.",
                kw.to_uppercase()
            ),
        }
    }

    fn body_contains(&self, normalized: &str, keyword: &str) -> bool {
        match self.deny_match {
            DenyMatch::Substring => normalized.contains(keyword),
            DenyMatch::WholeWord => contains_word(normalized, keyword),
        }
    }
}

/// Comparison form of a statement. Never executed.
pub fn normalize(statement: &str) -> String {
    statement.trim().to_lowercase()
}

fn clean_list<I>(items: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.match_indices(word).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + word.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}
