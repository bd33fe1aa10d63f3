use regex::Regex;

/// Selects cache keys for invalidation.
#[derive(Debug, Clone)]
pub enum KeyPattern {
    /// Keys containing this text.
    Substring(String),
    /// Keys matching this regular expression anywhere.
    Regex(Regex),
}

impl KeyPattern {
    pub fn substring(text: impl Into<String>) -> Self {
        KeyPattern::Substring(text.into())
    }

    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(KeyPattern::Regex)
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Substring(text) => key.contains(text.as_str()),
            KeyPattern::Regex(re) => re.is_match(key),
        }
    }
}

impl From<&str> for KeyPattern {
    fn from(text: &str) -> Self {
        KeyPattern::substring(text)
    }
}

impl From<Regex> for KeyPattern {
    fn from(re: Regex) -> Self {
        KeyPattern::Regex(re)
    }
}
