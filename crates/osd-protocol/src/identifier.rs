//! Case-insensitive nick/channel identifiers (RFC 1459 casemapping).

use std::fmt;
use std::hash::{Hash, Hasher};

/// A nick, channel or comma-joined target list compared case-insensitively.
///
/// Keeps the original spelling for display; equality and hashing use the
/// RFC 1459 lowercase form, where `[]\~` fold to `{}|^`.
#[derive(Debug, Clone, Eq)]
pub struct Identifier {
    original: String,
    folded: String,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        let original = name.into();
        let folded = fold(&original);
        Self { original, folded }
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }

    pub fn folded(&self) -> &str {
        &self.folded
    }

    /// Channels start with one of the RFC 2811 channel prefixes.
    pub fn is_channel(&self) -> bool {
        self.original.starts_with(['#', '&', '+', '!'])
    }
}

fn fold(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'A'..='Z' => c.to_ascii_lowercase(),
            '[' => '{',
            ']' => '}',
            '\\' => '|',
            '~' => '^',
            _ => c,
        })
        .collect()
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Hash for Identifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
