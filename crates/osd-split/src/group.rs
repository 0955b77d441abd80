//! Destination grouping.

use std::fmt;
use std::num::NonZeroUsize;

use osd_protocol::Identifier;

use crate::{Result, SplitError};

/// Targets as handed in by a caller: one name, a comma-separated string, or
/// a list. Normalized lazily by [`Destinations::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Destinations(Vec<String>);

impl Destinations {
    /// Flatten into individual target names. Comma-separated entries are
    /// split and blank names dropped; nothing left is an error.
    pub fn resolve(&self) -> Result<Vec<String>> {
        let targets: Vec<String> = self
            .0
            .iter()
            .flat_map(|entry| entry.split(','))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        if targets.is_empty() {
            return Err(SplitError::InvalidDestinations);
        }
        Ok(targets)
    }
}

impl From<&str> for Destinations {
    fn from(s: &str) -> Self {
        Self(vec![s.to_string()])
    }
}

impl From<String> for Destinations {
    fn from(s: String) -> Self {
        Self(vec![s])
    }
}

impl From<Vec<String>> for Destinations {
    fn from(v: Vec<String>) -> Self {
        Self(v)
    }
}

impl From<Vec<&str>> for Destinations {
    fn from(v: Vec<&str>) -> Self {
        Self(v.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Destinations {
    fn from(v: &[&str]) -> Self {
        Self(v.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Destinations {
    fn from(v: [&str; N]) -> Self {
        Self(v.iter().map(|s| s.to_string()).collect())
    }
}

/// Targets addressed together by one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationGroup {
    members: Vec<String>,
    rendered: String,
}

impl DestinationGroup {
    fn new(members: Vec<String>) -> Self {
        let rendered = members.join(",");
        Self { members, rendered }
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Comma-joined form used as the frame target.
    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// Encoded length of the frame target.
    pub fn byte_len(&self) -> usize {
        self.rendered.len()
    }

    /// Key for per-target flood state.
    pub fn identifier(&self) -> Identifier {
        Identifier::new(self.rendered.as_str())
    }
}

impl fmt::Display for DestinationGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// Split targets into groups of at most `max_targets`.
///
/// Groups are cut from the *tail* of the list: the first group holds the
/// last `max_targets` targets, the next group the ones before them, and so
/// on. Each group keeps the input's relative order. Callers that deliver
/// groups in order therefore reach the end of the list first; existing
/// deployments depend on this, so keep it.
pub fn group(
    destinations: impl Into<Destinations>,
    max_targets: NonZeroUsize,
) -> Result<Vec<DestinationGroup>> {
    let mut remaining = destinations.into().resolve()?;
    let max = max_targets.get();

    let mut groups = Vec::with_capacity(remaining.len().div_ceil(max));
    while !remaining.is_empty() {
        let start = remaining.len().saturating_sub(max);
        let members: Vec<String> = remaining.drain(start..).collect();
        groups.push(DestinationGroup::new(members));
    }
    Ok(groups)
}
