//! Message segmentation.
//!
//! Short messages are packed onto one line separated by [`MESSAGE_PADDING`].
//! A message too long for a line of its own is broken at the last space that
//! fits, and a word longer than a whole line is cut at the last UTF-8
//! character boundary that fits. All sizes are encoded byte lengths.

use std::fmt;
use std::ops::Deref;

use crate::budget::FrameBudget;
use crate::{Result, SplitError};

/// Separator inserted between packed messages.
pub const MESSAGE_PADDING: &str = "    ";

/// One frame's worth of text. Only [`segment`] builds these, so a chunk is
/// always within the budget it was produced under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk(String);

impl Chunk {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Deref for Chunk {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for Chunk {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Split `messages` into chunks of at most `budget` bytes each.
///
/// Empty messages contribute nothing. The trailing piece of a long message
/// stays open, so the next short message may be packed onto it.
pub fn segment<S: AsRef<str>>(messages: &[S], budget: FrameBudget) -> Result<Vec<Chunk>> {
    let max = budget.usable()?;
    let mut lines: Vec<String> = Vec::new();

    for message in messages {
        let message = message.as_ref();
        if message.is_empty() {
            continue;
        }

        if let Some(last) = lines.last_mut() {
            if last.len() + MESSAGE_PADDING.len() + message.len() <= max {
                last.push_str(MESSAGE_PADDING);
                last.push_str(message);
                continue;
            }
        }

        split_into(message, max, &mut lines)?;
    }

    tracing::trace!(budget = max, chunks = lines.len(), "segmented messages");
    Ok(lines.into_iter().map(Chunk).collect())
}

/// Append `message` to `out` as one or more lines of at most `max` bytes.
fn split_into(message: &str, max: usize, out: &mut Vec<String>) -> Result<()> {
    let mut rest = message;

    while rest.len() > max {
        let cut = floor_char_boundary(rest, max);
        if cut == 0 {
            let width = rest.chars().next().map_or(0, char::len_utf8);
            return Err(SplitError::CharacterExceedsBudget { width, budget: max });
        }

        // A space right after the fitting prefix is as good as one inside it
        let window = if rest.as_bytes()[cut] == b' ' {
            &rest[..=cut]
        } else {
            &rest[..cut]
        };

        match window.rfind(' ') {
            Some(space) if space > 0 => {
                out.push(rest[..space].to_string());
                rest = &rest[space + 1..];
            }
            _ => {
                out.push(rest[..cut].to_string());
                rest = &rest[cut..];
            }
        }
    }

    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    Ok(())
}

/// Largest char boundary in `s` that is `<= index`.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    (0..=index).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}
