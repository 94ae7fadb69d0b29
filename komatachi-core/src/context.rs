//! Context window selection
//!
//! Pure selection of a contiguous transcript tail under a token budget.
//! Coherence outweighs density: a large message is never skipped to admit an
//! older small one.

use crate::types::Message;

/// Report on the prefix that did not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overflow {
    pub dropped_count: usize,
    pub estimated_dropped_tokens: u64,
}

/// Result of a selection pass. `selected` is always a suffix of the input.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    pub selected: &'a [Message],
    pub overflow: Option<Overflow>,
}

/// Select the longest message suffix whose estimated tokens fit `budget`.
///
/// Walks from the most-recent end accumulating estimates and stops before the
/// first message that would exceed the budget. A single message larger than
/// the whole budget yields an empty selection; forcing inclusion is the
/// caller's policy, not the selector's.
pub fn select_messages<'a, F>(messages: &'a [Message], budget: u64, estimate: F) -> Selection<'a>
where
    F: Fn(&Message) -> u64,
{
    let mut used = 0u64;
    let mut start = messages.len();

    for (index, message) in messages.iter().enumerate().rev() {
        let cost = estimate(message);
        if used + cost > budget {
            break;
        }
        used += cost;
        start = index;
    }

    if start == 0 {
        return Selection {
            selected: messages,
            overflow: None,
        };
    }

    let dropped = &messages[..start];
    Selection {
        selected: &messages[start..],
        overflow: Some(Overflow {
            dropped_count: dropped.len(),
            estimated_dropped_tokens: dropped.iter().map(&estimate).sum(),
        }),
    }
}
