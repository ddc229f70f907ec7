//! Logical routing destinations for opportunities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed enum of routing channels (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Sports,
    Weather,
    Economics,
    Mentions,
    Entertainment,
    Health,
    Politics,
    Crypto,
    Digest,
    Status,
}

impl Channel {
    /// All channels, for sink-registry iteration and tests.
    pub const ALL: [Channel; 10] = [
        Channel::Sports,
        Channel::Weather,
        Channel::Economics,
        Channel::Mentions,
        Channel::Entertainment,
        Channel::Health,
        Channel::Politics,
        Channel::Crypto,
        Channel::Digest,
        Channel::Status,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sports => "sports",
            Channel::Weather => "weather",
            Channel::Economics => "economics",
            Channel::Mentions => "mentions",
            Channel::Entertainment => "entertainment",
            Channel::Health => "health",
            Channel::Politics => "politics",
            Channel::Crypto => "crypto",
            Channel::Digest => "digest",
            Channel::Status => "status",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_channels_have_distinct_names() {
        let names: std::collections::HashSet<_> =
            Channel::ALL.iter().map(Channel::as_str).collect();
        assert_eq!(names.len(), Channel::ALL.len());
    }
}
