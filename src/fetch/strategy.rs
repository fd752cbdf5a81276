use std::fmt;
use std::str::FromStr;

use super::FetchError;

/// Which subset of a channel's history one run walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStrategy {
    /// Newest first, bounded by the run limit.
    All,
    /// Oldest first. Not supported by the platform bridge yet.
    Oldest,
    /// Newer than the last ingested message of the channel.
    Db,
    /// Older than the earliest ingested message of the channel.
    Before,
    Urls,
    Videos,
    /// Exactly the platform's unread count.
    Unread,
}

impl MessageStrategy {
    pub const ALL: [MessageStrategy; 7] = [
        MessageStrategy::All,
        MessageStrategy::Oldest,
        MessageStrategy::Db,
        MessageStrategy::Before,
        MessageStrategy::Urls,
        MessageStrategy::Videos,
        MessageStrategy::Unread,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStrategy::All => "all",
            MessageStrategy::Oldest => "oldest",
            MessageStrategy::Db => "db",
            MessageStrategy::Before => "before",
            MessageStrategy::Urls => "urls",
            MessageStrategy::Videos => "videos",
            MessageStrategy::Unread => "unread",
        }
    }
}

impl FromStr for MessageStrategy {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| FetchError::UnknownStrategy(s.to_string()))
    }
}

impl fmt::Display for MessageStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
