use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::debug;

use super::{FetchError, MessageStrategy};
use crate::platform::{ChannelInfo, MessageFilter, MessageQuery, MessageStream, PlatformClient};
use crate::store::MediaStore;

/// Turns a strategy and a limit into a message stream for one channel.
pub struct MessageFetcher {
    platform: Arc<dyn PlatformClient>,
    store: Arc<dyn MediaStore>,
    strategy: MessageStrategy,
    limit: Option<usize>,
}

impl MessageFetcher {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        store: Arc<dyn MediaStore>,
        strategy: MessageStrategy,
        limit: Option<usize>,
    ) -> Self {
        Self {
            platform,
            store,
            strategy,
            limit,
        }
    }

    pub fn strategy(&self) -> MessageStrategy {
        self.strategy
    }

    /// Every call starts a fresh walk; the returned stream owns its cursor.
    pub async fn fetch(&self, channel: &ChannelInfo) -> Result<MessageStream, FetchError> {
        let base = MessageQuery {
            limit: self.limit,
            ..Default::default()
        };

        let query = match self.strategy {
            MessageStrategy::All => base,
            MessageStrategy::Oldest => return Err(FetchError::Unimplemented("oldest")),
            MessageStrategy::Db => {
                match self
                    .store
                    .last_seen_message_id(channel.id)
                    .map_err(FetchError::Store)?
                {
                    Some(last_seen) => MessageQuery {
                        min_id: Some(last_seen),
                        ..base
                    },
                    None => {
                        debug!(channel = %channel.title, "no watermark, fetching all");
                        base
                    }
                }
            }
            MessageStrategy::Before => {
                match self
                    .store
                    .earliest_seen_message_id(channel.id)
                    .map_err(FetchError::Store)?
                {
                    Some(earliest) => MessageQuery {
                        offset_id: Some(earliest),
                        ..base
                    },
                    None => {
                        debug!(channel = %channel.title, "no watermark, fetching all");
                        base
                    }
                }
            }
            MessageStrategy::Urls => MessageQuery {
                filter: Some(MessageFilter::Url),
                ..base
            },
            MessageStrategy::Videos => MessageQuery {
                filter: Some(MessageFilter::Video),
                ..base
            },
            MessageStrategy::Unread => {
                let unread = self.platform.unread_count(channel).await?;
                if unread == 0 {
                    return Ok(stream::empty().boxed());
                }
                MessageQuery {
                    limit: Some(unread as usize),
                    ..Default::default()
                }
            }
        };

        debug!(
            channel = %channel.title,
            strategy = %self.strategy,
            ?query,
            "fetching messages"
        );
        Ok(self.platform.iter_messages(channel, query))
    }
}
