use helpdesk_platforms::PlatformError;
use thiserror::Error;
use uuid::Uuid;

/// Why one channel's sync did not succeed.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("channel configuration error: {0}")]
    Configuration(#[from] PlatformError),

    /// One or more list calls failed; the other feeds were still processed.
    #[error("{}", .0.join("; "))]
    FeedsFailed(Vec<String>),

    #[error("channel config not found: {0}")]
    ChannelNotFound(Uuid),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// No usable channel config for the ticket's brand and channel type,
    /// or the config could not produce a client.
    #[error("channel configuration error: {0}")]
    Configuration(String),

    /// The ticket lacks the identifier its reply route addresses.
    #[error("ticket {ticket_id} has no {field} to reply to")]
    MissingTarget { ticket_id: Uuid, field: &'static str },

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<PlatformError> for DispatchError {
    fn from(err: PlatformError) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Failures of the local half of a reply. Remote delivery problems are
/// never errors; they come back as a `DeliveryReport` warning.
#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("ticket not found: {0}")]
    TicketNotFound(Uuid),

    #[error("reply message is empty")]
    EmptyMessage,

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}
