use crate::ida::model::Event;
use async_trait::async_trait;

/// Delivers new events to people
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns an identifier of the sent message
    async fn notify(&self, events: &[Event]) -> Result<String, NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Invalid mail address '{address}': {source}")]
    InvalidAddress {
        address: String,
        source: lettre::address::AddressError,
    },
    #[error("Failed building the message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("Failed sending the message: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}
