use crate::error::TransportError;
use async_trait::async_trait;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Voice,
}

/// Opaque handle to an inbound attachment. The transport owns the bytes
/// until `save_media` writes them to local storage.
#[derive(Debug, Clone)]
pub struct MediaRef {
    pub id: String,
    pub kind: MediaKind,
}

/// An inbound chat event as delivered by the embedding bot framework.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Text {
        user_id: String,
        text: String,
    },
    Media {
        user_id: String,
        media: MediaRef,
        caption: Option<String>,
    },
}

/// Messaging-platform boundary. The flows never initiate transport I/O
/// beyond these two primitives.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Send a message back to the user.
    async fn reply(&self, user_id: &str, message: &str) -> Result<(), TransportError>;

    /// Persist the inbound attachment under local media storage and return
    /// its path.
    async fn save_media(&self, media: &MediaRef) -> Result<PathBuf, TransportError>;
}
