use super::flows::FlowRouter;
use super::traits::{ChannelTransport, InboundEvent, MediaKind, MediaRef};
use crate::error::TransportError;
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

const LOCAL_USER: &str = "local";

/// Terminal transport for running the assistant without a messaging platform.
///
/// Media arrives as local file paths: `@imagen <ruta> [pregunta]` and
/// `@audio <ruta>` stand in for WhatsApp attachments. `save_media` copies the
/// referenced file into media storage so expiry timers reclaim the copy, never
/// the user's original.
pub struct StdioTransport {
    media_dir: PathBuf,
}

impl StdioTransport {
    #[must_use]
    pub fn new(media_dir: impl Into<PathBuf>) -> Self {
        Self {
            media_dir: media_dir.into(),
        }
    }
}

#[async_trait]
impl ChannelTransport for StdioTransport {
    async fn reply(&self, _user_id: &str, message: &str) -> Result<(), TransportError> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("iAro> {message}\n\n").as_bytes())
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
        stdout
            .flush()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
        Ok(())
    }

    async fn save_media(&self, media: &MediaRef) -> Result<PathBuf, TransportError> {
        let source = Path::new(&media.id);
        let file_name = source
            .file_name()
            .ok_or_else(|| TransportError::MediaSave(format!("not a file: {}", media.id)))?;

        tokio::fs::create_dir_all(&self.media_dir)
            .await
            .map_err(|e| TransportError::MediaSave(e.to_string()))?;

        let millis = chrono::Utc::now().timestamp_millis();
        let dest = self
            .media_dir
            .join(format!("{millis}-{}", file_name.to_string_lossy()));
        tokio::fs::copy(source, &dest)
            .await
            .map_err(|e| TransportError::MediaSave(e.to_string()))?;
        Ok(dest)
    }
}

fn parse_line(line: &str) -> Option<InboundEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(rest) = trimmed.strip_prefix("@imagen ") {
        let rest = rest.trim();
        let (path, caption) = match rest.split_once(char::is_whitespace) {
            Some((path, caption)) => (path, Some(caption.trim().to_string())),
            None => (rest, None),
        };
        return Some(InboundEvent::Media {
            user_id: LOCAL_USER.into(),
            media: MediaRef {
                id: path.to_string(),
                kind: MediaKind::Image,
            },
            caption,
        });
    }

    if let Some(rest) = trimmed.strip_prefix("@audio ") {
        return Some(InboundEvent::Media {
            user_id: LOCAL_USER.into(),
            media: MediaRef {
                id: rest.trim().to_string(),
                kind: MediaKind::Voice,
            },
            caption: None,
        });
    }

    Some(InboundEvent::Text {
        user_id: LOCAL_USER.into(),
        text: trimmed.to_string(),
    })
}

/// Read-eval loop over stdin. Returns on EOF or Ctrl-C.
pub async fn run(router: &FlowRouter, media_dir: &Path) -> Result<()> {
    let transport = StdioTransport::new(media_dir);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    info!("stdio channel ready");
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if let Some(event) = parse_line(&line) {
                    router.dispatch(&transport, event).await?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break;
            }
        }
    }
    Ok(())
}
