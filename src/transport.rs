//! Messaging-transport abstractions and the domain types that cross them.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::probe::MediaMetadata;

/// Identity of a requesting user; key of the session registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the chat a conversation happens in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatRef(pub i64);

impl fmt::Display for ChatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a message the bot can later edit or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    /// Chat the message lives in.
    pub chat: ChatRef,
    /// Message id within that chat.
    pub id: i32,
}

/// What kind of inbound item carried the media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// A native video message.
    Video,
    /// A document attachment that happens to hold video data.
    Document,
}

/// A remote media payload the transport can fetch.
#[derive(Debug, Clone)]
pub struct InboundMedia {
    /// Transport-scoped identifier of the remote file.
    pub file_id: String,
    /// Total size in bytes as reported by the transport.
    pub file_size: u64,
}

/// One qualifying user submission, as handed to the session controller.
#[derive(Debug, Clone)]
pub struct MediaSubmission {
    /// Who submitted the media.
    pub user: UserId,
    /// Where to converse about it.
    pub chat: ChatRef,
    /// The originating message; deleted after a successful download.
    pub message: MessageRef,
    /// The payload to fetch.
    pub media: InboundMedia,
    /// Whether the payload arrived as a video or a document.
    pub kind: MediaKind,
    /// Original file name of the payload.
    pub file_name: String,
    /// Caption text the user attached to the submission, if any.
    pub caption: Option<String>,
}

impl MediaSubmission {
    /// Caption for the re-uploaded video: the original file name, plus the
    /// user's own caption when one was attached.
    #[must_use]
    pub fn upload_caption(&self) -> String {
        match &self.caption {
            Some(caption) => format!("{}\n\n{caption}", self.file_name),
            None => self.file_name.clone(),
        }
    }
}

/// A processed video ready to be sent back to the user.
#[derive(Debug, Clone)]
pub struct VideoUpload {
    /// Local path of the downloaded source file.
    pub path: PathBuf,
    /// Probed metadata attached to the upload.
    pub metadata: MediaMetadata,
    /// Caption text for the outgoing message.
    pub caption: String,
    /// Optional thumbnail image to attach.
    pub thumbnail: Option<PathBuf>,
}

/// Trait for receiving transfer progress updates.
///
/// `on_chunk` is invoked at every chunk boundary with the cumulative byte
/// count; implementations must be cheap and non-blocking.
pub trait TransferObserver: Send + Sync {
    /// Called after each chunk of a transfer with cumulative progress.
    fn on_chunk(&self, _transferred: u64, _total: u64) {}
}

/// A null observer that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoObserver;

impl TransferObserver for NoObserver {}

impl<F: Fn(u64, u64) + Send + Sync> TransferObserver for F {
    fn on_chunk(&self, transferred: u64, total: u64) {
        self(transferred, total);
    }
}

/// The messaging service the sessions converse over.
///
/// Download and upload are the long-running operations; both report through
/// a [`TransferObserver`] and abort when the supplied token fires, returning
/// [`crate::Error::Cancelled`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Streams a remote media payload into `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer fails or is cancelled.
    async fn download_media(
        &self,
        media: &InboundMedia,
        dest: &Path,
        observer: Arc<dyn TransferObserver>,
        cancel: CancellationToken,
    ) -> Result<()>;

    /// Sends a local video file back to `chat` with streaming playback
    /// enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer fails or is cancelled.
    async fn upload_video(
        &self,
        chat: ChatRef,
        upload: &VideoUpload,
        observer: Arc<dyn TransferObserver>,
        cancel: CancellationToken,
    ) -> Result<()>;

    /// Sends a text message, optionally quoting `reply_to`.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be sent.
    async fn send_text(
        &self,
        chat: ChatRef,
        text: &str,
        reply_to: Option<MessageRef>,
    ) -> Result<MessageRef>;

    /// Rewrites a previously sent message in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the edit is rejected; call sites treat this as
    /// best-effort.
    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<()>;

    /// Deletes a previously sent message.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion is rejected; call sites treat this
    /// as best-effort.
    async fn delete_message(&self, message: MessageRef) -> Result<()>;
}
