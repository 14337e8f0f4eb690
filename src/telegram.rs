//! Telegram Bot API bindings: the [`Transport`] implementation backed by
//! teloxide, update routing, and the long-polling dispatcher.

use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use teloxide::dispatching::DpHandlerDescription;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId};
use teloxide::{ApiError, RequestError};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::commands::{self, Command};
use crate::error::{Error, Result};
use crate::session::SessionController;
use crate::transport::{
    ChatRef, InboundMedia, MediaKind, MediaSubmission, MessageRef, TransferObserver, Transport,
    UserId, VideoUpload,
};

// ============================================================================
// Transport implementation
// ============================================================================

/// [`Transport`] backed by the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn download_media(
        &self,
        media: &InboundMedia,
        dest: &Path,
        observer: Arc<dyn TransferObserver>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let file = self.bot.get_file(media.file_id.clone()).await?;
        let out = tokio::fs::File::create(dest).await?;
        let mut writer = CountingWriter::new(out, observer, media.file_size);

        tokio::select! {
            result = self.bot.download_file(&file.path, &mut writer) => result?,
            () = cancel.cancelled() => return Err(Error::Cancelled),
        }

        writer.flush().await?;
        Ok(())
    }

    async fn upload_video(
        &self,
        chat: ChatRef,
        upload: &VideoUpload,
        observer: Arc<dyn TransferObserver>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let size = tokio::fs::metadata(&upload.path).await?.len();

        let mut request = self
            .bot
            .send_video(ChatId(chat.0), InputFile::file(upload.path.clone()))
            .duration(upload.metadata.duration_secs)
            .width(upload.metadata.width)
            .height(upload.metadata.height)
            .caption(upload.caption.clone())
            .supports_streaming(true);
        if let Some(thumbnail) = &upload.thumbnail {
            request = request.thumb(InputFile::file(thumbnail.clone()));
        }

        tokio::select! {
            result = request.send() => { result?; }
            () = cancel.cancelled() => return Err(Error::Cancelled),
        }

        // The Bot API exposes no byte-level upload hooks, so progress is
        // only reported at completion.
        observer.on_chunk(size, size);
        Ok(())
    }

    async fn send_text(
        &self,
        chat: ChatRef,
        text: &str,
        reply_to: Option<MessageRef>,
    ) -> Result<MessageRef> {
        let mut request = self.bot.send_message(ChatId(chat.0), text.to_string());
        if let Some(reply) = reply_to {
            request = request.reply_to_message_id(MessageId(reply.id));
        }
        let message = request.await?;
        Ok(MessageRef {
            chat: ChatRef(message.chat.id.0),
            id: message.id.0,
        })
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<()> {
        let request = self.bot.edit_message_text(
            ChatId(message.chat.0),
            MessageId(message.id),
            text.to_string(),
        );
        match request.await {
            Ok(_) => Ok(()),
            // Re-sending identical text is harmless.
            Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_message(&self, message: MessageRef) -> Result<()> {
        self.bot
            .delete_message(ChatId(message.chat.0), MessageId(message.id))
            .await?;
        Ok(())
    }
}

/// Wraps an [`AsyncWrite`] and reports the running byte count to a
/// [`TransferObserver`] after every write.
struct CountingWriter<W> {
    inner: W,
    observer: Arc<dyn TransferObserver>,
    transferred: u64,
    total: u64,
}

impl<W> CountingWriter<W> {
    fn new(inner: W, observer: Arc<dyn TransferObserver>, total: u64) -> Self {
        Self {
            inner,
            observer,
            transferred: 0,
            total,
        }
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for CountingWriter<W> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.as_mut().get_mut();
        match Pin::new(&mut this.inner).poll_write(cx, buf) {
            Poll::Ready(Ok(written)) => {
                this.transferred += written as u64;
                this.observer.on_chunk(this.transferred, this.total);
                Poll::Ready(Ok(written))
            }
            other => other,
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.as_mut().get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.as_mut().get_mut().inner).poll_shutdown(cx)
    }
}

// ============================================================================
// Update routing
// ============================================================================

/// Shared services injected into every handler invocation.
#[derive(Clone)]
pub struct BotServices {
    pub controller: Arc<SessionController>,
}

impl BotServices {
    #[must_use]
    pub const fn new(controller: Arc<SessionController>) -> Self {
        Self { controller }
    }
}

/// Builds the dptree handler for incoming updates.
#[must_use]
pub fn build_handler() -> Handler<'static, DependencyMap, Result<()>, DpHandlerDescription> {
    dptree::entry().branch(Update::filter_message().endpoint(on_message))
}

/// Runs the long-polling dispatcher until the process is interrupted.
pub async fn run_dispatcher(bot: Bot, services: BotServices) {
    Dispatcher::builder(bot, build_handler())
        .dependencies(dptree::deps![services])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn on_message(bot: Bot, services: BotServices, msg: Message) -> Result<()> {
    if let Some(text) = msg.text()
        && let Some(command) = commands::parse(text)
    {
        return handle_command(&bot, &services, &msg, command).await;
    }

    if let Some(submission) = extract_submission(&msg) {
        let controller = Arc::clone(&services.controller);
        // Sessions run for minutes; detach so the dispatcher keeps
        // consuming updates (including /cancel for this very session).
        tokio::spawn(async move {
            controller.run(submission).await;
        });
    }

    Ok(())
}

async fn handle_command(
    bot: &Bot,
    services: &BotServices,
    msg: &Message,
    command: Command,
) -> Result<()> {
    match command {
        Command::Start => {
            bot.send_message(msg.chat.id, commands::START_TEXT).await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, commands::HELP_TEXT).await?;
        }
        Command::Cancel => {
            if let Some(from) = msg.from() {
                services
                    .controller
                    .cancel(UserId(from.id.0), ChatRef(msg.chat.id.0))
                    .await;
            }
        }
    }
    Ok(())
}

/// Maps an incoming message onto a [`MediaSubmission`], if it carries media
/// this bot handles. Videos are always accepted; documents must carry a
/// file name so the extension gate has something to inspect.
fn extract_submission(msg: &Message) -> Option<MediaSubmission> {
    let from = msg.from()?;

    let (media, kind, file_name) = if let Some(video) = msg.video() {
        let name = video
            .file_name
            .clone()
            .unwrap_or_else(default_video_name);
        (
            InboundMedia {
                file_id: video.file.id.clone(),
                file_size: u64::from(video.file.size),
            },
            MediaKind::Video,
            name,
        )
    } else if let Some(document) = msg.document() {
        let name = document.file_name.clone()?;
        (
            InboundMedia {
                file_id: document.file.id.clone(),
                file_size: u64::from(document.file.size),
            },
            MediaKind::Document,
            name,
        )
    } else {
        return None;
    };

    Some(MediaSubmission {
        user: UserId(from.id.0),
        chat: ChatRef(msg.chat.id.0),
        message: MessageRef {
            chat: ChatRef(msg.chat.id.0),
            id: msg.id.0,
        },
        media,
        kind,
        file_name,
        caption: msg.caption().map(ToString::to_string),
    })
}

/// Fallback name for videos Telegram delivers without one.
fn default_video_name() -> String {
    format!("video-{}.mp4", chrono::Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_from_json(json: &str) -> Message {
        serde_json::from_str(json).expect("message fixture should deserialize")
    }

    #[test]
    fn video_message_becomes_a_submission() {
        let msg = message_from_json(
            r#"{
                "message_id": 11,
                "date": 1700000000,
                "chat": {"id": 77, "type": "private", "first_name": "Ada"},
                "from": {"id": 7, "is_bot": false, "first_name": "Ada"},
                "video": {
                    "file_id": "vid-1",
                    "file_unique_id": "u1",
                    "width": 1280,
                    "height": 720,
                    "duration": 120,
                    "file_name": "movie.mp4",
                    "mime_type": null,
                    "file_size": 2048
                },
                "caption": "check this out"
            }"#,
        );

        let submission = extract_submission(&msg).expect("video should be accepted");
        assert_eq!(submission.user, UserId(7));
        assert_eq!(submission.chat, ChatRef(77));
        assert_eq!(submission.message.id, 11);
        assert_eq!(submission.kind, MediaKind::Video);
        assert_eq!(submission.file_name, "movie.mp4");
        assert_eq!(submission.media.file_id, "vid-1");
        assert_eq!(submission.media.file_size, 2048);
        assert_eq!(submission.caption.as_deref(), Some("check this out"));
    }

    #[test]
    fn unnamed_video_gets_a_generated_name() {
        let msg = message_from_json(
            r#"{
                "message_id": 12,
                "date": 1700000000,
                "chat": {"id": 77, "type": "private", "first_name": "Ada"},
                "from": {"id": 7, "is_bot": false, "first_name": "Ada"},
                "video": {
                    "file_id": "vid-2",
                    "file_unique_id": "u2",
                    "width": 640,
                    "height": 360,
                    "duration": 5,
                    "mime_type": null,
                    "file_size": 512
                }
            }"#,
        );

        let submission = extract_submission(&msg).expect("video should be accepted");
        assert!(submission.file_name.starts_with("video-"));
        assert!(submission.file_name.ends_with(".mp4"));
        assert!(submission.caption.is_none());
    }

    #[test]
    fn named_document_becomes_a_submission() {
        let msg = message_from_json(
            r#"{
                "message_id": 13,
                "date": 1700000000,
                "chat": {"id": 77, "type": "private", "first_name": "Ada"},
                "from": {"id": 7, "is_bot": false, "first_name": "Ada"},
                "document": {
                    "file_id": "doc-1",
                    "file_unique_id": "u3",
                    "file_name": "clip.mkv",
                    "file_size": 4096
                }
            }"#,
        );

        let submission = extract_submission(&msg).expect("named document should be accepted");
        assert_eq!(submission.kind, MediaKind::Document);
        assert_eq!(submission.file_name, "clip.mkv");
        assert_eq!(submission.media.file_size, 4096);
    }

    #[test]
    fn unnamed_document_is_ignored() {
        let msg = message_from_json(
            r#"{
                "message_id": 14,
                "date": 1700000000,
                "chat": {"id": 77, "type": "private", "first_name": "Ada"},
                "from": {"id": 7, "is_bot": false, "first_name": "Ada"},
                "document": {
                    "file_id": "doc-2",
                    "file_unique_id": "u4",
                    "file_size": 4096
                }
            }"#,
        );

        assert!(extract_submission(&msg).is_none());
    }

    #[test]
    fn text_message_is_ignored() {
        let msg = message_from_json(
            r#"{
                "message_id": 15,
                "date": 1700000000,
                "chat": {"id": 77, "type": "private", "first_name": "Ada"},
                "from": {"id": 7, "is_bot": false, "first_name": "Ada"},
                "text": "/start"
            }"#,
        );

        assert!(extract_submission(&msg).is_none());
    }
}
