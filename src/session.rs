//! The per-user conversion session state machine.
//!
//! One session walks Downloading, Processing, Uploading, then Cleanup.
//! Cancellation fires the session's token, aborting an in-flight transfer,
//! and evicts the registry entry; the controller re-checks the registry
//! between phases so a cancel landing outside a transfer still stops the
//! pipeline before the next phase starts.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::SessionConfig;
use crate::error::Error;
use crate::format::format_duration;
use crate::probe::MetadataProbe;
use crate::progress::StatusReporter;
use crate::registry::SessionRegistry;
use crate::thumbnail::ThumbnailGenerator;
use crate::transport::{
    ChatRef, MediaKind, MediaSubmission, MessageRef, Transport, UserId, VideoUpload,
};

const STATUS_DOWNLOADING: &str = "Downloading your video...";
const STATUS_PROCESSING: &str = "Processing your video...";
const STATUS_UPLOADING: &str = "Uploading the converted video...";
const DOWNLOAD_HEADLINE: &str = "Downloading...";
const UPLOAD_HEADLINE: &str = "Uploading...";
const DOWNLOAD_FAILED: &str = "Failed to download the video.";
const UPLOAD_FAILED: &str = "Failed to upload the video.";
const CANCEL_CONFIRMED: &str = "Process canceled.";
const NOTHING_TO_CANCEL: &str = "You have no active process to cancel.";
const ALREADY_ACTIVE: &str =
    "You already have an active process. Please wait for it to complete or use /cancel.";
const UNSUPPORTED_TYPE: &str = "Unsupported file type. Send me a video file and I will do the rest.";

/// Terminal state of one session attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The converted video was delivered and all artifacts were removed.
    Completed,
    /// Rejected on admission: the user already had a session in flight.
    AlreadyActive,
    /// Rejected on admission: the file type is not a recognized video.
    Unsupported,
    /// The user cancelled while the session was in flight.
    Cancelled,
    /// The download failed; the user has to resubmit.
    DownloadFailed,
    /// The upload failed; the user has to resubmit.
    UploadFailed,
}

/// Drives conversion sessions: admission, the download/process/upload
/// pipeline, cancellation, and artifact cleanup.
///
/// All collaborators are injected, so tests can run whole sessions against
/// in-memory stand-ins.
pub struct SessionController {
    transport: Arc<dyn Transport>,
    probe: MetadataProbe,
    thumbnails: ThumbnailGenerator,
    registry: SessionRegistry,
    config: SessionConfig,
}

impl SessionController {
    /// Creates a controller over the given collaborators.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        probe: MetadataProbe,
        thumbnails: ThumbnailGenerator,
        registry: SessionRegistry,
        config: SessionConfig,
    ) -> Self {
        Self {
            transport,
            probe,
            thumbnails,
            registry,
            config,
        }
    }

    /// Runs one submission through the whole pipeline.
    ///
    /// Admission failures reply to the user and leave no state behind. A
    /// failed transfer rewrites the status display to a failure note and
    /// releases the session; a cancelled transfer leaves the display to the
    /// cancel handler. Local artifacts are removed on every exit path that
    /// created any, and the registry slot comes free on every exit path,
    /// panics included.
    pub async fn run(&self, submission: MediaSubmission) -> SessionOutcome {
        let user = submission.user;

        // The guard frees the registry slot whenever it drops; after a
        // cancel eviction its drop is a no-op.
        let Some(guard) = self.registry.try_acquire(user) else {
            self.send_best_effort(submission.chat, ALREADY_ACTIVE).await;
            return SessionOutcome::AlreadyActive;
        };

        if submission.kind == MediaKind::Document
            && !self.config.accepts_extension(&submission.file_name)
        {
            drop(guard);
            self.send_best_effort(submission.chat, UNSUPPORTED_TYPE)
                .await;
            return SessionOutcome::Unsupported;
        }

        let cancel = guard.cancel_token().clone();
        let started = Instant::now();
        log::info!(
            "session started for user {user}: {} ({} bytes)",
            submission.file_name,
            submission.media.file_size
        );

        if let Err(e) = tokio::fs::create_dir_all(&self.config.download_dir).await {
            log::error!(
                "cannot create download directory {}: {e}",
                self.config.download_dir.display()
            );
            drop(guard);
            self.send_best_effort(submission.chat, DOWNLOAD_FAILED).await;
            return SessionOutcome::DownloadFailed;
        }

        let status = match self
            .transport
            .send_text(submission.chat, STATUS_DOWNLOADING, Some(submission.message))
            .await
        {
            Ok(status) => status,
            Err(e) => {
                log::error!("cannot create status display for user {user}: {e}");
                drop(guard);
                return SessionOutcome::DownloadFailed;
            }
        };
        self.registry.set_status(user, status);

        // Downloading.
        let dest = self.destination_path(&submission);
        let reporter = Arc::new(StatusReporter::new(
            Arc::clone(&self.transport),
            status,
            DOWNLOAD_HEADLINE,
        ));
        match self
            .transport
            .download_media(&submission.media, &dest, reporter, cancel.clone())
            .await
        {
            Ok(()) => {}
            Err(Error::Cancelled) => {
                // The cancel handler already evicted the slot.
                log::info!("download cancelled for user {user}");
                self.discard_artifacts(&dest, None).await;
                return SessionOutcome::Cancelled;
            }
            Err(e) => {
                log::error!("download failed for user {user}: {e}");
                self.edit_best_effort(status, DOWNLOAD_FAILED).await;
                drop(guard);
                self.discard_artifacts(&dest, None).await;
                return SessionOutcome::DownloadFailed;
            }
        }

        // The source message is retired once its payload is safely on disk.
        if let Err(e) = self.transport.delete_message(submission.message).await {
            log::debug!("could not delete the submission message: {e}");
        }

        if !self.registry.is_active(user) {
            log::info!("session cancelled before processing for user {user}");
            self.discard_artifacts(&dest, None).await;
            return SessionOutcome::Cancelled;
        }

        // Processing: best-effort enrichment, never aborts the session.
        self.edit_best_effort(status, STATUS_PROCESSING).await;
        let metadata = self.probe.probe(&dest).await;
        let thumbnail = if metadata.duration_secs > 0 {
            self.thumbnails
                .generate(
                    &dest,
                    &self.config.download_dir,
                    metadata.screenshot_offset_secs(),
                    metadata.height,
                )
                .await
        } else {
            None
        };

        if !self.registry.is_active(user) {
            log::info!("session cancelled before upload for user {user}");
            self.discard_artifacts(&dest, thumbnail.as_deref()).await;
            return SessionOutcome::Cancelled;
        }

        // Uploading, with a fresh throughput baseline.
        self.edit_best_effort(status, STATUS_UPLOADING).await;
        let upload = VideoUpload {
            path: dest.clone(),
            metadata,
            caption: submission.upload_caption(),
            thumbnail: thumbnail.clone(),
        };
        let reporter = Arc::new(StatusReporter::new(
            Arc::clone(&self.transport),
            status,
            UPLOAD_HEADLINE,
        ));
        match self
            .transport
            .upload_video(submission.chat, &upload, reporter, cancel)
            .await
        {
            Ok(()) => {}
            Err(Error::Cancelled) => {
                log::info!("upload cancelled for user {user}");
                self.discard_artifacts(&dest, thumbnail.as_deref()).await;
                return SessionOutcome::Cancelled;
            }
            Err(e) => {
                log::error!("upload failed for user {user}: {e}");
                self.edit_best_effort(status, UPLOAD_FAILED).await;
                drop(guard);
                self.discard_artifacts(&dest, thumbnail.as_deref()).await;
                return SessionOutcome::UploadFailed;
            }
        }

        // Cleanup.
        self.discard_artifacts(&dest, thumbnail.as_deref()).await;
        if let Err(e) = self.transport.delete_message(status).await {
            log::debug!("could not delete the status display: {e}");
        }
        drop(guard);
        log::info!(
            "session completed for user {user} in {}",
            format_duration(started.elapsed())
        );
        SessionOutcome::Completed
    }

    /// Cancels the user's active session, if any.
    ///
    /// Confirms on the session's status display when one exists; the
    /// in-flight transfer observes the fired token and unwinds on its own.
    /// Returns whether there was a session to cancel.
    pub async fn cancel(&self, user: UserId, chat: ChatRef) -> bool {
        match self.registry.cancel(user) {
            Some(released) => {
                log::info!("cancel requested for user {user}");
                match released.status {
                    Some(status) => self.edit_best_effort(status, CANCEL_CONFIRMED).await,
                    None => self.send_best_effort(chat, CANCEL_CONFIRMED).await,
                }
                true
            }
            None => {
                self.send_best_effort(chat, NOTHING_TO_CANCEL).await;
                false
            }
        }
    }

    /// Where the submission's payload is written while in flight. Names
    /// carry the user id and a millisecond timestamp, so concurrent
    /// sessions never collide inside the shared download directory.
    fn destination_path(&self, submission: &MediaSubmission) -> PathBuf {
        let unique = format!(
            "{}-{}-{}",
            submission.user,
            chrono::Utc::now().timestamp_millis(),
            submission.file_name
        );
        self.config.download_dir.join(unique)
    }

    /// Waits out the settle delay, then removes the session's local files.
    async fn discard_artifacts(&self, source: &Path, thumbnail: Option<&Path>) {
        tokio::time::sleep(self.config.cleanup_delay()).await;
        remove_artifact(source).await;
        if let Some(thumbnail) = thumbnail {
            remove_artifact(thumbnail).await;
        }
    }

    async fn send_best_effort(&self, chat: ChatRef, text: &str) {
        if let Err(e) = self.transport.send_text(chat, text, None).await {
            log::warn!("could not send \"{text}\": {e}");
        }
    }

    async fn edit_best_effort(&self, message: MessageRef, text: &str) {
        if let Err(e) = self.transport.edit_text(message, text).await {
            log::warn!("status update failed: {e}");
        }
    }
}

async fn remove_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => log::debug!("removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::error!("failed to remove {}: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI32, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::Result;
    use crate::probe::{MetadataExtractor, RawMediaInfo};
    use crate::thumbnail::{FrameExtractor, ImageResizer};
    use crate::transport::{InboundMedia, TransferObserver};

    #[derive(Clone, Copy)]
    enum DownloadBehavior {
        Succeed { size: u64 },
        Fail,
        AwaitCancel,
        Panic,
    }

    #[derive(Clone, Copy)]
    enum UploadBehavior {
        Succeed,
        Fail,
        AwaitCancel,
    }

    /// Records every transport interaction; transfer behavior is scripted
    /// per test.
    struct MockTransport {
        download: DownloadBehavior,
        upload: UploadBehavior,
        download_started: Notify,
        upload_started: Notify,
        next_id: AtomicI32,
        sent: Mutex<Vec<(ChatRef, String, Option<MessageRef>)>>,
        edits: Mutex<Vec<(MessageRef, String)>>,
        deleted: Mutex<Vec<MessageRef>>,
        uploads: Mutex<Vec<VideoUpload>>,
    }

    impl MockTransport {
        fn new(download: DownloadBehavior, upload: UploadBehavior) -> Arc<Self> {
            Arc::new(Self {
                download,
                upload,
                download_started: Notify::new(),
                upload_started: Notify::new(),
                next_id: AtomicI32::new(100),
                sent: Mutex::new(Vec::new()),
                edits: Mutex::new(Vec::new()),
                deleted: Mutex::new(Vec::new()),
                uploads: Mutex::new(Vec::new()),
            })
        }

        fn sent_texts(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(_, text, _)| text.clone())
                .collect()
        }

        fn edited_texts(&self) -> Vec<String> {
            self.edits
                .lock()
                .unwrap()
                .iter()
                .map(|(_, text)| text.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn download_media(
            &self,
            _media: &InboundMedia,
            dest: &Path,
            observer: Arc<dyn TransferObserver>,
            cancel: CancellationToken,
        ) -> Result<()> {
            self.download_started.notify_one();
            match self.download {
                DownloadBehavior::Succeed { size } => {
                    tokio::fs::write(dest, vec![0u8; usize::try_from(size).unwrap()]).await?;
                    observer.on_chunk(size / 2, size);
                    observer.on_chunk(size, size);
                    Ok(())
                }
                DownloadBehavior::Fail => Err(Error::Io(std::io::Error::other("link dropped"))),
                DownloadBehavior::AwaitCancel => {
                    tokio::fs::write(dest, b"partial").await?;
                    observer.on_chunk(7, 100);
                    cancel.cancelled().await;
                    Err(Error::Cancelled)
                }
                DownloadBehavior::Panic => panic!("transport crashed mid-download"),
            }
        }

        async fn upload_video(
            &self,
            _chat: ChatRef,
            upload: &VideoUpload,
            _observer: Arc<dyn TransferObserver>,
            cancel: CancellationToken,
        ) -> Result<()> {
            self.uploads.lock().unwrap().push(upload.clone());
            self.upload_started.notify_one();
            match self.upload {
                UploadBehavior::Succeed => Ok(()),
                UploadBehavior::Fail => Err(Error::Io(std::io::Error::other("link dropped"))),
                UploadBehavior::AwaitCancel => {
                    cancel.cancelled().await;
                    Err(Error::Cancelled)
                }
            }
        }

        async fn send_text(
            &self,
            chat: ChatRef,
            text: &str,
            reply_to: Option<MessageRef>,
        ) -> Result<MessageRef> {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            self.sent
                .lock()
                .unwrap()
                .push((chat, text.to_string(), reply_to));
            Ok(MessageRef { chat, id })
        }

        async fn edit_text(&self, message: MessageRef, text: &str) -> Result<()> {
            self.edits.lock().unwrap().push((message, text.to_string()));
            Ok(())
        }

        async fn delete_message(&self, message: MessageRef) -> Result<()> {
            self.deleted.lock().unwrap().push(message);
            Ok(())
        }
    }

    struct FixedMetadata(RawMediaInfo);

    #[async_trait]
    impl MetadataExtractor for FixedMetadata {
        async fn extract(&self, _path: &Path) -> Result<RawMediaInfo> {
            Ok(self.0)
        }
    }

    struct WritingFrameExtractor;

    #[async_trait]
    impl FrameExtractor for WritingFrameExtractor {
        async fn extract_frame(&self, _video: &Path, _offset: u32, out: &Path) -> Result<()> {
            tokio::fs::write(out, b"jpeg bytes").await?;
            Ok(())
        }
    }

    struct NoopResizer;

    #[async_trait]
    impl ImageResizer for NoopResizer {
        async fn resize(&self, _path: &Path, _width: u32, _height: u32) -> Result<()> {
            Ok(())
        }
    }

    struct Fixture {
        controller: Arc<SessionController>,
        transport: Arc<MockTransport>,
        registry: SessionRegistry,
        dir: tempfile::TempDir,
    }

    fn fixture(download: DownloadBehavior, upload: UploadBehavior) -> Fixture {
        fixture_with_metadata(
            download,
            upload,
            RawMediaInfo {
                duration_secs: Some(120.0),
                width: Some(1280),
                height: Some(720),
            },
        )
    }

    fn fixture_with_metadata(
        download: DownloadBehavior,
        upload: UploadBehavior,
        raw: RawMediaInfo,
    ) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let transport = MockTransport::new(download, upload);
        let registry = SessionRegistry::new();
        let config = SessionConfig::new()
            .with_download_dir(dir.path())
            .with_cleanup_delay_secs(0);
        let controller = Arc::new(SessionController::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            MetadataProbe::new(Arc::new(FixedMetadata(raw))),
            ThumbnailGenerator::new(Arc::new(WritingFrameExtractor), Arc::new(NoopResizer)),
            registry.clone(),
            config,
        ));
        Fixture {
            controller,
            transport,
            registry,
            dir,
        }
    }

    fn submission(
        user: u64,
        message_id: i32,
        kind: MediaKind,
        file_name: &str,
        caption: Option<&str>,
    ) -> MediaSubmission {
        #[allow(clippy::cast_possible_wrap)]
        let chat = ChatRef(user as i64);
        MediaSubmission {
            user: UserId(user),
            chat,
            message: MessageRef {
                chat,
                id: message_id,
            },
            media: InboundMedia {
                file_id: format!("file-{message_id}"),
                file_size: 100,
            },
            kind,
            file_name: file_name.to_string(),
            caption: caption.map(ToString::to_string),
        }
    }

    fn remaining_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn completed_session_delivers_and_cleans_up() {
        let f = fixture(DownloadBehavior::Succeed { size: 100 }, UploadBehavior::Succeed);
        let sub = submission(1, 11, MediaKind::Video, "movie.mp4", Some("check this out"));

        let outcome = f.controller.run(sub).await;

        assert_eq!(outcome, SessionOutcome::Completed);
        assert!(!f.registry.is_active(UserId(1)));

        // The status display is created as a quoted reply and later deleted,
        // as is the originating media message.
        let sent = f.transport.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, STATUS_DOWNLOADING);
        assert_eq!(
            sent[0].2,
            Some(MessageRef {
                chat: ChatRef(1),
                id: 11,
            })
        );
        let deleted = f.transport.deleted.lock().unwrap().clone();
        assert!(deleted.iter().any(|m| m.id == 11));
        assert!(deleted.iter().any(|m| m.id == 100));

        let edits = f.transport.edited_texts();
        assert!(edits.contains(&STATUS_PROCESSING.to_string()));
        assert!(edits.contains(&STATUS_UPLOADING.to_string()));

        let uploads = f.transport.uploads.lock().unwrap().clone();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].caption, "movie.mp4\n\ncheck this out");
        assert_eq!(uploads[0].metadata.duration_secs, 120);
        assert_eq!(uploads[0].metadata.width, 1280);
        assert_eq!(uploads[0].metadata.height, 720);
        assert!(uploads[0].thumbnail.is_some());

        assert_eq!(remaining_files(f.dir.path()), 0);
    }

    #[tokio::test]
    async fn duplicate_submission_is_rejected() {
        let f = fixture(DownloadBehavior::Succeed { size: 100 }, UploadBehavior::Succeed);
        let _guard = f.registry.try_acquire(UserId(1)).unwrap();

        let outcome = f
            .controller
            .run(submission(1, 11, MediaKind::Video, "movie.mp4", None))
            .await;

        assert_eq!(outcome, SessionOutcome::AlreadyActive);
        assert!(f.transport.sent_texts().contains(&ALREADY_ACTIVE.to_string()));
        // The first session is unaffected.
        assert!(f.registry.is_active(UserId(1)));
        assert!(f.transport.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsupported_document_is_rejected() {
        let f = fixture(DownloadBehavior::Succeed { size: 100 }, UploadBehavior::Succeed);

        let outcome = f
            .controller
            .run(submission(1, 11, MediaKind::Document, "archive.rar", None))
            .await;

        assert_eq!(outcome, SessionOutcome::Unsupported);
        assert!(
            f.transport
                .sent_texts()
                .contains(&UNSUPPORTED_TYPE.to_string())
        );
        assert!(!f.registry.is_active(UserId(1)));
        assert!(f.transport.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn document_with_video_extension_is_admitted() {
        let f = fixture(DownloadBehavior::Succeed { size: 100 }, UploadBehavior::Succeed);

        let outcome = f
            .controller
            .run(submission(1, 11, MediaKind::Document, "movie.mkv", None))
            .await;

        assert_eq!(outcome, SessionOutcome::Completed);
    }

    #[tokio::test]
    async fn video_submissions_skip_the_extension_gate() {
        let f = fixture(DownloadBehavior::Succeed { size: 100 }, UploadBehavior::Succeed);

        let outcome = f
            .controller
            .run(submission(1, 11, MediaKind::Video, "stream", None))
            .await;

        assert_eq!(outcome, SessionOutcome::Completed);
        // Not frame-capable, so no thumbnail was attached.
        let uploads = f.transport.uploads.lock().unwrap().clone();
        assert!(uploads[0].thumbnail.is_none());
    }

    #[tokio::test]
    async fn cancel_during_download_stops_before_processing() {
        let f = fixture(DownloadBehavior::AwaitCancel, UploadBehavior::Succeed);
        let controller = Arc::clone(&f.controller);
        let handle = tokio::spawn(async move {
            controller
                .run(submission(1, 11, MediaKind::Video, "movie.mp4", None))
                .await
        });

        f.transport.download_started.notified().await;
        assert!(f.controller.cancel(UserId(1), ChatRef(1)).await);

        let outcome = handle.await.unwrap();
        assert_eq!(outcome, SessionOutcome::Cancelled);
        assert!(!f.registry.is_active(UserId(1)));

        let edits = f.transport.edited_texts();
        assert!(edits.contains(&CANCEL_CONFIRMED.to_string()));
        assert!(!edits.contains(&STATUS_PROCESSING.to_string()));
        assert!(f.transport.uploads.lock().unwrap().is_empty());
        // The partial download is gone.
        assert_eq!(remaining_files(f.dir.path()), 0);
    }

    #[tokio::test]
    async fn cancel_during_upload_still_removes_artifacts() {
        let f = fixture(
            DownloadBehavior::Succeed { size: 100 },
            UploadBehavior::AwaitCancel,
        );
        let controller = Arc::clone(&f.controller);
        let handle = tokio::spawn(async move {
            controller
                .run(submission(1, 11, MediaKind::Video, "movie.mp4", None))
                .await
        });

        f.transport.upload_started.notified().await;
        assert!(f.controller.cancel(UserId(1), ChatRef(1)).await);

        let outcome = handle.await.unwrap();
        assert_eq!(outcome, SessionOutcome::Cancelled);
        assert_eq!(remaining_files(f.dir.path()), 0);

        // The display keeps the cancel confirmation instead of being deleted.
        let edits = f.transport.edited_texts();
        assert!(edits.contains(&CANCEL_CONFIRMED.to_string()));
        let deleted = f.transport.deleted.lock().unwrap().clone();
        assert!(!deleted.iter().any(|m| m.id == 100));
    }

    #[tokio::test]
    async fn second_cancel_reports_nothing_to_cancel() {
        let f = fixture(DownloadBehavior::AwaitCancel, UploadBehavior::Succeed);
        let controller = Arc::clone(&f.controller);
        let handle = tokio::spawn(async move {
            controller
                .run(submission(1, 11, MediaKind::Video, "movie.mp4", None))
                .await
        });

        f.transport.download_started.notified().await;
        assert!(f.controller.cancel(UserId(1), ChatRef(1)).await);
        assert!(!f.controller.cancel(UserId(1), ChatRef(1)).await);

        assert_eq!(handle.await.unwrap(), SessionOutcome::Cancelled);
        assert!(
            f.transport
                .sent_texts()
                .contains(&NOTHING_TO_CANCEL.to_string())
        );
    }

    #[tokio::test]
    async fn cancel_without_session_reports_nothing_to_cancel() {
        let f = fixture(DownloadBehavior::Succeed { size: 100 }, UploadBehavior::Succeed);

        assert!(!f.controller.cancel(UserId(9), ChatRef(9)).await);
        assert!(
            f.transport
                .sent_texts()
                .contains(&NOTHING_TO_CANCEL.to_string())
        );
    }

    #[tokio::test]
    async fn download_failure_reports_and_releases() {
        let f = fixture(DownloadBehavior::Fail, UploadBehavior::Succeed);

        let outcome = f
            .controller
            .run(submission(1, 11, MediaKind::Video, "movie.mp4", None))
            .await;

        assert_eq!(outcome, SessionOutcome::DownloadFailed);
        assert!(!f.registry.is_active(UserId(1)));
        assert!(
            f.transport
                .edited_texts()
                .contains(&DOWNLOAD_FAILED.to_string())
        );
        // The failure note stays visible and the submission is kept.
        assert!(f.transport.deleted.lock().unwrap().is_empty());
        assert!(f.transport.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_failure_reports_and_releases() {
        let f = fixture(DownloadBehavior::Succeed { size: 100 }, UploadBehavior::Fail);

        let outcome = f
            .controller
            .run(submission(1, 11, MediaKind::Video, "movie.mp4", None))
            .await;

        assert_eq!(outcome, SessionOutcome::UploadFailed);
        assert!(!f.registry.is_active(UserId(1)));
        assert!(
            f.transport
                .edited_texts()
                .contains(&UPLOAD_FAILED.to_string())
        );
        assert_eq!(remaining_files(f.dir.path()), 0);

        // The submission was already retired, but the failure note stays.
        let deleted = f.transport.deleted.lock().unwrap().clone();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].id, 11);
    }

    #[tokio::test]
    async fn panicking_session_frees_the_user() {
        let f = fixture(DownloadBehavior::Panic, UploadBehavior::Succeed);
        let controller = Arc::clone(&f.controller);
        let handle = tokio::spawn(async move {
            controller
                .run(submission(1, 11, MediaKind::Video, "movie.mp4", None))
                .await
        });

        assert!(handle.await.unwrap_err().is_panic());
        assert!(!f.registry.is_active(UserId(1)));
        // The slot is free again for a fresh submission.
        assert!(f.registry.try_acquire(UserId(1)).is_some());
    }

    #[tokio::test]
    async fn zero_duration_skips_the_thumbnail() {
        let f = fixture_with_metadata(
            DownloadBehavior::Succeed { size: 100 },
            UploadBehavior::Succeed,
            RawMediaInfo::default(),
        );

        let outcome = f
            .controller
            .run(submission(1, 11, MediaKind::Video, "movie.mp4", None))
            .await;

        assert_eq!(outcome, SessionOutcome::Completed);
        let uploads = f.transport.uploads.lock().unwrap().clone();
        assert_eq!(uploads[0].metadata.duration_secs, 0);
        assert!(uploads[0].thumbnail.is_none());
    }

    #[test]
    fn destination_names_carry_user_and_file_name() {
        let f = fixture(DownloadBehavior::Succeed { size: 100 }, UploadBehavior::Succeed);
        let sub = submission(42, 1, MediaKind::Video, "movie.mp4", None);

        let path = f.controller.destination_path(&sub);

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("42-"));
        assert!(name.ends_with("-movie.mp4"));
        assert!(path.starts_with(f.dir.path()));
    }
}
