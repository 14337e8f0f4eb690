//! streamify - a Telegram bot that re-publishes user-submitted videos as
//! streamable video messages.
//!
//! The core pipeline is transport-agnostic: a [`SessionController`] walks
//! one download, probe, thumbnail, upload pass per submission, talking to
//! the messaging service only through the [`Transport`] trait. Admission is
//! single-flight per user, enforced by a [`SessionRegistry`] whose guards
//! carry the cancellation token a running session is aborted with. The
//! [`telegram`] module binds the pipeline to the Telegram Bot API.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use streamify::config::AppConfig;
//! use streamify::probe::{FfprobeExtractor, MetadataProbe};
//! use streamify::registry::SessionRegistry;
//! use streamify::session::SessionController;
//! use streamify::telegram::{self, BotServices, TelegramTransport};
//! use streamify::thumbnail::{FfmpegFrameExtractor, JpegResizer, ThumbnailGenerator};
//!
//! # async fn example() -> streamify::Result<()> {
//! let config = AppConfig::load()?;
//! let bot = streamify::Bot::new(config.telegram.token()?);
//!
//! let controller = SessionController::new(
//!     Arc::new(TelegramTransport::new(bot.clone())),
//!     MetadataProbe::new(Arc::new(FfprobeExtractor::new(&config.tools.ffprobe_path))),
//!     ThumbnailGenerator::new(
//!         Arc::new(FfmpegFrameExtractor::new(&config.tools.ffmpeg_path)),
//!         Arc::new(JpegResizer),
//!     ),
//!     SessionRegistry::new(),
//!     config.session,
//! );
//!
//! telegram::run_dispatcher(bot, BotServices::new(Arc::new(controller))).await;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod commands;
pub mod config;
pub mod error;
pub mod format;
pub mod probe;
pub mod progress;
pub mod registry;
pub mod session;
pub mod telegram;
pub mod thumbnail;
pub mod transport;

// Re-export main types for convenience
pub use config::{AppConfig, SessionConfig};
pub use error::{Error, Result};
pub use registry::{SessionGuard, SessionRegistry};
pub use session::{SessionController, SessionOutcome};
pub use telegram::{BotServices, TelegramTransport};
pub use transport::{MediaSubmission, NoObserver, TransferObserver, Transport};

// Re-export the bot handle used throughout the public API
pub use teloxide::Bot;
