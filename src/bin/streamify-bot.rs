//! streamify-bot - long-polling entry point for the video conversion bot.
//!
//! Reads configuration from the optional TOML file plus environment
//! overrides (`BOT_TOKEN`, `DOWNLOAD_LOCATION`, `FFMPEG_PATH`,
//! `FFPROBE_PATH`), wires the session pipeline to the Telegram Bot API, and
//! polls for updates until interrupted.

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::sync::Arc;
use std::time::Duration;

use streamify::Bot;
use streamify::config::AppConfig;
use streamify::probe::{FfprobeExtractor, MetadataProbe};
use streamify::registry::SessionRegistry;
use streamify::session::SessionController;
use streamify::telegram::{self, BotServices, TelegramTransport};
use streamify::thumbnail::{FfmpegFrameExtractor, JpegResizer, ThumbnailGenerator};

/// Video transfers routinely run for minutes; the Bot API client must not
/// time them out.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> streamify::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load()?;
    let token = config.telegram.token()?.to_string();

    let client = teloxide::net::default_reqwest_settings()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    let bot = Bot::with_client(token, client);

    let transport = Arc::new(TelegramTransport::new(bot.clone()));
    let probe = MetadataProbe::new(Arc::new(FfprobeExtractor::new(&config.tools.ffprobe_path)));
    let thumbnails = ThumbnailGenerator::new(
        Arc::new(FfmpegFrameExtractor::new(&config.tools.ffmpeg_path)),
        Arc::new(JpegResizer),
    );

    log::info!(
        "Starting bot; downloads go to {}",
        config.session.download_dir.display()
    );

    let controller = SessionController::new(
        transport,
        probe,
        thumbnails,
        SessionRegistry::new(),
        config.session,
    );

    telegram::run_dispatcher(bot, BotServices::new(Arc::new(controller))).await;

    log::info!("Dispatcher stopped; shutting down");
    Ok(())
}
