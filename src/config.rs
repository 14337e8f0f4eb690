//! Configuration types for the bot and its conversion sessions.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// File extensions recognized as video submissions by default.
const DEFAULT_VIDEO_EXTENSIONS: [&str; 14] = [
    "mp4", "mov", "avi", "mkv", "flv", "wmv", "webm", "mpg", "mpeg", "3gp", "ts", "m4v", "f4v",
    "vob",
];

/// Messaging-service credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API token; usually supplied via the `BOT_TOKEN` environment variable.
    pub bot_token: String,
}

impl TelegramConfig {
    /// Returns the bot token.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if no token was configured.
    pub fn token(&self) -> crate::Result<&str> {
        if self.bot_token.is_empty() {
            return Err(crate::Error::Config(
                "BOT_TOKEN environment variable not set".to_string(),
            ));
        }
        Ok(&self.bot_token)
    }
}

/// Per-session behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory where in-flight downloads are written.
    pub download_dir: PathBuf,
    /// File extensions accepted for submitted documents.
    pub video_extensions: Vec<String>,
    /// Seconds to wait before deleting artifacts during cleanup.
    pub cleanup_delay_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("./downloads"),
            video_extensions: DEFAULT_VIDEO_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            cleanup_delay_secs: 2,
        }
    }
}

impl SessionConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the download directory.
    #[must_use]
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    /// Sets the cleanup settle delay in seconds.
    #[must_use]
    pub const fn with_cleanup_delay_secs(mut self, secs: u64) -> Self {
        self.cleanup_delay_secs = secs;
        self
    }

    /// The delay applied before artifact deletion during cleanup.
    #[must_use]
    pub const fn cleanup_delay(&self) -> Duration {
        Duration::from_secs(self.cleanup_delay_secs)
    }

    /// Whether a file name carries a recognized video extension.
    #[must_use]
    pub fn accepts_extension(&self, file_name: &str) -> bool {
        Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.video_extensions.iter().any(|known| *known == ext)
            })
    }
}

/// Paths of the external media tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Path to the `ffmpeg` executable.
    pub ffmpeg_path: String,
    /// Path to the `ffprobe` executable.
    pub ffprobe_path: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

/// Complete application configuration combining credentials, session, and
/// tool settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Messaging-service credentials.
    pub telegram: TelegramConfig,
    /// Session behavior configuration.
    pub session: SessionConfig,
    /// External tool paths.
    pub tools: ToolsConfig,
}

impl AppConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from the optional config file, then applies
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed.
    pub fn load() -> crate::Result<Self> {
        let mut config = match Self::config_file_path() {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(&path)?;
                toml::from_str(&raw).map_err(|e| {
                    crate::Error::Config(format!("failed to parse {}: {e}", path.display()))
                })?
            }
            _ => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Location of the optional TOML config file.
    #[must_use]
    pub fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("streamify").join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(token) = env::var("BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Ok(dir) = env::var("DOWNLOAD_LOCATION") {
            self.session.download_dir = PathBuf::from(dir);
        }
        if let Ok(path) = env::var("FFMPEG_PATH") {
            self.tools.ffmpeg_path = path;
        }
        if let Ok(path) = env::var("FFPROBE_PATH") {
            self.tools.ffprobe_path = path;
        }
    }
}
