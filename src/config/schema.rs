use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Top-level bot settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/chorus/config.toml` or `~/.config/chorus/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `CHORUS__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub playback: PlaybackSettings,
    pub store: StoreSettings,
    pub fetch: FetchSettings,
    pub access: AccessSettings,
    pub voice: VoiceSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Initial linear gain in `0.0..=1.0`; the live value is kept in the state file.
    pub volume: f32,
    /// Whether to pick a random cached track when the queue runs dry.
    pub autoplay: bool,
    /// Bytes read from the transcoder per pump iteration (480 bytes = 240 samples of mono s16le).
    pub frame_bytes: usize,
    /// Stop feeding the sink while it holds more than this much audio (milliseconds).
    pub high_water_ms: u64,
    /// Sleep between backpressure checks (milliseconds).
    pub backpressure_poll_ms: u64,
    /// Sleep while nothing is playing (milliseconds).
    pub idle_poll_ms: u64,
    /// Kill the transcoder if it produces nothing for this long (milliseconds).
    pub watchdog_ms: u64,
    /// Delay before killing the transcoder on stop/skip so buffered audio can flush.
    pub stop_grace_ms: u64,
    /// Delay after the sink drained on shutdown.
    pub shutdown_grace_ms: u64,
    /// Transcoder executable.
    pub ffmpeg: String,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            volume: 0.25,
            autoplay: false,
            frame_bytes: 480,
            high_water_ms: 500,
            backpressure_poll_ms: 10,
            idle_poll_ms: 1000,
            watchdog_ms: 10_000,
            stop_grace_ms: 500,
            shutdown_grace_ms: 500,
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

impl PlaybackSettings {
    pub fn high_water(&self) -> Duration {
        Duration::from_millis(self.high_water_ms)
    }

    pub fn backpressure_poll(&self) -> Duration {
        Duration::from_millis(self.backpressure_poll_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn watchdog(&self) -> Duration {
        Duration::from_millis(self.watchdog_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Directory holding one audio file per track, named by track id.
    pub files_dir: PathBuf,
    /// SQLite database with the track records.
    pub database: PathBuf,
    /// TOML file where volume, autoplay and the user lists are persisted.
    pub state_file: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            files_dir: PathBuf::from("cache"),
            database: PathBuf::from("chorus.db"),
            state_file: PathBuf::from("chorus-state.toml"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Longest video accepted for download (seconds).
    pub max_duration_secs: u64,
    /// Acquisition tool (`yt-dlp` or `youtube-dl`).
    pub downloader: String,
    /// YouTube Data API v3 key. Without one only cached tracks can be played.
    pub youtube_api_key: Option<String>,
    /// Base URL of the YouTube Data API.
    pub api_base: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_duration_secs: 3600,
            downloader: "yt-dlp".to_string(),
            youtube_api_key: None,
            api_base: "https://www.googleapis.com/youtube/v3".to_string(),
        }
    }
}

impl FetchSettings {
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AccessSettings {
    /// Certificate hash of the bot owner.
    pub owner: Option<String>,
    /// Certificate hashes allowed to run admin commands.
    pub admins: Vec<String>,
    /// Hashes ignored on first start; afterwards the state file wins.
    pub ignored: Vec<String>,
    /// Track ids refused on first start; afterwards the state file wins.
    pub blacklist: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    /// Display name of the local console user.
    pub user_name: String,
    /// Hash reported for the local console user.
    pub user_hash: String,
    /// Name of the channel the console client pretends to sit in.
    pub channel_name: String,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            user_name: "console".to_string(),
            user_hash: "local-console".to_string(),
            channel_name: "Root".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// One of `off`, `error`, `warn`, `info`, `debug`, `trace`.
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
