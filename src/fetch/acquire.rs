use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, info, warn};

use crate::error::FetchError;

/// External tool that turns a content id into a local audio file.
pub trait Acquirer: Send + Sync {
    /// Materialise the audio for `content_id` at exactly `dest`.
    fn acquire(&self, content_id: &str, dest: &Path) -> Result<(), FetchError>;
}

/// `yt-dlp` / `youtube-dl` extracting mp3 audio.
pub struct YoutubeDl {
    program: String,
}

impl YoutubeDl {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Acquirer for YoutubeDl {
    fn acquire(&self, content_id: &str, dest: &Path) -> Result<(), FetchError> {
        let template = with_suffix(dest, ".%(ext)s");
        info!("downloading {content_id} with {}", self.program);

        let output = Command::new(&self.program)
            .args(["-f", "bestaudio/best", "--no-playlist", "-4", "-o"])
            .arg(&template)
            .args([
                "--extract-audio",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "2",
                "--",
            ])
            .arg(content_id)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                FetchError::DownloadFailed(format!("could not run {}: {e}", self.program))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no diagnostics")
                .to_string();
            return Err(FetchError::DownloadFailed(format!(
                "{} exited with {}: {reason}",
                self.program, output.status
            )));
        }

        let produced = with_suffix(dest, ".mp3");
        fs::rename(&produced, dest).map_err(|e| {
            FetchError::DownloadFailed(format!("expected {}: {e}", produced.display()))
        })?;
        debug!("downloaded {content_id} to {}", dest.display());
        Ok(())
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// Remove `dest` and every sibling the tool may have left next to it
/// (`dest.mp3`, `dest.webm.part`, ...).
pub(super) fn discard_staged(dest: &Path) {
    let (Some(dir), Some(name)) = (dest.parent(), dest.file_name().and_then(|n| n.to_str())) else {
        return;
    };
    let prefix = format!("{name}.");
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(Result::ok) {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if file_name == name || file_name.starts_with(&prefix) {
            if let Err(e) = fs::remove_file(entry.path()) {
                warn!("could not remove staged file {}: {e}", entry.path().display());
            }
        }
    }
}
