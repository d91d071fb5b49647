//! Runtime-mutable settings shared by the dispatcher, fetcher and pump.
//!
//! `config::Settings` is read once at startup; everything users can change
//! from chat (volume, autoplay, ignore list, blacklist) lives here behind a
//! mutex and is written back to a small TOML state file after each change.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::Settings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveState {
    pub volume: f32,
    pub autoplay: bool,
    pub ignored: Vec<String>,
    pub blacklist: Vec<String>,
}

impl Default for LiveState {
    fn default() -> Self {
        Self {
            volume: 0.25,
            autoplay: false,
            ignored: Vec::new(),
            blacklist: Vec::new(),
        }
    }
}

impl LiveState {
    fn seeded(settings: &Settings) -> Self {
        Self {
            volume: settings.playback.volume,
            autoplay: settings.playback.autoplay,
            ignored: settings.access.ignored.clone(),
            blacklist: settings.access.blacklist.clone(),
        }
    }
}

pub struct LiveSettings {
    state: Mutex<LiveState>,
    path: Option<PathBuf>,
    owner: Option<String>,
    admins: Vec<String>,
}

impl LiveSettings {
    /// Restore from `path` if it exists, otherwise seed from `settings`.
    pub fn load(path: &Path, settings: &Settings) -> Self {
        let state = match fs::read_to_string(path) {
            Ok(text) => match toml::from_str::<LiveState>(&text) {
                Ok(state) => state,
                Err(e) => {
                    warn!("ignoring unreadable state file {}: {e}", path.display());
                    LiveState::seeded(settings)
                }
            },
            Err(_) => LiveState::seeded(settings),
        };
        Self::build(state, Some(path.to_path_buf()), settings)
    }

    /// Settings that are never written to disk.
    pub fn in_memory(settings: &Settings) -> Self {
        Self::build(LiveState::seeded(settings), None, settings)
    }

    fn build(state: LiveState, path: Option<PathBuf>, settings: &Settings) -> Self {
        Self {
            state: Mutex::new(state),
            path,
            owner: settings.access.owner.clone(),
            admins: settings.access.admins.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LiveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` to the state and persist the result.
    fn update<R>(&self, f: impl FnOnce(&mut LiveState) -> R) -> R {
        let mut state = self.lock();
        let out = f(&mut state);
        self.persist(&state);
        out
    }

    fn persist(&self, state: &LiveState) {
        let Some(path) = &self.path else {
            return;
        };
        let text = match toml::to_string_pretty(state) {
            Ok(t) => t,
            Err(e) => {
                warn!("failed to serialize state: {e}");
                return;
            }
        };
        let tmp = path.with_extension("tmp");
        let result = fs::write(&tmp, text).and_then(|()| fs::rename(&tmp, path));
        match result {
            Ok(()) => debug!("state written to {}", path.display()),
            Err(e) => warn!("failed to write state file {}: {e}", path.display()),
        }
    }

    pub fn volume(&self) -> f32 {
        self.lock().volume
    }

    pub fn set_volume(&self, volume: f32) {
        self.update(|s| s.volume = volume.clamp(0.0, 1.0));
    }

    pub fn autoplay(&self) -> bool {
        self.lock().autoplay
    }

    /// Flip autoplay and return the new value.
    pub fn toggle_autoplay(&self) -> bool {
        self.update(|s| {
            s.autoplay = !s.autoplay;
            s.autoplay
        })
    }

    pub fn is_owner(&self, hash: &str) -> bool {
        self.owner.as_deref() == Some(hash)
    }

    pub fn is_admin(&self, hash: &str) -> bool {
        self.is_owner(hash) || self.admins.iter().any(|a| a == hash)
    }

    pub fn is_ignored(&self, hash: &str) -> bool {
        self.lock().ignored.iter().any(|h| h == hash)
    }

    /// Returns false if the hash was already ignored.
    pub fn ignore(&self, hash: &str) -> bool {
        self.update(|s| {
            if s.ignored.iter().any(|h| h == hash) {
                false
            } else {
                s.ignored.push(hash.to_string());
                true
            }
        })
    }

    /// Returns false if the hash was not ignored.
    pub fn unignore(&self, hash: &str) -> bool {
        self.update(|s| {
            let before = s.ignored.len();
            s.ignored.retain(|h| h != hash);
            s.ignored.len() != before
        })
    }

    pub fn is_blacklisted(&self, id: &str) -> bool {
        self.lock().blacklist.iter().any(|b| b == id)
    }

    pub fn blacklist(&self, id: &str) -> bool {
        self.update(|s| {
            if s.blacklist.iter().any(|b| b == id) {
                false
            } else {
                s.blacklist.push(id.to_string());
                true
            }
        })
    }
}
