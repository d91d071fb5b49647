use std::collections::VecDeque;
use std::time::Instant;

use crate::store::Track;

use super::process::FrameSource;

/// The track on air and the process decoding it. They only exist together.
pub(super) struct NowPlaying {
    pub track: Track,
    pub process: Box<dyn FrameSource>,
    /// Last time the process produced a frame; drives the watchdog.
    pub last_frame: Instant,
}

/// Everything guarded by the engine lock.
#[derive(Default)]
pub(super) struct PlaybackState {
    pub queue: VecDeque<Track>,
    pub now: Option<NowPlaying>,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        self.now.is_some()
    }
}
