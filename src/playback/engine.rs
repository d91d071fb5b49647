use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::PlaybackSettings;
use crate::error::{PlaybackError, StoreError};
use crate::settings::LiveSettings;
use crate::store::{Track, TrackStore};
use crate::voice::AudioSink;

use super::gain::apply_gain;
use super::process::{FrameRead, Transcoder};
use super::state::{NowPlaying, PlaybackState};

/// Random picks tried before autoplay gives up and goes idle.
const AUTOPLAY_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enqueued {
    Started,
    /// Appended; the value is the queue length afterwards.
    Queued(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    AlreadyPlaying,
    Started(Track),
    NothingToPlay,
}

/// What one pump step did.
#[derive(Debug, PartialEq, Eq)]
pub enum Feed {
    Idle,
    Fed,
    Waiting,
    /// The current track ended (or hung); this is what plays now.
    Advanced(Option<Track>),
}

/// Queue plus play/stop/skip state machine.
///
/// A single mutex guards the queue, the current track and its process, so a
/// command and the pump can never interleave a teardown with a start.
pub struct Engine {
    state: Mutex<PlaybackState>,
    wake: Condvar,
    alive: AtomicBool,
    store: Arc<TrackStore>,
    transcoder: Arc<dyn Transcoder>,
    live: Arc<LiveSettings>,
    stop_grace: Duration,
}

impl Engine {
    pub fn new(
        store: Arc<TrackStore>,
        transcoder: Arc<dyn Transcoder>,
        live: Arc<LiveSettings>,
        settings: &PlaybackSettings,
    ) -> Self {
        Self {
            state: Mutex::new(PlaybackState::default()),
            wake: Condvar::new(),
            alive: AtomicBool::new(true),
            store,
            transcoder,
            live,
            stop_grace: settings.stop_grace(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PlaybackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to the queue while playing, otherwise start `track` right away.
    pub fn enqueue_or_play(&self, track: Track) -> Result<Enqueued, PlaybackError> {
        let mut state = self.lock();
        if state.is_playing() {
            debug!("queued {} ({})", track.title, track.id);
            state.queue.push_back(track);
            return Ok(Enqueued::Queued(state.queue.len()));
        }
        self.start(&mut state, track)?;
        Ok(Enqueued::Started)
    }

    /// Move on to the next track, letting the sink flush before the current
    /// process dies. Returns what plays now.
    pub fn skip(&self) -> Option<Track> {
        let mut state = self.lock();
        self.advance_locked(&mut state, self.stop_grace)
    }

    /// Stop the current track without touching the queue.
    pub fn stop(&self) -> Option<Track> {
        let mut state = self.lock();
        self.teardown(&mut state, self.stop_grace)
    }

    /// Start the next track if idle.
    pub fn play(&self) -> PlayOutcome {
        let mut state = self.lock();
        if state.is_playing() {
            return PlayOutcome::AlreadyPlaying;
        }
        match self.advance_locked(&mut state, Duration::ZERO) {
            Some(track) => PlayOutcome::Started(track),
            None => PlayOutcome::NothingToPlay,
        }
    }

    /// Enqueue up to `n` random tracks from the store.
    pub fn random(&self, n: usize) -> Result<Vec<Track>, PlaybackError> {
        let picks = self.store.random(n)?;
        for track in &picks {
            self.enqueue_or_play(track.clone())?;
        }
        Ok(picks)
    }

    /// Delete `id` from the store, dropping it from the queue and moving on
    /// if it is playing. A delete that keeps the record keeps the queue too.
    pub fn remove(&self, id: &str) -> Result<Track, StoreError> {
        let mut state = self.lock();
        let was_current = state.now.as_ref().is_some_and(|n| n.track.id == id);
        if was_current {
            self.teardown(&mut state, Duration::ZERO);
        }

        let removed = self.store.delete(id);
        if matches!(removed, Ok(_) | Err(StoreError::NotFound(_))) {
            state.queue.retain(|t| t.id != id);
        }
        if was_current {
            self.advance_locked(&mut state, Duration::ZERO);
        }
        removed
    }

    pub fn now_playing(&self) -> Option<Track> {
        self.lock().now.as_ref().map(|n| n.track.clone())
    }

    pub fn queue_len(&self) -> usize {
        self.lock().queue.len()
    }

    #[cfg(test)]
    pub fn queued(&self) -> Vec<Track> {
        self.lock().queue.iter().cloned().collect()
    }

    pub fn is_playing(&self) -> bool {
        self.lock().is_playing()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Ask the pump to finish; it drains the sink and tears down on its way out.
    pub fn shutdown(&self) {
        // Held so the store cannot land between a waiter's check and its wait.
        let _state = self.lock();
        self.alive.store(false, Ordering::SeqCst);
        self.wake.notify_all();
    }

    /// Block until something is playing, shutdown is requested or `timeout` passes.
    pub fn wait_for_playback(&self, timeout: Duration) {
        let state = self.lock();
        if state.is_playing() || !self.is_alive() {
            return;
        }
        let _ = self
            .wake
            .wait_timeout(state, timeout)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// One pump step: read a frame from the current process and hand it to
    /// `sink`. Exhaustion, or silence longer than `watchdog`, advances.
    ///
    /// Runs entirely under the engine lock so a frame from a torn-down process
    /// can never reach the sink.
    pub fn feed(&self, sink: &dyn AudioSink, read_wait: Duration, watchdog: Duration) -> Feed {
        let mut state = self.lock();
        let Some(now) = state.now.as_mut() else {
            return Feed::Idle;
        };

        match now.process.next_frame(read_wait) {
            FrameRead::Frame(mut pcm) => {
                now.last_frame = Instant::now();
                apply_gain(&mut pcm, self.live.volume());
                sink.add_frame(&pcm);
                Feed::Fed
            }
            FrameRead::Pending => {
                let silent = now.last_frame.elapsed();
                if silent < watchdog {
                    return Feed::Waiting;
                }
                let err = PlaybackError::ProcessWatchdogTimeout(silent);
                warn!("giving up on {}: {err}", now.track.title);
                Feed::Advanced(self.advance_locked(&mut state, Duration::ZERO))
            }
            FrameRead::Exhausted => {
                debug!("finished {}", now.track.title);
                Feed::Advanced(self.advance_locked(&mut state, Duration::ZERO))
            }
        }
    }

    /// Tear down whatever plays, with no grace delay. Used on shutdown.
    pub(super) fn halt(&self) {
        let mut state = self.lock();
        self.teardown(&mut state, Duration::ZERO);
    }

    fn start(&self, state: &mut PlaybackState, track: Track) -> Result<(), PlaybackError> {
        debug_assert!(state.now.is_none(), "start while a process is attached");
        let path = self.store.path_for(&track.id);
        let process = self.transcoder.spawn(&path, track.start_offset)?;
        info!("now playing {} ({})", track.title, track.id);
        state.now = Some(NowPlaying {
            track,
            process,
            last_frame: Instant::now(),
        });
        self.wake.notify_all();
        Ok(())
    }

    /// Kill and reap the current process, then clear the current track.
    fn teardown(&self, state: &mut PlaybackState, grace: Duration) -> Option<Track> {
        let now = state.now.as_mut()?;
        if !grace.is_zero() {
            thread::sleep(grace);
        }
        now.process.terminate();
        state.now.take().map(|n| n.track)
    }

    fn advance_locked(&self, state: &mut PlaybackState, grace: Duration) -> Option<Track> {
        self.teardown(state, grace);

        while let Some(track) = state.queue.pop_front() {
            match self.start(state, track.clone()) {
                Ok(()) => return Some(track),
                Err(e) => warn!("skipping {}: {e}", track.title),
            }
        }

        if self.live.autoplay() {
            for _ in 0..AUTOPLAY_ATTEMPTS {
                let pick = match self.store.random(1) {
                    Ok(mut picks) => picks.pop(),
                    Err(e) => {
                        warn!("autoplay could not read the store: {e}");
                        None
                    }
                };
                let Some(track) = pick else {
                    break;
                };
                match self.start(state, track.clone()) {
                    Ok(()) => return Some(track),
                    Err(e) => warn!("autoplay skipping {}: {e}", track.title),
                }
            }
        }

        info!("nothing left to play");
        None
    }
}
