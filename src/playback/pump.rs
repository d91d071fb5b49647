use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::config::PlaybackSettings;
use crate::voice::AudioSink;

use super::engine::{Engine, Feed};

/// Pump pacing, lifted out of `PlaybackSettings`.
#[derive(Debug, Clone, Copy)]
pub struct PumpTiming {
    pub high_water: Duration,
    pub backpressure_poll: Duration,
    pub idle_poll: Duration,
    pub watchdog: Duration,
    pub shutdown_grace: Duration,
}

impl From<&PlaybackSettings> for PumpTiming {
    fn from(s: &PlaybackSettings) -> Self {
        Self {
            high_water: s.high_water(),
            backpressure_poll: s.backpressure_poll(),
            idle_poll: s.idle_poll(),
            watchdog: s.watchdog(),
            shutdown_grace: s.shutdown_grace(),
        }
    }
}

/// Run the pump on its own thread until `engine.shutdown()`.
pub fn spawn(
    engine: Arc<Engine>,
    sink: Arc<dyn AudioSink>,
    timing: PumpTiming,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("audio-pump".to_string())
        .spawn(move || run(&engine, sink.as_ref(), timing))
}

/// The pump loop: idle wait, backpressure wait, then exactly one frame.
pub fn run(engine: &Engine, sink: &dyn AudioSink, timing: PumpTiming) {
    debug!("audio pump started");
    while engine.is_alive() {
        if !engine.is_playing() {
            engine.wait_for_playback(timing.idle_poll);
            continue;
        }

        if sink.buffered() > timing.high_water {
            thread::sleep(timing.backpressure_poll);
            continue;
        }

        match engine.feed(sink, timing.backpressure_poll, timing.watchdog) {
            Feed::Advanced(Some(track)) => debug!("pump moved on to {}", track.title),
            Feed::Advanced(None) | Feed::Fed | Feed::Waiting | Feed::Idle => {}
        }
    }

    drain(sink, timing);
    engine.halt();
    info!("audio pump stopped");
}

/// Let buffered audio play out, then pause for the grace delay. A sink that
/// stops draining is abandoned after twice its backlog plus the high-water mark.
fn drain(sink: &dyn AudioSink, timing: PumpTiming) {
    let deadline = Instant::now() + sink.buffered() * 2 + timing.high_water;
    while !sink.buffered().is_zero() && Instant::now() < deadline {
        thread::sleep(timing.backpressure_poll);
    }
    thread::sleep(timing.shutdown_grace);
}
