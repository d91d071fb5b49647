//! Playback engine: the queue, the play/stop/skip state machine and the pump
//! that streams transcoder output into the voice sink.
//!
//! `Engine` owns all mutable playback state behind one lock. The pump runs on
//! its own thread and only touches that state through `Engine::feed`.

mod engine;
mod gain;
mod process;
pub mod pump;
mod state;

pub use engine::{Engine, Enqueued, PlayOutcome};
pub use process::FfmpegTranscoder;
#[cfg(test)]
pub use process::{FrameRead, FrameSource, Transcoder};
pub use pump::PumpTiming;
