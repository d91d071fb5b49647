//! The external transcoder: spawn, stream PCM frames, kill.
//!
//! `ffmpeg` decodes the cached file to raw mono s16le at 48 kHz on stdout. A
//! reader thread cuts stdout into fixed-size frames and hands them over a
//! bounded channel, so the pump can wait for a frame with a timeout instead of
//! blocking on the pipe.

use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};

use crate::error::PlaybackError;

/// Frames buffered between the reader thread and the pump.
const FRAME_BACKLOG: usize = 64;

#[derive(Debug, PartialEq, Eq)]
pub enum FrameRead {
    Frame(Vec<u8>),
    /// The process finished its input and exited.
    Exhausted,
    /// Nothing arrived within the wait.
    Pending,
}

/// A running decoder producing PCM frames.
pub trait FrameSource: Send {
    fn next_frame(&mut self, wait: Duration) -> FrameRead;

    /// Kill and reap the process. Safe to call more than once.
    fn terminate(&mut self);
}

pub trait Transcoder: Send + Sync {
    fn spawn(
        &self,
        path: &Path,
        start_offset: Option<u32>,
    ) -> Result<Box<dyn FrameSource>, PlaybackError>;
}

pub struct FfmpegTranscoder {
    program: String,
    frame_bytes: usize,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>, frame_bytes: usize) -> Self {
        Self {
            program: program.into(),
            frame_bytes,
        }
    }
}

impl Transcoder for FfmpegTranscoder {
    fn spawn(
        &self,
        path: &Path,
        start_offset: Option<u32>,
    ) -> Result<Box<dyn FrameSource>, PlaybackError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-v", "error", "-nostdin"]);
        if let Some(secs) = start_offset {
            cmd.arg("-ss").arg(secs.to_string());
        }
        cmd.arg("-i")
            .arg(path)
            .args(["-ac", "1", "-f", "s16le", "-ar", "48000", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = cmd.spawn().map_err(PlaybackError::Spawn)?;
        debug!("spawned {} (pid {}) for {}", self.program, child.id(), path.display());
        let process =
            TranscodeProcess::attach(child, self.frame_bytes).map_err(PlaybackError::Spawn)?;
        Ok(Box::new(process))
    }
}

/// Owns the child process and its reader threads; killing and reaping happen
/// in `terminate`, which `Drop` also runs.
pub struct TranscodeProcess {
    child: Option<Child>,
    frames: Option<Receiver<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
    diagnostics: Option<JoinHandle<()>>,
}

impl TranscodeProcess {
    fn attach(mut child: Child, frame_bytes: usize) -> io::Result<Self> {
        let (tx, rx) = mpsc::sync_channel(FRAME_BACKLOG);

        let reader = match child.stdout.take() {
            Some(stdout) => {
                let spawned = thread::Builder::new()
                    .name("transcoder-stdout".to_string())
                    .spawn(move || read_frames(stdout, frame_bytes, tx));
                match spawned {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(e);
                    }
                }
            }
            None => None,
        };

        let diagnostics = child.stderr.take().and_then(|stderr| {
            thread::Builder::new()
                .name("transcoder-stderr".to_string())
                .spawn(move || {
                    for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                        warn!("ffmpeg: {line}");
                    }
                })
                .ok()
        });

        Ok(Self {
            child: Some(child),
            frames: Some(rx),
            reader,
            diagnostics,
        })
    }
}

impl FrameSource for TranscodeProcess {
    fn next_frame(&mut self, wait: Duration) -> FrameRead {
        let Some(frames) = &self.frames else {
            return FrameRead::Exhausted;
        };
        match frames.recv_timeout(wait) {
            Ok(frame) => FrameRead::Frame(frame),
            Err(RecvTimeoutError::Timeout) => FrameRead::Pending,
            Err(RecvTimeoutError::Disconnected) => FrameRead::Exhausted,
        }
    }

    fn terminate(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            match child.wait() {
                Ok(status) => debug!("transcoder {} exited: {status}", child.id()),
                Err(e) => warn!("failed to reap transcoder {}: {e}", child.id()),
            }
        }
        // Unblocks a reader stuck on a full channel.
        self.frames.take();
        if let Some(h) = self.reader.take() {
            let _ = h.join();
        }
        if let Some(h) = self.diagnostics.take() {
            let _ = h.join();
        }
    }
}

impl Drop for TranscodeProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn read_frames(mut stdout: ChildStdout, frame_bytes: usize, tx: SyncSender<Vec<u8>>) {
    loop {
        let mut frame = vec![0u8; frame_bytes];
        let n = fill(&mut stdout, &mut frame);
        if n == 0 {
            break;
        }
        frame.truncate(n);
        if tx.send(frame).is_err() || n < frame_bytes {
            break;
        }
    }
}

/// Read until `buf` is full or the stream ends; returns the bytes read.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> usize {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("transcoder pipe closed: {e}");
                break;
            }
        }
    }
    filled
}
