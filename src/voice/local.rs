use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use log::{debug, info};
use rodio::Sink;
use rodio::buffer::SamplesBuffer;
use rodio::mixer::Mixer;

use crate::config::VoiceSettings;

use super::client::{AudioSink, TextMessage, User, VoiceClient};

const BOT_SESSION: u32 = 0;
const CONSOLE_SESSION: u32 = 1;
const ROOT_CHANNEL: u32 = 0;
const SAMPLE_RATE: u32 = 48_000;

/// A single local user typing commands on stdin; replies go to `out`.
pub struct ConsoleClient {
    me: User,
    operator: User,
    channel_name: String,
    channel: AtomicU32,
    connected: AtomicBool,
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleClient {
    pub fn new(settings: &VoiceSettings) -> Self {
        Self::with_output(settings, Box::new(io::stdout()))
    }

    pub fn with_output(settings: &VoiceSettings, out: Box<dyn Write + Send>) -> Self {
        Self {
            me: User {
                session: BOT_SESSION,
                name: "chorus".to_string(),
                hash: String::new(),
                channel_id: ROOT_CHANNEL,
            },
            operator: User {
                session: CONSOLE_SESSION,
                name: settings.user_name.clone(),
                hash: settings.user_hash.clone(),
                channel_id: ROOT_CHANNEL,
            },
            channel_name: settings.channel_name.clone(),
            channel: AtomicU32::new(ROOT_CHANNEL),
            connected: AtomicBool::new(true),
            out: Mutex::new(out),
        }
    }

    /// Feed each non-empty input line to `on_message` as if the console user
    /// had typed it in chat. Returns at end of input.
    pub fn listen(
        &self,
        input: impl BufRead,
        mut on_message: impl FnMut(TextMessage),
    ) -> io::Result<()> {
        for line in input.lines() {
            let line = line?;
            let message = line.trim();
            if message.is_empty() {
                continue;
            }
            on_message(TextMessage {
                actor: self.operator.session,
                message: message.to_string(),
            });
        }
        self.connected.store(false, Ordering::SeqCst);
        debug!("console input closed");
        Ok(())
    }

    fn write_line(&self, prefix: &str, message: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(out, "{prefix}{message}");
        let _ = out.flush();
    }
}

impl VoiceClient for ConsoleClient {
    fn myself(&self) -> User {
        User {
            channel_id: self.channel.load(Ordering::SeqCst),
            ..self.me.clone()
        }
    }

    fn user(&self, session: u32) -> Option<User> {
        self.users().into_iter().find(|u| u.session == session)
    }

    fn users(&self) -> Vec<User> {
        vec![self.myself(), self.operator.clone()]
    }

    fn send_to_user(&self, session: u32, message: &str) {
        if session == self.operator.session {
            self.write_line("", message);
        }
    }

    fn send_to_channel(&self, message: &str) {
        self.write_line(&format!("[{}] ", self.channel_name), message);
    }

    fn move_to(&self, channel_id: u32) {
        self.channel.store(channel_id, Ordering::SeqCst);
        info!("moved to channel {channel_id}");
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Plays frames on the default output device.
///
/// Every frame becomes one queued `rodio` source, so the backlog is the queue
/// length times the frame duration.
pub struct LocalSink {
    sink: Sink,
    frame: Duration,
}

impl LocalSink {
    pub fn new(mixer: &Mixer, frame_bytes: usize) -> Self {
        let samples = (frame_bytes / 2) as u64;
        Self {
            sink: Sink::connect_new(mixer),
            frame: Duration::from_micros(samples * 1_000_000 / u64::from(SAMPLE_RATE)),
        }
    }
}

impl AudioSink for LocalSink {
    fn buffered(&self) -> Duration {
        self.frame * self.sink.len() as u32
    }

    fn add_frame(&self, pcm: &[u8]) {
        let samples: Vec<f32> = pcm
            .chunks_exact(2)
            .map(|b| f32::from(i16::from_le_bytes([b[0], b[1]])) / 32768.0)
            .collect();
        self.sink.append(SamplesBuffer::new(1, SAMPLE_RATE, samples));
    }
}
