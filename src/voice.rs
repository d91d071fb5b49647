//! The voice-channel side of the bot.
//!
//! The engine only sees the `VoiceClient` and `AudioSink` traits. `local`
//! provides a console client and a `rodio` sink so the bot runs without a
//! voice server.

mod client;
mod local;

pub use client::{AudioSink, TextMessage, User, VoiceClient};
pub use local::{ConsoleClient, LocalSink};

#[cfg(test)]
mod tests;
