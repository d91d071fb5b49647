use std::time::Duration;

/// A channel member as the transport reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub session: u32,
    pub name: String,
    /// Stable identity (certificate hash); what access lists store.
    pub hash: String,
    pub channel_id: u32,
}

/// An inbound text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    /// Session of the sender.
    pub actor: u32,
    pub message: String,
}

pub trait VoiceClient: Send + Sync {
    /// The bot's own user.
    fn myself(&self) -> User;

    fn user(&self, session: u32) -> Option<User>;

    fn users(&self) -> Vec<User>;

    /// Find a user by display name or hash.
    fn find_user(&self, needle: &str) -> Option<User> {
        self.users()
            .into_iter()
            .find(|u| u.name == needle || u.hash == needle)
    }

    fn send_to_user(&self, session: u32, message: &str);

    /// Post to the channel the bot is in.
    fn send_to_channel(&self, message: &str);

    fn move_to(&self, channel_id: u32);

    fn is_connected(&self) -> bool;
}

/// Where PCM frames go: mono s16le at 48 kHz.
pub trait AudioSink: Send + Sync {
    /// Audio handed over but not yet played.
    fn buffered(&self) -> Duration;

    fn add_frame(&self, pcm: &[u8]);
}
