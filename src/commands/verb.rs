use std::str::FromStr;

use crate::error::CommandError;

use super::access::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Yt,
    Play,
    Stop,
    Skip,
    Np,
    Queue,
    Random,
    Volume,
    ToggleRandom,
    Join,
    Delete,
    Blacklist,
    Hash,
    Ignore,
    Unignore,
    Help,
}

impl Verb {
    pub const ALL: [Verb; 16] = [
        Verb::Yt,
        Verb::Play,
        Verb::Stop,
        Verb::Skip,
        Verb::Np,
        Verb::Queue,
        Verb::Random,
        Verb::Volume,
        Verb::ToggleRandom,
        Verb::Join,
        Verb::Delete,
        Verb::Blacklist,
        Verb::Hash,
        Verb::Ignore,
        Verb::Unignore,
        Verb::Help,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Verb::Yt => "yt",
            Verb::Play => "play",
            Verb::Stop => "stop",
            Verb::Skip => "skip",
            Verb::Np => "np",
            Verb::Queue => "queue",
            Verb::Random => "random",
            Verb::Volume => "volume",
            Verb::ToggleRandom => "togglerandom",
            Verb::Join => "join",
            Verb::Delete => "delete",
            Verb::Blacklist => "blacklist",
            Verb::Hash => "hash",
            Verb::Ignore => "ignore",
            Verb::Unignore => "unignore",
            Verb::Help => "help",
        }
    }

    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Verb::Yt => &["y"],
            Verb::Queue => &["numtracks"],
            _ => &[],
        }
    }

    /// Minimum role to run the verb at all. `hash` checks the owner-only
    /// lookup of other users itself.
    pub fn required_role(self) -> Role {
        match self {
            Verb::Delete | Verb::Blacklist | Verb::Ignore | Verb::Unignore => Role::Admin,
            _ => Role::User,
        }
    }
}

impl FromStr for Verb {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .into_iter()
            .find(|v| v.name() == s || v.aliases().contains(&s))
            .ok_or_else(|| CommandError::UnknownVerb(s.to_string()))
    }
}

/// Split `!verb rest of line` into the verb word and an optional parameter.
/// Returns `None` for anything that is not a command.
pub fn parse_command(message: &str) -> Option<(&str, Option<&str>)> {
    let body = message.trim().strip_prefix('!')?;
    let (word, parameter) = match body.split_once(' ') {
        Some((word, rest)) => (word, Some(rest.trim())),
        None => (body, None),
    };
    if word.is_empty() {
        return None;
    }
    Some((word, parameter.filter(|p| !p.is_empty())))
}
